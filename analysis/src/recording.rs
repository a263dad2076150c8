//! Decoder for recordings: newline delimited JSON dumps of a demo, one
//! record per line.
//!
//! ```text
//! {"type":"header","tick_rate":64.0,"map":"de_nuke"}
//! {"type":"frame","tick":0,"players":[...]}
//! {"type":"event","event":{"kind":"round_start"}}
//! {"type":"frame","tick":1}
//! ```

use crate::decoder::{Handler, LiveState, RunError};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Header {
        tick_rate: f64,
        #[serde(default)]
        map: String,
    },
    Event {
        event: common::Event,
    },
    Frame {
        tick: u32,
        /// Replaces the participants when present.
        #[serde(default)]
        players: Option<Vec<common::PlayerState>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub tick_rate: f64,
    pub map: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Recording is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("Recording is empty")]
    Empty,
    #[error("Line {line}: expected a header record")]
    MissingHeader { line: usize },
    #[error("Invalid tick rate {0}")]
    InvalidTickRate(f64),
    #[error("Line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Line {line}: unexpected second header")]
    DuplicateHeader { line: usize },
    #[error("Line {line}: tick {tick} is before the previous tick {previous}")]
    TickWentBackwards { line: usize, tick: u32, previous: u32 },
}

/// Live state tracked while replaying a recording.
#[derive(Debug, Clone, Default)]
pub struct RecordedState {
    tick: u32,
    players: Vec<common::PlayerState>,
}

impl RecordedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frame(&mut self, tick: u32, players: Option<Vec<common::PlayerState>>) {
        self.tick = tick;
        if let Some(players) = players {
            self.players = players;
        }
    }
}

impl LiveState for RecordedState {
    fn ingame_tick(&self) -> u32 {
        self.tick
    }

    fn participants(&self) -> &[common::PlayerState] {
        &self.players
    }
}

pub struct Recording<'b> {
    header: Header,
    lines: std::iter::Enumerate<std::str::Lines<'b>>,
}

impl<'b> Recording<'b> {
    /// Reads the header, everything else is decoded lazily by [`Self::run`].
    pub fn parse(buf: &'b [u8]) -> Result<Self, DecodeError> {
        let content = std::str::from_utf8(buf)?;
        let mut lines = content.lines().enumerate();

        let (index, first) = lines
            .by_ref()
            .find(|(_, l)| !l.trim().is_empty())
            .ok_or(DecodeError::Empty)?;
        let line = index + 1;

        let header = match serde_json::from_str::<Record>(first) {
            Ok(Record::Header { tick_rate, map }) => Header { tick_rate, map },
            Ok(_) => return Err(DecodeError::MissingHeader { line }),
            Err(source) => return Err(DecodeError::Malformed { line, source }),
        };

        if !(header.tick_rate.is_finite() && header.tick_rate > 0.0) {
            return Err(DecodeError::InvalidTickRate(header.tick_rate));
        }

        Ok(Self { header, lines })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Replays every remaining record into `handler`.
    pub fn run<H>(self, handler: &mut H) -> Result<(), RunError<H::Error>>
    where
        H: Handler,
    {
        let mut state = RecordedState::new();
        let mut previous_tick = None;

        for (index, raw) in self.lines {
            let line = index + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(raw)
                .map_err(|source| DecodeError::Malformed { line, source })?;

            match record {
                Record::Header { .. } => {
                    return Err(DecodeError::DuplicateHeader { line }.into());
                }
                Record::Event { event } => {
                    tracing::trace!(tick = state.ingame_tick(), ?event, "Event");
                    handler
                        .on_event(&state, &event)
                        .map_err(RunError::Handler)?;
                }
                Record::Frame { tick, players } => {
                    if let Some(previous) = previous_tick.filter(|p| *p > tick) {
                        return Err(DecodeError::TickWentBackwards {
                            line,
                            tick,
                            previous,
                        }
                        .into());
                    }
                    previous_tick = Some(tick);

                    state.set_frame(tick, players);
                    handler.on_frame_done(&state).map_err(RunError::Handler)?;
                }
            };
        }

        Ok(())
    }
}
