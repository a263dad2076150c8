//! Per second player snapshots of a whole recording.
//!
//! The [`Timeline`] buffers the events of the current one second window and
//! writes one row per participating player whenever the clock enters a new
//! second.

use common::Event;

use crate::{
    buffer::EventBuffer,
    clock::Clock,
    decoder::{Handler, LiveState, RunError},
    demo::Demo,
    emit::Emitter,
    recording::Recording,
    rounds::RoundTracker,
    sink::{RowSink, SinkError},
    snapshot::{SnapshotBuilder, Window},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Length of a round in seconds, the countdown starts from this value.
    pub round_duration: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            round_duration: 115.0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub windows: usize,
    pub rows: usize,
    pub skipped_rows: usize,
    pub failed_rows: usize,
    pub rounds: u32,
}

pub struct Timeline<S> {
    clock: Clock,
    rounds: RoundTracker,
    buffer: EventBuffer,
    emitter: Emitter<S>,
    skipped_rows: usize,
}

impl<S> Timeline<S>
where
    S: RowSink,
{
    pub fn new(config: &Config, tick_rate: f64, sink: S) -> Self {
        Self {
            clock: Clock::new(tick_rate, config.round_duration),
            rounds: RoundTracker::new(),
            buffer: EventBuffer::new(),
            emitter: Emitter::new(sink),
            skipped_rows: 0,
        }
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn rounds(&self) -> &RoundTracker {
        &self.rounds
    }

    pub fn summary(&self) -> Summary {
        let stats = self.emitter.stats();

        Summary {
            windows: stats.windows,
            rows: stats.rows,
            skipped_rows: self.skipped_rows,
            failed_rows: stats.failed_rows,
            rounds: self.rounds.round_number(),
        }
    }

    /// Flushes the sink and hands it back together with the summary.
    ///
    /// Events of the last, still open window are dropped, writing them would
    /// produce a second set of rows for an already written second.
    pub fn finish(mut self) -> Result<(S, Summary), SinkError> {
        if !self.buffer.is_empty() {
            tracing::debug!(
                last_second = ?self.clock.last_processed_second(),
                "Dropping events of the unfinished window"
            );
        }

        let summary = self.summary();
        let mut sink = self.emitter.into_sink();
        sink.flush()?;

        Ok((sink, summary))
    }
}

impl<S> Handler for Timeline<S>
where
    S: RowSink,
{
    type Error = SinkError;

    fn on_event(&mut self, state: &dyn LiveState, event: &Event) -> Result<(), Self::Error> {
        match event {
            Event::RoundStart => {
                let elapsed = self.clock.elapsed(state.ingame_tick());
                self.rounds.on_round_start(elapsed);
                self.buffer.clear_bomb();
            }
            Event::Kill(kill) => {
                self.buffer.record_kill(
                    kill.killer.as_ref(),
                    kill.victim.as_ref(),
                    kill.assister.as_ref(),
                );
            }
            Event::Damage(damage) => match (damage.victim.as_ref(), damage.attacker.as_ref()) {
                (Some(victim), Some(attacker)) => {
                    self.buffer.record_damage(
                        victim,
                        attacker,
                        damage.health_damage,
                        damage.armor_damage,
                    );
                }
                _ => {
                    tracing::trace!(?damage, "Ignoring damage without victim or attacker");
                }
            },
            Event::BombPlanted(planted) => {
                self.buffer.record_bomb_planted(&planted.actor, planted.site);
            }
            Event::BombDefused(defused) => {
                self.buffer.record_bomb_defused(&defused.actor, defused.site);
            }
            Event::BombPlantBegin { actor } => self.rounds.on_bomb_plant_begin(actor),
            Event::BombPlantAbort { actor } => self.rounds.on_bomb_plant_abort(actor),
            Event::BombDefuseBegin { actor } => self.rounds.on_bomb_defuse_begin(actor),
            Event::BombDefuseAbort { actor } => self.rounds.on_bomb_defuse_abort(actor),
        };

        Ok(())
    }

    fn on_frame_done(&mut self, state: &dyn LiveState) -> Result<(), Self::Error> {
        let tick = state.ingame_tick();
        let second = match self.clock.advance(tick) {
            Some(s) => s,
            None => return Ok(()),
        };

        let time = self.clock.elapsed(tick);
        let window = Window {
            tick,
            second,
            time,
            clock_time: self.clock.countdown(time, self.rounds.round_start_time()),
            round_number: self.rounds.round_number(),
        };

        let players = state.participants();
        let rows = SnapshotBuilder::new(window, &self.rounds, &self.buffer).build(players);
        self.skipped_rows += players.len() - rows.len();

        tracing::trace!(second, tick, rows = rows.len(), "Flushing window");

        self.emitter.emit(&rows, &mut self.buffer)
    }
}

/// Replays a whole recording and writes its rows into `sink`.
pub fn parse<S>(config: &Config, buf: &[u8], sink: S) -> Result<(S, Summary), RunError<SinkError>>
where
    S: RowSink,
{
    let recording = Recording::parse(buf)?;
    tracing::debug!(map = %recording.header().map, tick_rate = recording.header().tick_rate, "Parsed header");

    let mut timeline = Timeline::new(config, recording.header().tick_rate, sink);
    recording.run(&mut timeline)?;

    timeline.finish().map_err(RunError::Handler)
}

/// Replays a whole CS2 demo and writes its rows into `sink`.
pub fn parse_demo<S>(
    config: &Config,
    demo_config: &crate::demo::Config,
    buf: &[u8],
    sink: S,
) -> Result<(S, Summary), RunError<SinkError>>
where
    S: RowSink,
{
    let demo = Demo::parse(demo_config, buf)?;

    let mut timeline = Timeline::new(config, demo.tick_rate(), sink);
    demo.run(&mut timeline)?;

    timeline.finish().map_err(RunError::Handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{recording::RecordedState, snapshot::tests::player};
    use common::{BombSiteAction, Bombsite, Damage, Kill, PlayerIdentity, PlayerState};
    use pretty_assertions::assert_eq;

    fn state(tick: u32, players: &[PlayerState]) -> RecordedState {
        let mut state = RecordedState::new();
        state.set_frame(tick, Some(players.to_vec()));
        state
    }

    fn id(player: &PlayerState) -> PlayerIdentity {
        player.identity.clone()
    }

    #[test]
    fn flushes_once_per_second() {
        let players = [player(1, "Excel", 2), player(2, "cute", 3)];
        let mut timeline = Timeline::new(&Config::default(), 64.0, Vec::new());

        for tick in 0..200 {
            timeline.on_frame_done(&state(tick, &players)).unwrap();
        }

        let (rows, summary) = timeline.finish().unwrap();
        assert_eq!(4, summary.windows);
        assert_eq!(8, rows.len());

        let ticks: Vec<_> = rows.iter().map(|r| r.tick).collect();
        assert_eq!(vec![0, 0, 64, 64, 128, 128, 192, 192], ticks);
    }

    #[test]
    fn window_events_are_flushed_and_cleared() {
        let players = [player(1, "A", 2), player(2, "B", 3)];
        let mut timeline = Timeline::new(&Config::default(), 64.0, Vec::new());

        timeline.on_frame_done(&state(0, &players)).unwrap();
        timeline
            .on_event(
                &state(10, &players),
                &Event::Damage(Damage {
                    victim: Some(id(&players[1])),
                    attacker: Some(id(&players[0])),
                    health_damage: 30,
                    armor_damage: 2,
                }),
            )
            .unwrap();
        timeline.on_frame_done(&state(10, &players)).unwrap();
        assert!(!timeline.buffer().is_empty());

        timeline.on_frame_done(&state(64, &players)).unwrap();
        assert!(timeline.buffer().is_empty());

        timeline.on_frame_done(&state(128, &players)).unwrap();

        let (rows, _) = timeline.finish().unwrap();
        assert_eq!(30, rows[3].health_damage_taken);
        assert_eq!(vec!["A"], rows[3].attacked_by);
        assert_eq!(0, rows[5].health_damage_taken);
        assert!(!rows[5].attacked);
        assert!(!rows[4].attacking);
    }

    #[test]
    fn damage_without_attacker_is_ignored() {
        let players = [player(1, "A", 2)];
        let mut timeline = Timeline::new(&Config::default(), 64.0, Vec::new());

        timeline
            .on_event(
                &state(0, &players),
                &Event::Damage(Damage {
                    victim: Some(id(&players[0])),
                    attacker: None,
                    health_damage: 12,
                    armor_damage: 0,
                }),
            )
            .unwrap();

        assert!(timeline.buffer().is_empty());
    }

    #[test]
    fn round_start_resets_round_scope_only() {
        let mut planter = player(1, "A", 2);
        planter.kills = 3;
        planter.deaths = 1;
        let players = [planter];
        let actor = id(&players[0]);
        let mut timeline = Timeline::new(&Config::default(), 64.0, Vec::new());

        timeline.on_frame_done(&state(0, &players)).unwrap();
        timeline
            .on_event(&state(0, &players), &Event::BombPlantBegin { actor: actor.clone() })
            .unwrap();
        timeline
            .on_event(
                &state(0, &players),
                &Event::BombPlanted(BombSiteAction {
                    actor: actor.clone(),
                    site: Bombsite::A,
                }),
            )
            .unwrap();

        // Survives the flush of the first window
        timeline.on_frame_done(&state(64, &players)).unwrap();
        assert!(timeline.rounds().bomb_plant_begun(&actor));

        timeline
            .on_event(&state(640, &players), &Event::BombPlanted(BombSiteAction {
                actor: actor.clone(),
                site: Bombsite::B,
            }))
            .unwrap();
        timeline.on_event(&state(640, &players), &Event::RoundStart).unwrap();
        timeline.on_frame_done(&state(640, &players)).unwrap();

        let (rows, summary) = timeline.finish().unwrap();
        assert_eq!(1, summary.rounds);

        assert!(rows[1].bomb_plant_begin);
        assert!(rows[1].bomb_planted);
        assert_eq!(Some(Bombsite::A), rows[1].bomb_plant_site);

        assert!(!rows[2].bomb_plant_begin);
        assert!(!rows[2].bomb_planted);
        assert_eq!(1, rows[2].round_number);
        assert_eq!((3, 1), (rows[2].kills, rows[2].deaths));
        assert_eq!(115.0, rows[2].clock_time);
    }

    #[test]
    fn clock_time_counts_down_from_round_start() {
        let players = [player(1, "A", 2)];
        let config = Config {
            round_duration: 100.0,
        };
        let mut timeline = Timeline::new(&config, 64.0, Vec::new());

        timeline.on_event(&state(640, &players), &Event::RoundStart).unwrap();
        timeline.on_frame_done(&state(640, &players)).unwrap();
        timeline.on_frame_done(&state(64 * 50 + 32, &players)).unwrap();
        timeline.on_frame_done(&state(64 * 200, &players)).unwrap();

        let (rows, _) = timeline.finish().unwrap();
        let clock: Vec<_> = rows.iter().map(|r| r.clock_time).collect();
        assert_eq!(vec![100.0, 59.5, 0.0], clock);

        let time: Vec<_> = rows.iter().map(|r| r.time).collect();
        assert_eq!(vec![10.0, 50.5, 200.0], time);
    }

    #[test]
    fn skipped_players_are_counted() {
        let mut joining = player(2, "B", 0);
        joining.team_state = None;
        let players = [player(1, "A", 2), joining];
        let mut timeline = Timeline::new(&Config::default(), 64.0, Vec::new());

        timeline.on_frame_done(&state(0, &players)).unwrap();
        timeline.on_frame_done(&state(64, &players)).unwrap();

        let (rows, summary) = timeline.finish().unwrap();
        assert_eq!(2, rows.len());
        assert_eq!(2, summary.skipped_rows);
        assert_eq!(2, summary.rows);
    }

    #[test]
    fn kill_with_assist() {
        let players = [
            player(1, "A", 2),
            player(2, "B", 3),
            player(3, "C", 2),
            player(4, "D", 3),
        ];
        let mut timeline = Timeline::new(&Config::default(), 64.0, Vec::new());

        timeline.on_frame_done(&state(0, &players)).unwrap();
        timeline
            .on_event(
                &state(20, &players),
                &Event::Kill(Kill {
                    killer: Some(id(&players[0])),
                    victim: Some(id(&players[1])),
                    assister: Some(id(&players[2])),
                }),
            )
            .unwrap();
        timeline.on_frame_done(&state(64, &players)).unwrap();

        let (rows, _) = timeline.finish().unwrap();
        let window = &rows[4..];

        assert!(window[0].kill_event);
        assert_eq!(vec!["B"], window[0].killed);
        assert!(window[1].kill_event);
        assert_eq!(vec!["A"], window[1].killed_by);
        assert!(!window[2].kill_event);
        assert_eq!(vec!["B"], window[2].assisters);
        assert!(!window[3].kill_event);
        assert!(window[3].killed.is_empty());
        assert!(window[3].killed_by.is_empty());
        assert!(window[3].assisters.is_empty());
    }
}
