use crate::{
    buffer::EventBuffer,
    sink::{RowSink, SinkError},
    snapshot::PlayerSnapshot,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitStats {
    pub windows: usize,
    pub rows: usize,
    pub failed_rows: usize,
}

/// Hands finished rows to a [`RowSink`] and closes the window afterwards.
pub struct Emitter<S> {
    sink: S,
    stats: EmitStats,
}

impl<S> Emitter<S>
where
    S: RowSink,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stats: EmitStats::default(),
        }
    }

    /// Writes `rows` in order and clears `buffer` once all of them went
    /// through.
    ///
    /// A row the sink rejects is logged and skipped. If the sink itself
    /// breaks, the error is returned and the buffer is left untouched.
    pub fn emit(
        &mut self,
        rows: &[PlayerSnapshot],
        buffer: &mut EventBuffer,
    ) -> Result<(), SinkError> {
        for row in rows {
            match self.sink.write_row(row) {
                Ok(()) => {
                    self.stats.rows += 1;
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Output is no longer usable: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(player = %row.name, tick = row.tick, "Writing row: {}", e);
                    self.stats.failed_rows += 1;
                }
            };
        }

        self.stats.windows += 1;
        buffer.clear();

        Ok(())
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
