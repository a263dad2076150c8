//! The seam between a demo decoder and the analyses running on top of it.

/// Live game state as maintained by the decoder at the current tick.
pub trait LiveState {
    fn ingame_tick(&self) -> u32;

    /// Participants that are currently playing, in the decoder's order.
    fn participants(&self) -> &[common::PlayerState];
}

/// Callbacks invoked by a decoder while it replays a recording.
///
/// Every callback runs to completion before the decoder continues. Returning
/// an error stops the replay.
pub trait Handler {
    type Error;

    fn on_event(
        &mut self,
        state: &dyn LiveState,
        event: &common::Event,
    ) -> Result<(), Self::Error>;

    /// Called once every decoded frame, after all events of that frame.
    fn on_frame_done(&mut self, state: &dyn LiveState) -> Result<(), Self::Error>;
}

/// Why a replay stopped early.
#[derive(Debug, thiserror::Error)]
pub enum RunError<E> {
    #[error("Decoding recording: {0}")]
    Decode(#[from] crate::recording::DecodeError),
    #[error("Decoding demo: {0}")]
    Demo(#[from] crate::demo::DemoError),
    #[error("Handler: {0}")]
    Handler(E),
}
