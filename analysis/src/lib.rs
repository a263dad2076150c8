pub mod buffer;
pub mod clock;
pub mod decoder;
pub mod demo;
pub mod emit;
pub mod recording;
pub mod rounds;
pub mod sink;
pub mod snapshot;
pub mod timeline;

