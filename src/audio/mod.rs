//! audio - Decoder-backed PCM streaming
//!
//! Launches an external decoder, paces its raw PCM output one frame per
//! tick, applies live volume scaling and forwards frames to a
//! [`TransportSink`](crate::transport::TransportSink).

pub mod decoder;
mod pacer;
pub mod pcm;
mod stream;

pub use decoder::{decoder_args, DEFAULT_COMMAND};
pub use pcm::{scale_sample, FrameFormat};
pub use stream::{callback, Callback, Stream};
