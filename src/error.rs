//! Error types for stream control and the status ping.

use std::io;
use thiserror::Error;

/// Errors returned by [`Stream`](crate::audio::Stream) control operations.
///
/// Decoder end-of-stream is never reported here; it ends the session
/// through teardown and the completion callbacks.
#[derive(Error, Debug)]
pub enum StreamError {
    /// A session is already active on this stream.
    #[error("already playing")]
    AlreadyPlaying,

    /// Sample rate or frame size is zero; no pacing interval exists.
    #[error("invalid frame format: {sample_rate} Hz, {frame_size} samples/frame")]
    InvalidFormat { sample_rate: u32, frame_size: usize },

    /// Stop was requested with no active session.
    #[error("nothing playing")]
    NothingPlaying,

    /// The decoder process could not be started or its stdout could not be opened.
    #[error("failed to launch decoder '{command}': {source}")]
    DecoderLaunch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The external PCM source command could not be started.
    #[error("failed to launch external command '{command}': {source}")]
    ExternalLaunch {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Errors from a single status ping exchange.
#[derive(Error, Debug)]
pub enum PingError {
    #[error("ping I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),

    #[error("reply too short: {0} bytes")]
    ShortReply(usize),

    #[error("reply identifier {received:#x} does not match request {expected:#x}")]
    IdentMismatch { expected: u64, received: u64 },
}
