//! Bridge an external audio decoder process to a frame-paced transport sink.

pub mod audio;
pub mod config;
pub mod error;
pub mod ping;
pub mod transport;

pub use audio::{callback, Callback, FrameFormat, Stream};
pub use config::Config;
pub use error::{PingError, StreamError};
pub use transport::{TransportSink, UdpSink};
