//! Playback stream lifecycle: start, stop and wait on decoder-backed sessions.
//!
//! A [`Stream`] is created once and reused for any number of sessions.
//! Each `play*` call launches a decoder, attaches it to the stream and
//! spawns a [`FramePacer`](super::pacer) task that owns the decoder until
//! the session ends.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::decoder::{self, DecoderProcess, InputReader, DEFAULT_COMMAND};
use super::pacer::FramePacer;
use super::pcm::{AtomicF32, AtomicF64, FrameFormat};
use crate::config::Config;
use crate::error::StreamError;
use crate::transport::TransportSink;

/// Zero-argument completion callback, run once at session teardown.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Box a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: FnOnce() + Send + 'static,
{
    Box::new(f)
}

/// One step of a session's teardown sequence, run in registration order.
pub(crate) enum TeardownAction {
    Callback(Callback),
    /// Kill and reap an external PCM source process.
    Reap(Child),
}

impl TeardownAction {
    pub(crate) async fn run(self) {
        match self {
            TeardownAction::Callback(f) => f(),
            TeardownAction::Reap(mut child) => decoder::reap(&mut child, "source").await,
        }
    }
}

/// Handle to the running session, present iff the stream is playing.
pub(crate) struct ActiveSession {
    id: u64,
    pid: Option<u32>,
    stop: CancellationToken,
    finished: CancellationToken,
}

pub(crate) struct Shared {
    pub(crate) format: FrameFormat,
    pub(crate) sink: Arc<dyn TransportSink>,
    pub(crate) volume: AtomicF32,
    pub(crate) elapsed: AtomicF64,
    /// Number of sessions whose pacer has not finished teardown.
    pub(crate) sessions: watch::Sender<usize>,
    command: Mutex<String>,
    /// Held across the whole start sequence.
    active: Mutex<Option<ActiveSession>>,
    /// Mirrors `active.is_some()`; written only while `active` is locked.
    playing: AtomicBool,
    next_id: AtomicU64,
}

impl Shared {
    pub(crate) fn clear_session(&self, id: u64) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|s| s.id == id) {
            *active = None;
            self.playing.store(false, Ordering::Release);
        }
    }
}

/// A single playback stream feeding one transport sink.
///
/// Cloning yields another handle to the same stream.
#[derive(Clone)]
pub struct Stream {
    shared: Arc<Shared>,
}

impl Stream {
    /// Fails with [`StreamError::InvalidFormat`] if the rate or frame size is zero.
    pub fn new(sink: Arc<dyn TransportSink>, format: FrameFormat) -> Result<Self, StreamError> {
        format.validate()?;
        let (sessions, _) = watch::channel(0usize);
        Ok(Self {
            shared: Arc::new(Shared {
                format,
                sink,
                volume: AtomicF32::new(1.0),
                elapsed: AtomicF64::new(0.0),
                sessions,
                command: Mutex::new(DEFAULT_COMMAND.to_string()),
                active: Mutex::new(None),
                playing: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn from_config(config: &Config, sink: Arc<dyn TransportSink>) -> Result<Self, StreamError> {
        let stream = Self::new(sink, config.frame_format())?;
        stream.set_command(config.decoder_command.clone());
        stream.set_volume(config.volume);
        Ok(stream)
    }

    pub fn format(&self) -> FrameFormat {
        self.shared.format
    }

    /// Name of the decoder program launched by [`Stream::play`].
    pub fn command(&self) -> String {
        self.shared.command.lock().clone()
    }

    /// Takes effect on the next session.
    pub fn set_command(&self, command: impl Into<String>) {
        *self.shared.command.lock() = command.into();
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume.load()
    }

    /// Set the volume scalar. Not clamped; picked up on the next tick.
    pub fn set_volume(&self, volume: f32) {
        self.shared.volume.store(volume);
    }

    /// Seconds of playback, including any start offset.
    ///
    /// Advances once per tick while playing and is frozen after the
    /// session ends, until the next play call resets it.
    pub fn elapsed(&self) -> f64 {
        self.shared.elapsed.load()
    }

    /// Lock-free, so it never waits on a decoder launch in progress.
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// Process id of the current session's decoder, if playing.
    pub fn decoder_pid(&self) -> Option<u32> {
        self.shared.active.lock().as_ref().and_then(|s| s.pid)
    }

    /// Start playing `source` (a path, or `"-"` for the decoder's stdin).
    ///
    /// Returns once the decoder is running; playback continues in the
    /// background. Must be called from within a Tokio runtime.
    pub fn play(
        &self,
        source: &str,
        start_offset: f64,
        callbacks: Vec<Callback>,
    ) -> Result<(), StreamError> {
        let mut teardown = into_actions(callbacks);
        self.start(source, None, start_offset, &mut teardown)
    }

    /// Like [`Stream::play`], feeding `reader` to the decoder's stdin.
    pub fn play_reader<R>(&self, reader: R, callbacks: Vec<Callback>) -> Result<(), StreamError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut teardown = into_actions(callbacks);
        self.start("-", Some(Box::new(reader)), 0.0, &mut teardown)
    }

    /// Run `name args...` and decode its stdout.
    ///
    /// The external process is killed and reaped after the caller's
    /// callbacks at teardown, or immediately if the session fails to start.
    pub async fn play_command(
        &self,
        name: &str,
        args: &[String],
        callbacks: Vec<Callback>,
    ) -> Result<(), StreamError> {
        let (child, stdout) =
            decoder::spawn_source(name, args).map_err(|source| StreamError::ExternalLaunch {
                command: name.to_string(),
                source,
            })?;

        let mut teardown = into_actions(callbacks);
        teardown.push(TeardownAction::Reap(child));

        if let Err(e) = self.start("-", Some(Box::new(stdout)), 0.0, &mut teardown) {
            for action in teardown {
                if let TeardownAction::Reap(mut child) = action {
                    decoder::reap(&mut child, "source").await;
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stop the current session and wait until its teardown has finished.
    pub async fn stop(&self) -> Result<(), StreamError> {
        let finished = {
            let active = self.shared.active.lock();
            let session = active.as_ref().ok_or(StreamError::NothingPlaying)?;
            session.stop.cancel();
            session.finished.clone()
        };
        finished.cancelled().await;
        Ok(())
    }

    /// Wait until no session is running. Does not request a stop.
    pub async fn wait(&self) {
        let mut sessions = self.shared.sessions.subscribe();
        // The sender lives in `shared`, so this only returns once drained.
        let _ = sessions.wait_for(|n| *n == 0).await;
    }

    fn start(
        &self,
        source: &str,
        input: Option<InputReader>,
        start_offset: f64,
        teardown: &mut Vec<TeardownAction>,
    ) -> Result<(), StreamError> {
        let mut active = self.shared.active.lock();
        if active.is_some() {
            return Err(StreamError::AlreadyPlaying);
        }

        let command = self.command();
        let args = decoder::decoder_args(source, self.shared.format.sample_rate, start_offset);
        let decoder = DecoderProcess::spawn(&command, &args, input).map_err(|source| {
            log::error!("Failed to launch decoder '{}': {}", command, source);
            StreamError::DecoderLaunch {
                command: command.clone(),
                source,
            }
        })?;

        let started_at = Instant::now();
        self.shared.elapsed.store(0.0);

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let pid = decoder.id();
        let stop = CancellationToken::new();
        let finished = CancellationToken::new();
        *active = Some(ActiveSession {
            id,
            pid,
            stop: stop.clone(),
            finished: finished.clone(),
        });
        self.shared.playing.store(true, Ordering::Release);
        self.shared.sessions.send_modify(|n| *n += 1);

        log::info!(
            "Session {} playing '{}' via {} (pid {:?}, offset {}s, {} Hz, {} samples/frame)",
            id,
            source,
            command,
            pid,
            start_offset,
            self.shared.format.sample_rate,
            self.shared.format.frame_size,
        );

        let pacer = FramePacer::new(
            self.shared.clone(),
            id,
            decoder,
            started_at,
            start_offset,
            stop,
            finished,
            std::mem::take(teardown),
        );
        tokio::spawn(pacer.run());
        Ok(())
    }
}

fn into_actions(callbacks: Vec<Callback>) -> Vec<TeardownAction> {
    callbacks.into_iter().map(TeardownAction::Callback).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    #[async_trait::async_trait]
    impl TransportSink for NullSink {
        async fn send_frame(&self, _frame: &[i16]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn null_stream() -> Stream {
        Stream::new(Arc::new(NullSink), FrameFormat::default()).unwrap()
    }

    #[test]
    fn is_playing_does_not_wait_for_start_lock() {
        let stream = null_stream();
        let other = stream.clone();

        // Simulates a start sequence stuck in a slow decoder launch.
        let _held = stream.shared.active.lock();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(other.is_playing());
        });
        let playing = rx.recv_timeout(std::time::Duration::from_secs(2));
        assert_eq!(playing, Ok(false));
    }

    #[test]
    fn clearing_a_stale_session_keeps_playing_flag() {
        let stream = null_stream();
        {
            let mut active = stream.shared.active.lock();
            *active = Some(ActiveSession {
                id: 7,
                pid: None,
                stop: CancellationToken::new(),
                finished: CancellationToken::new(),
            });
            stream.shared.playing.store(true, Ordering::Release);
        }

        stream.shared.clear_session(3);
        assert!(stream.is_playing());

        stream.shared.clear_session(7);
        assert!(!stream.is_playing());
        assert!(stream.decoder_pid().is_none());
    }
}
