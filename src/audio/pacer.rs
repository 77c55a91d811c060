//! The per-session frame pacing task.
//!
//! One `FramePacer` runs per session. Every tick it reads one frame of
//! raw PCM from the decoder, applies the stream volume, updates the
//! elapsed time and hands the frame to the transport sink. It exits on
//! decoder end-of-stream, a read failure or the session's stop signal,
//! and then tears the session down exactly once.

use std::io;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::decoder::DecoderProcess;
use super::pcm::decode_scaled;
use super::stream::{Shared, TeardownAction};

/// Why the pacing loop ended.
#[derive(Debug)]
enum Exit {
    EndOfStream,
    Stopped,
    ReadFailed(io::Error),
}

pub(crate) struct FramePacer {
    shared: Arc<Shared>,
    session_id: u64,
    decoder: DecoderProcess,
    started_at: Instant,
    start_offset: f64,
    stop: CancellationToken,
    finished: CancellationToken,
    teardown: Vec<TeardownAction>,
}

impl FramePacer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        shared: Arc<Shared>,
        session_id: u64,
        decoder: DecoderProcess,
        started_at: Instant,
        start_offset: f64,
        stop: CancellationToken,
        finished: CancellationToken,
        teardown: Vec<TeardownAction>,
    ) -> Self {
        Self {
            shared,
            session_id,
            decoder,
            started_at,
            start_offset,
            stop,
            finished,
            teardown,
        }
    }

    pub(crate) async fn run(mut self) {
        // Releases Stop()/Wait() callers on every exit path, panics included.
        let guard = SessionGuard {
            shared: self.shared.clone(),
            session_id: self.session_id,
            finished: self.finished.clone(),
        };

        let exit = self.pace().await;

        let FramePacer {
            shared,
            decoder,
            teardown,
            ..
        } = self;

        let pid = decoder.id();
        decoder.kill().await;
        guard.release_session();

        match &exit {
            Exit::ReadFailed(e) => log::warn!(
                "Session {} decoder read failed after {:.2}s: {}",
                guard.session_id,
                shared.elapsed.load(),
                e
            ),
            other => log::info!(
                "Session {} ended ({:?}) after {:.2}s, decoder pid {:?} reaped",
                guard.session_id,
                other,
                shared.elapsed.load(),
                pid
            ),
        }

        for action in teardown {
            action.run().await;
        }
        drop(guard);
    }

    async fn pace(&mut self) -> Exit {
        let format = self.shared.format;
        let period = format.interval();

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut bytes = vec![0u8; format.frame_bytes()];
        let mut frame = vec![0i16; format.frame_size];
        let stop = self.stop.clone();

        loop {
            let stopped = tokio::select! {
                biased;
                _ = stop.cancelled() => true,
                _ = ticker.tick() => false,
            };
            if stopped {
                self.update_elapsed();
                return Exit::Stopped;
            }

            // A stop that lands mid-read discards the partial frame.
            let read = tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                r = self.decoder.stdout().read_exact(&mut bytes) => Some(r),
            };
            match read {
                None => {
                    self.update_elapsed();
                    return Exit::Stopped;
                }
                Some(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.update_elapsed();
                    return Exit::EndOfStream;
                }
                Some(Err(e)) => {
                    self.update_elapsed();
                    return Exit::ReadFailed(e);
                }
                Some(Ok(_)) => {}
            }

            decode_scaled(&bytes, self.shared.volume.load(), &mut frame);
            self.update_elapsed();

            if let Err(e) = self.shared.sink.send_frame(&frame).await {
                log::warn!("Session {} failed to deliver frame: {}", self.session_id, e);
            }
        }
    }

    fn update_elapsed(&self) {
        let elapsed = self.started_at.elapsed().as_secs_f64() + self.start_offset;
        self.shared.elapsed.store(elapsed);
    }
}

/// Releases a session's bookkeeping when dropped.
///
/// Dropping decrements the completion counter and then fires the
/// session's finished signal, so Stop()/Wait() return only after
/// everything that ran before the drop.
struct SessionGuard {
    shared: Arc<Shared>,
    session_id: u64,
    finished: CancellationToken,
}

impl SessionGuard {
    /// Detach the session from the stream so `is_playing()` turns false.
    fn release_session(&self) {
        self.shared.clear_session(self.session_id);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.shared.clear_session(self.session_id);
        self.shared.sessions.send_modify(|n| *n = n.saturating_sub(1));
        self.finished.cancel();
    }
}
