//! The external decoder process and its invocation contract.

use std::io;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Decoder used when none is configured.
pub const DEFAULT_COMMAND: &str = "ffmpeg";

/// Boxed byte source fed to a decoder's stdin.
pub type InputReader = Box<dyn AsyncRead + Send + Unpin + 'static>;

/// Build the decoder argument vector.
///
/// Requests mono, `sample_rate` Hz, signed 16-bit little-endian PCM on
/// stdout. A positive `start_offset` prepends a seek instruction.
pub fn decoder_args(source: &str, sample_rate: u32, start_offset: f64) -> Vec<String> {
    let mut args = Vec::with_capacity(12);
    if start_offset > 0.0 {
        args.push("-ss".to_string());
        args.push((start_offset as f32).to_string());
    }
    args.extend(
        [
            "-i",
            source,
            "-ac",
            "1",
            "-ar",
            &sample_rate.to_string(),
            "-f",
            "s16le",
            "-",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

/// A running decoder with its stdout pipe.
///
/// The child is spawned with `kill_on_drop`, so it never outlives this
/// handle even if [`DecoderProcess::kill`] is not reached.
pub struct DecoderProcess {
    child: Child,
    stdout: ChildStdout,
    feeder: Option<JoinHandle<()>>,
}

impl DecoderProcess {
    /// Spawn `command` with `args`, optionally streaming `input` into its stdin.
    pub fn spawn(command: &str, args: &[String], input: Option<InputReader>) -> io::Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("decoder stdout was not captured"))?;

        let feeder = match (input, child.stdin.take()) {
            (Some(mut reader), Some(mut stdin)) => Some(tokio::spawn(async move {
                // Broken pipe here just means the decoder went away first.
                if let Err(e) = tokio::io::copy(&mut reader, &mut stdin).await {
                    log::debug!("Decoder input copy ended: {}", e);
                }
            })),
            _ => None,
        };

        Ok(Self { child, stdout, feeder })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn stdout(&mut self) -> &mut ChildStdout {
        &mut self.stdout
    }

    /// Forcibly terminate and reap the decoder. Failures are logged and dropped.
    pub async fn kill(mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        reap(&mut self.child, "decoder").await;
    }
}

/// Spawn an arbitrary command whose stdout becomes a PCM source.
pub fn spawn_source(name: &str, args: &[String]) -> io::Result<(Child, ChildStdout)> {
    let mut child = Command::new(name)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("source stdout was not captured"))?;
    Ok((child, stdout))
}

/// Kill and wait for `child`, suppressing errors.
pub async fn reap(child: &mut Child, what: &str) {
    if let Err(e) = child.kill().await {
        log::debug!("Failed to kill {} process: {}", what, e);
    }
}
