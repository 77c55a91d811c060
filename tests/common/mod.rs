#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pcm_stream_rs::{FrameFormat, Stream, TransportSink};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Behaviour is picked by the `-i` argument:
/// `endless`, `one-frame`, `empty`, `-` (copy stdin) or a file path.
const FAKE_DECODER: &str = r#"#!/bin/sh
src=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) src="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$src" in
  endless) exec yes ;;
  one-frame) yes | head -c 960 ;;
  empty) exit 0 ;;
  -) exec cat ;;
  *) exec cat "$src" ;;
esac
"#;

/// Path of the fake decoder script, written once per test binary.
pub fn fake_decoder() -> &'static PathBuf {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("pcm_stream_rs-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fake-decoder");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o755)
            .open(&path)
            .unwrap();
        file.write_all(FAKE_DECODER.as_bytes()).unwrap();
        file.sync_all().unwrap();
        path
    })
}

#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<Vec<i16>>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<Vec<i16>> {
        self.frames.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

#[async_trait]
impl TransportSink for RecordingSink {
    async fn send_frame(&self, frame: &[i16]) -> anyhow::Result<()> {
        self.frames.lock().push(frame.to_vec());
        Ok(())
    }
}

/// A 48 kHz / 10 ms stream wired to the fake decoder and a fresh recording sink.
pub fn test_stream() -> (Stream, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let stream = Stream::new(sink.clone(), FrameFormat::new(48000, 480)).unwrap();
    stream.set_command(fake_decoder().to_string_lossy().into_owned());
    (stream, sink)
}
