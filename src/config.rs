use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::FrameFormat;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // 解码器配置
    pub decoder_command: String,

    // 音频帧格式
    pub sample_rate: u32,
    pub frame_size: usize,
    pub volume: f32,

    // UDP 传输配置
    pub transport_local_port: u16,
    pub transport_remote_addr: String,

    pub ping_timeout_secs: u64,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Self {
            decoder_command: env!("DECODER_COMMAND").to_string(),

            sample_rate: env!("AUDIO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse AUDIO_SAMPLE_RATE")?,
            frame_size: env!("AUDIO_FRAME_SIZE").parse()
                .map_err(|_| "Failed to parse AUDIO_FRAME_SIZE")?,
            volume: env!("AUDIO_VOLUME").parse()
                .map_err(|_| "Failed to parse AUDIO_VOLUME")?,

            transport_local_port: env!("TRANSPORT_LOCAL_PORT").parse()
                .map_err(|_| "Failed to parse TRANSPORT_LOCAL_PORT")?,
            transport_remote_addr: env!("TRANSPORT_REMOTE_ADDR").to_string(),

            ping_timeout_secs: env!("PING_TIMEOUT_SECS").parse()
                .map_err(|_| "Failed to parse PING_TIMEOUT_SECS")?,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, &'static str> {
        if self.sample_rate == 0 {
            return Err("AUDIO_SAMPLE_RATE must be non-zero");
        }
        if self.frame_size == 0 {
            return Err("AUDIO_FRAME_SIZE must be non-zero");
        }
        Ok(self)
    }

    /// Frame format the pacer and the transport agree on.
    pub fn frame_format(&self) -> FrameFormat {
        FrameFormat::new(self.sample_rate, self.frame_size)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}
