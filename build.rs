use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    decoder: Decoder,
    audio: Audio,
    transport: Transport,
    ping: Ping,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Decoder {
    command: String,
}

#[derive(Deserialize)]
struct Audio {
    sample_rate: u32,
    frame_size: usize,
    volume: f32,
}

#[derive(Deserialize)]
struct Transport {
    local_port: u16,
    remote_addr: String,
}

#[derive(Deserialize)]
struct Ping {
    timeout_secs: u64,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 解码器
    println!("cargo:rustc-env=DECODER_COMMAND={}", config.decoder.command);

    // 音频帧格式
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_FRAME_SIZE={}", config.audio.frame_size);
    println!("cargo:rustc-env=AUDIO_VOLUME={}", config.audio.volume);

    // 传输
    println!("cargo:rustc-env=TRANSPORT_LOCAL_PORT={}", config.transport.local_port);
    println!("cargo:rustc-env=TRANSPORT_REMOTE_ADDR={}", config.transport.remote_addr);

    println!("cargo:rustc-env=PING_TIMEOUT_SECS={}", config.ping.timeout_secs);
}
