use anyhow::Context;
use clap::{Parser, Subcommand};
use pcm_stream_rs::{ping, Config, Stream, UdpSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(
    name = env!("APP_NAME"),
    version = env!("APP_VERSION"),
    about = "Pace decoder PCM output to a UDP peer"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play files one after another
    Play {
        /// Peer address receiving the frames
        #[arg(long)]
        target: Option<String>,
        /// Local UDP port to send from
        #[arg(long)]
        local_port: Option<u16>,
        #[arg(long)]
        volume: Option<f32>,
        /// Start offset in seconds for the first file
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Decoder program
        #[arg(long)]
        decoder: Option<String>,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Query a server's status
    Ping {
        server: String,
        /// Seconds to wait for the reply
        #[arg(long)]
        timeout: Option<u64>,
        /// Print the reply as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let mut config = Config::new().unwrap_or_default();
    let cli = Cli::parse();

    match cli.command {
        Command::Play {
            target,
            local_port,
            volume,
            start,
            decoder,
            files,
        } => {
            if let Some(target) = target {
                config.transport_remote_addr = target;
            }
            if let Some(port) = local_port {
                config.transport_local_port = port;
            }
            if let Some(volume) = volume {
                config.volume = volume;
            }
            if let Some(decoder) = decoder {
                config.decoder_command = decoder;
            }
            play_files(&config, &files, start).await
        }
        Command::Ping {
            server,
            timeout,
            json,
        } => {
            if let Some(secs) = timeout {
                config.ping_timeout_secs = secs;
            }
            print_ping(&server, config.ping_timeout(), json).await
        }
    }
}

async fn play_files(config: &Config, files: &[String], start: f64) -> anyhow::Result<()> {
    let sink = UdpSink::new(config)
        .await
        .context("failed to open UDP sink")?;
    println!("Sending frames to {}", sink.target_addr());

    let stream = Stream::from_config(config, Arc::new(sink))?;
    println!("audio player loaded! ({} files)", files.len());

    for (i, file) in files.iter().enumerate() {
        let offset = if i == 0 { start } else { 0.0 };
        stream
            .play(file, offset, Vec::new())
            .with_context(|| format!("failed to play {}", file))?;
        println!("Playing {}", file);

        tokio::select! {
            _ = signal::ctrl_c() => {
                println!("Received Ctrl+C, stopping...");
                // The session may have ended on its own in the meantime.
                let _ = stream.stop().await;
                return Ok(());
            }
            _ = stream.wait() => {
                println!("Finished {} ({:.1}s)", file, stream.elapsed());
            }
        }
    }
    Ok(())
}

async fn print_ping(server: &str, timeout: Duration, json: bool) -> anyhow::Result<()> {
    let resp = ping::ping(server, timeout)
        .await
        .with_context(|| format!("ping {} failed", server))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    let (major, minor, patch) = resp.version.semantic_version();
    println!("Address:         {}", resp.address);
    println!("Ping:            {:?}", resp.ping);
    println!("Version:         {}.{}.{}", major, minor, patch);
    println!("Connected Users: {}", resp.connected_users);
    println!("Maximum Users:   {}", resp.maximum_users);
    println!("Maximum Bitrate: {}", resp.maximum_bitrate);
    Ok(())
}
