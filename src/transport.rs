use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::net::UdpSocket;

use crate::config::Config;

/// Receiver of paced audio frames.
///
/// Called once per tick with exactly one frame of mono 16-bit samples.
/// Reliability and ordering are the implementation's concern.
#[async_trait]
pub trait TransportSink: Send + Sync {
    async fn send_frame(&self, frame: &[i16]) -> anyhow::Result<()>;
}

/// Sends each frame as one UDP datagram of little-endian samples.
pub struct UdpSink {
    socket: UdpSocket,
    target_addr: String,
}

impl UdpSink {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        Self::bind(config.transport_local_port, &config.transport_remote_addr).await
    }

    pub async fn bind(local_port: u16, target_addr: &str) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(format!("0.0.0.0:{}", local_port)).await?;
        Ok(Self {
            socket,
            target_addr: target_addr.to_string(),
        })
    }

    pub fn target_addr(&self) -> &str {
        &self.target_addr
    }
}

/// Serialize a frame as little-endian 16-bit samples.
pub fn encode_frame(frame: &[i16]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(frame.len() * 2);
    for &sample in frame {
        buf.put_i16_le(sample);
    }
    buf
}

#[async_trait]
impl TransportSink for UdpSink {
    async fn send_frame(&self, frame: &[i16]) -> anyhow::Result<()> {
        let payload = encode_frame(frame);
        self.socket.send_to(&payload, &self.target_addr).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_little_endian() {
        let bytes = encode_frame(&[1, -2, 0x1234]);
        assert_eq!(&bytes[..], &[0x01, 0x00, 0xfe, 0xff, 0x34, 0x12]);
    }

    #[tokio::test]
    async fn udp_sink_delivers_one_datagram_per_frame() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = peer.local_addr().unwrap().to_string();
        let sink = UdpSink::bind(0, &target).await.unwrap();

        sink.send_frame(&[7, -7]).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[7, 0, 0xf9, 0xff]);
    }
}
