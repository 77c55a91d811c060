//! Single-datagram server status query.
//!
//! Request (12 bytes, big-endian): `u32` zero, `u64` identifier.
//! Reply (24 bytes, big-endian): `u32` version, `u64` echoed identifier,
//! `u32` connected users, `u32` maximum users, `u32` maximum bitrate.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout, Instant};

use crate::error::PingError;

pub const REQUEST_LEN: usize = 12;
pub const REPLY_LEN: usize = 24;

/// Packed server version, `major << 16 | minor << 8 | patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version(pub u32);

impl Version {
    pub fn semantic_version(&self) -> (u16, u8, u8) {
        ((self.0 >> 16) as u16, (self.0 >> 8) as u8, self.0 as u8)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    pub address: SocketAddr,
    /// Round-trip time of the exchange
    pub ping: Duration,
    pub version: Version,
    pub connected_users: u32,
    pub maximum_users: u32,
    pub maximum_bitrate: u32,
}

/// Fields carried by a reply datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFields {
    pub version: Version,
    pub ident: u64,
    pub connected_users: u32,
    pub maximum_users: u32,
    pub maximum_bitrate: u32,
}

pub fn encode_request(ident: u64) -> BytesMut {
    let mut buf = BytesMut::with_capacity(REQUEST_LEN);
    buf.put_u32(0);
    buf.put_u64(ident);
    buf
}

pub fn decode_reply(mut data: &[u8]) -> Result<ReplyFields, PingError> {
    if data.len() < REPLY_LEN {
        return Err(PingError::ShortReply(data.len()));
    }
    Ok(ReplyFields {
        version: Version(data.get_u32()),
        ident: data.get_u64(),
        connected_users: data.get_u32(),
        maximum_users: data.get_u32(),
        maximum_bitrate: data.get_u32(),
    })
}

/// Ping `server` (host:port) and wait at most `wait` for its reply.
pub async fn ping(server: &str, wait: Duration) -> Result<PingResponse, PingError> {
    let address = lookup_host(server)
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {}", server)))?;

    let bind_addr = if address.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(address).await?;

    let ident = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();

    let sent_at = Instant::now();
    socket.send(&encode_request(ident)).await?;

    let mut buf = [0u8; 64];
    let len = timeout(wait, socket.recv(&mut buf))
        .await
        .map_err(|_| PingError::Timeout(wait))??;
    let rtt = sent_at.elapsed();

    let reply = decode_reply(&buf[..len])?;
    if reply.ident != ident {
        return Err(PingError::IdentMismatch {
            expected: ident,
            received: reply.ident,
        });
    }

    log::debug!("Ping {} answered in {:?}", address, rtt);

    Ok(PingResponse {
        address,
        ping: rtt,
        version: reply.version,
        connected_users: reply.connected_users,
        maximum_users: reply.maximum_users,
        maximum_bitrate: reply.maximum_bitrate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_bytes(ident: u64) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32(0x0001_0402);
        buf.put_u64(ident);
        buf.put_u32(3);
        buf.put_u32(100);
        buf.put_u32(72000);
        buf
    }

    #[test]
    fn request_layout() {
        let req = encode_request(0x0102_0304_0506_0708);
        assert_eq!(
            &req[..],
            &[0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn reply_decodes_fields() {
        let fields = decode_reply(&reply_bytes(42)).unwrap();
        assert_eq!(fields.ident, 42);
        assert_eq!(fields.version.semantic_version(), (1, 4, 2));
        assert_eq!(fields.connected_users, 3);
        assert_eq!(fields.maximum_users, 100);
        assert_eq!(fields.maximum_bitrate, 72000);
    }

    #[test]
    fn short_reply_is_rejected() {
        let err = decode_reply(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, PingError::ShortReply(10)));
    }

    #[tokio::test]
    async fn ping_round_trip_against_local_responder() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(len, REQUEST_LEN);
            let mut ident_bytes = &buf[4..len];
            let ident = ident_bytes.get_u64();
            server.send_to(&reply_bytes(ident), peer).await.unwrap();
        });

        let resp = ping(&addr.to_string(), Duration::from_secs(2)).await.unwrap();
        assert_eq!(resp.address, addr);
        assert_eq!(resp.connected_users, 3);
        assert_eq!(resp.maximum_users, 100);
        assert_eq!(resp.version, Version(0x0001_0402));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let err = ping(&addr.to_string(), Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, PingError::Timeout(_)));
        drop(server);
    }

    #[tokio::test]
    async fn mismatched_ident_is_rejected() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&reply_bytes(7), peer).await.unwrap();
        });

        let err = ping(&addr.to_string(), Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, PingError::IdentMismatch { received: 7, .. }));
    }
}
