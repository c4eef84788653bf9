//! UDP transport, ported from `UdpSocket.cpp`/`UdpSession.cpp`.
//!
//! Client-only: `SessionConfig::validate` rejects a UDP server session
//! before a transport is ever opened, matching the original's
//! `Udp supports client mode only` guard.

use std::cell::RefCell;
use std::io;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::config::SessionConfig;
use crate::pattern::BUFFER_SIZE;
use crate::range::Range;

pub struct UdpTransport {
    socket: UdpSocket,
    packet_size: Range<u64>,
    rng: RefCell<SmallRng>,
}

pub async fn open(config: &SessionConfig) -> io::Result<UdpTransport> {
    let remote = config.endpoint.remote_addr()?;
    let domain = if remote.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(SockProtocol::UDP))?;
    socket.set_reuse_address(true)?;
    if let Ok(local) = config.endpoint.local_addr() {
        socket.bind(&local.into())?;
    }
    if config.windows != 0 {
        socket.set_send_buffer_size(config.windows as usize)?;
        socket.set_recv_buffer_size(config.windows as usize)?;
    }
    socket.set_nonblocking(true)?;
    // `connect` fixes the peer for a UDP socket, so every send/recv
    // afterwards is implicitly scoped to it (`UdpSocket::connect` in
    // the original).
    socket.connect(&remote.into())?;

    let std_socket: std::net::UdpSocket = socket.into();
    let socket = UdpSocket::from_std(std_socket)?;

    Ok(UdpTransport {
        socket,
        packet_size: config.packet_size,
        rng: RefCell::new(SmallRng::from_entropy()),
    })
}

impl UdpTransport {
    pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf).await
    }

    pub async fn receive(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }

    /// Pick this slice's datagram length: sample the configured
    /// packet-size range unclamped, then cap by the throttle quota and
    /// the remaining byte budget. Ported from `UdpSession`'s
    /// `get_max_datagram_size`/`async_send`: `distribution_` draws
    /// across the full `[low, high]` range first, and only the result
    /// is capped by `min(slice_quota, sampled_max)` — capping the range
    /// itself before sampling would flatten the distribution against
    /// the quota instead of reproducing the clustering-at-cap behavior
    /// the original shows when the quota is tighter than the range.
    pub fn sample_datagram_len(&self, quota: u64, remaining: u64) -> usize {
        let low = self.packet_size.low();
        let high = self.packet_size.high();
        let sampled_max = if low == high {
            low
        } else {
            self.rng.borrow_mut().gen_range(low..=high)
        };
        quota.min(sampled_max).min(remaining).min(BUFFER_SIZE as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_never_below_low_or_above_cap() {
        let transport = UdpTransport {
            socket: {
                // Not used by `sample_datagram_len`; a bound-but-unconnected
                // socket is enough to exercise the sampler in isolation.
                let std_socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
                std_socket.set_nonblocking(true).unwrap();
                UdpSocket::from_std(std_socket).unwrap()
            },
            packet_size: Range::new(100, 1000),
            rng: RefCell::new(SmallRng::seed_from_u64(7)),
        };
        for _ in 0..50 {
            let len = transport.sample_datagram_len(10_000, 10_000);
            assert!((100..=1000).contains(&(len as u64)));
        }
        assert_eq!(transport.sample_datagram_len(50, 10_000), 50);
    }
}
