//! TCP transport, ported from `TcpSocket.cpp`/`TcpSession.cpp`.
//!
//! The socket is never split: `tokio::net::TcpStream` implements
//! `AsyncRead`/`AsyncWrite` for `&TcpStream`, so the TX and RX loops
//! can each hold their own clone of the same `Rc<TcpStream>` and drive
//! reads and writes concurrently without a `RefCell` in the way.

use std::io;
use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};

use crate::config::{Mode, SessionConfig};

#[derive(Clone)]
pub struct TcpTransport {
    stream: Rc<TcpStream>,
}

pub async fn open(config: &SessionConfig) -> io::Result<TcpTransport> {
    let stream = match config.mode {
        Mode::Client => connect(config).await?,
        Mode::Server => accept(config).await?,
    };
    stream.set_nodelay(true)?;
    Ok(TcpTransport {
        stream: Rc::new(stream),
    })
}

async fn connect(config: &SessionConfig) -> io::Result<TcpStream> {
    let remote = config.endpoint.remote_addr()?;
    let socket = new_socket(remote)?;
    if let Ok(local) = config.endpoint.local_addr() {
        socket.bind(local)?;
    }
    apply_windows(&socket, config.windows)?;
    socket.connect(remote).await
}

async fn accept(config: &SessionConfig) -> io::Result<TcpStream> {
    // The "remote" half of the endpoint grammar doubles as the bind
    // address in server mode (spec §3: endpoint grammar).
    let bind_addr = config.endpoint.remote_addr()?;
    let socket = new_socket(bind_addr)?;
    apply_windows(&socket, config.windows)?;
    socket.bind(bind_addr)?;
    let listener = socket.listen(1024)?;
    let (stream, _peer) = listener.accept().await?;
    Ok(stream)
}

fn new_socket(addr: std::net::SocketAddr) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    Ok(socket)
}

fn apply_windows(socket: &TcpSocket, windows: u64) -> io::Result<()> {
    if windows != 0 {
        socket.set_send_buffer_size(windows as u32)?;
        socket.set_recv_buffer_size(windows as u32)?;
    }
    Ok(())
}

impl TcpTransport {
    pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let mut s = &*self.stream;
        s.write(buf).await
    }

    pub async fn receive(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut s = &*self.stream;
        s.read(buf).await
    }

    /// Arm `TCP_QUICKACK` ahead of each receive so a delayed-ACK timer
    /// never shows up as throughput jitter, mirroring the setsockopt
    /// call `TcpSession::async_receive` makes on every iteration.
    /// No-op outside Linux.
    pub fn prepare_receive(&self) {
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;
            let fd = self.stream.as_raw_fd();
            let flag: libc::c_int = 1;
            unsafe {
                libc::setsockopt(
                    fd,
                    libc::IPPROTO_TCP,
                    libc::TCP_QUICKACK,
                    &flag as *const _ as *const libc::c_void,
                    std::mem::size_of_val(&flag) as libc::socklen_t,
                );
            }
        }
    }

    pub async fn shutdown_send(&self) -> io::Result<()> {
        let mut s = &*self.stream;
        s.shutdown().await
    }

    /// Read-to-EOF probe backing the `wait_for_peer` shutdown policy.
    /// `Ok(true)` means the peer closed cleanly; `Ok(false)` means it
    /// sent more data instead of closing.
    pub async fn wait_for_peer_close(&self) -> io::Result<bool> {
        let mut probe = [0u8; 1];
        let mut s = &*self.stream;
        let n = s.read(&mut probe).await?;
        Ok(n == 0)
    }
}
