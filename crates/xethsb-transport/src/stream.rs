use std::io::{self, Read};
use std::net::Shutdown;
use std::os::fd::AsRawFd;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tracing::debug;

use crate::addr::SocketName;
use crate::error::{Result, TransportError};

/// A connected seqpacket socket.
///
/// Every `send` writes exactly one datagram and every `recv` returns at
/// most one. All operations take `&self`, so one stream can be shared by
/// an RX and a TX worker behind an `Arc`.
pub struct SeqpacketStream {
    socket: Socket,
}

/// Credentials of the connected peer, from `SO_PEERCRED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
}

/// New close-on-exec `AF_UNIX` seqpacket socket.
pub(crate) fn new_socket() -> io::Result<Socket> {
    Socket::new(Domain::UNIX, Type::SEQPACKET, None)
}

impl SeqpacketStream {
    pub(crate) fn from_socket(socket: Socket) -> Self {
        Self { socket }
    }

    /// Connect to a listening seqpacket socket (blocking).
    pub fn connect(name: &SocketName) -> Result<Self> {
        let connect_err = |source| TransportError::Connect {
            name: name.clone(),
            source,
        };
        let addr = name.to_sockaddr()?;
        let socket = new_socket().map_err(connect_err)?;
        socket.connect(&addr).map_err(connect_err)?;

        debug!(%name, "connected to seqpacket socket");
        Ok(Self::from_socket(socket))
    }

    /// Create a connected pair of anonymous seqpacket sockets.
    pub fn pair() -> Result<(Self, Self)> {
        let (a, b) = Socket::pair(Domain::UNIX, Type::SEQPACKET, None)?;
        Ok((Self::from_socket(a), Self::from_socket(b)))
    }

    /// Receive one datagram; it is truncated to `buf.len()`.
    ///
    /// `Ok(0)` means the peer closed the connection. A receive timeout
    /// surfaces as [`io::ErrorKind::WouldBlock`].
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.socket).read(buf)
    }

    /// Send one datagram, blocking until the socket accepts it.
    pub fn send(&self, frame: &[u8]) -> io::Result<usize> {
        self.socket.send_with_flags(frame, libc::MSG_NOSIGNAL)
    }

    /// Send one datagram without blocking.
    ///
    /// A full send buffer surfaces as [`io::ErrorKind::WouldBlock`].
    pub fn try_send(&self, frame: &[u8]) -> io::Result<usize> {
        self.socket
            .send_with_flags(frame, libc::MSG_NOSIGNAL | libc::MSG_DONTWAIT)
    }

    /// Set the receive timeout (`SO_RCVTIMEO`). `None` blocks forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        if timeout.is_some_and(|d| d.is_zero()) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot set a zero duration timeout",
            )));
        }
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Shut down both directions; blocked peers observe EOF.
    pub fn shutdown(&self) -> Result<()> {
        match self.socket.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already disconnected by the peer.
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Credentials of the connected peer, or `None` if unavailable.
    pub fn peer_credentials(&self) -> Option<PeerCredentials> {
        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and the descriptor is an open Unix socket owned by this stream.
        let rc = unsafe {
            libc::getsockopt(
                self.socket.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some(PeerCredentials {
                uid: cred.uid,
                gid: cred.gid,
                pid: cred.pid as u32,
            })
        } else {
            None
        }
    }
}

impl std::fmt::Debug for SeqpacketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeqpacketStream")
            .field("fd", &self.socket.as_raw_fd())
            .finish()
    }
}
