use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::Path;

use socket2::Socket;
use tracing::{debug, info};

use crate::addr::SocketName;
use crate::error::{Result, TransportError};
use crate::stream::{new_socket, SeqpacketStream};

/// Listening seqpacket socket for the side-band rendezvous.
///
/// The listening descriptor is non-blocking: [`accept`](Self::accept)
/// returns `Ok(None)` when no connection is pending so the caller can poll
/// a shutdown flag between attempts.
pub struct SeqpacketListener {
    socket: Socket,
    name: SocketName,
    created_inode: Option<(u64, u64)>,
}

impl SeqpacketListener {
    /// Default backlog of pending-but-unaccepted connections.
    pub const DEFAULT_BACKLOG: i32 = 3;
    /// Default permission mode for filesystem socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind and listen with the default backlog.
    pub fn bind(name: &SocketName) -> Result<Self> {
        Self::bind_with_backlog(name, Self::DEFAULT_BACKLOG)
    }

    /// Bind and listen on `name` with an explicit backlog.
    ///
    /// For a filesystem path, a stale socket file is removed first; any
    /// other existing file is refused.
    pub fn bind_with_backlog(name: &SocketName, backlog: i32) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            name: name.clone(),
            source,
        };
        let addr = name.to_sockaddr()?;

        if let SocketName::Path(path) = name {
            remove_stale_socket(path).map_err(bind_err)?;
        }

        let socket = new_socket().map_err(bind_err)?;
        socket.bind(&addr).map_err(bind_err)?;
        socket.listen(backlog).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let created_inode = match name {
            SocketName::Path(path) => {
                std::fs::set_permissions(
                    path,
                    std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
                )
                .map_err(bind_err)?;
                let meta = std::fs::symlink_metadata(path).map_err(bind_err)?;
                Some((meta.dev(), meta.ino()))
            }
            SocketName::Abstract(_) => None,
        };

        info!(%name, backlog, "listening on seqpacket socket");

        Ok(Self {
            socket,
            name: name.clone(),
            created_inode,
        })
    }

    /// Accept a pending connection, or `Ok(None)` if none is waiting.
    ///
    /// The accepted stream is blocking; timeouts are set per stream.
    pub fn accept(&self) -> Result<Option<SeqpacketStream>> {
        loop {
            match self.socket.accept() {
                Ok((socket, _)) => {
                    // Accepted streams always block; only accept polls.
                    socket.set_nonblocking(false)?;
                    debug!(name = %self.name, "accepted connection");
                    return Ok(Some(SeqpacketStream::from_socket(socket)));
                }
                Err(err) => match err.kind() {
                    io::ErrorKind::WouldBlock => return Ok(None),
                    io::ErrorKind::Interrupted => continue,
                    _ => return Err(TransportError::Accept(err)),
                },
            }
        }
    }

    /// The name this socket is bound to.
    pub fn name(&self) -> &SocketName {
        &self.name
    }
}

/// Remove a stale socket at `path`, but never a non-socket file.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "existing path is not a unix socket",
        ));
    }
    debug!(?path, "removing stale socket");
    std::fs::remove_file(path)
}

impl Drop for SeqpacketListener {
    fn drop(&mut self) {
        let (SocketName::Path(path), Some((expected_dev, expected_ino))) =
            (&self.name, self.created_inode)
        else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(?path, "cleaning up socket file");
                let _ = std::fs::remove_file(path);
            } else {
                debug!(?path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

impl std::fmt::Debug for SeqpacketListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeqpacketListener")
            .field("name", &self.name)
            .field("fd", &self.socket.as_raw_fd())
            .finish()
    }
}
