use crate::addr::SocketName;

/// Errors that can occur in side-band transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create, bind, or listen on the rendezvous socket.
    #[error("failed to bind to {name}: {source}")]
    Bind {
        name: SocketName,
        source: std::io::Error,
    },

    /// Failed to connect to the specified socket.
    #[error("failed to connect to {name}: {source}")]
    Connect {
        name: SocketName,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket name does not fit in `sockaddr_un.sun_path`.
    #[error("socket name too long ({len} bytes, max {max}): {name}")]
    NameTooLong {
        name: SocketName,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
