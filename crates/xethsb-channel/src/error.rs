use xethsb_frame::Kind;

/// Errors that can occur in side-band channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xethsb_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xethsb_frame::FrameError),

    /// A message referenced an ifindex the registry does not know.
    #[error("no such device: ifindex {0}")]
    NoSuchDevice(i32),

    /// A stat message carried an index outside the stat array.
    #[error("{kind} index {index} out of range")]
    InvalidStatIndex { kind: Kind, index: u32 },

    /// The controller sent a kind that only flows towards it.
    #[error("unexpected {0} message from controller")]
    UnexpectedKind(Kind),

    /// The channel configuration is inconsistent.
    #[error("invalid channel config: {0}")]
    InvalidConfig(String),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
