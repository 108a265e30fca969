/// Errors that can occur during message encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer does not start with the message header signature.
    #[error("not a side-band message (header signature mismatch)")]
    NotMessage,

    /// The buffer is shorter than the header or the kind's payload layout.
    #[error("truncated {kind} frame ({len} bytes, need {need})")]
    Truncated {
        kind: &'static str,
        len: usize,
        need: usize,
    },

    /// The header declares a kind this codec does not know.
    #[error("unknown message kind {0}")]
    UnknownKind(u32),

    /// The encoded frame would exceed the jumbo frame bound.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A FIB entry carries more next-hops than its count field can express.
    #[error("too many next-hops ({0}, max 255)")]
    TooManyNextHops(usize),

    /// The frame buffer could not be allocated.
    #[error("frame allocation failed ({0} bytes)")]
    Alloc(usize),
}

pub type Result<T> = std::result::Result<T, FrameError>;
