use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Kind identifier of the multiplexor; also the default rendezvous name.
pub const XETH_KIND: &str = "xeth";

/// Capacity of `sockaddr_un.sun_path` on Linux.
const SUN_PATH_LEN: usize = 108;

/// Address of a side-band rendezvous socket.
///
/// Abstract names live in the Linux abstract namespace (`sun_path[0] == 0`)
/// and need no filesystem cleanup. They are written `@name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SocketName {
    /// Linux abstract namespace name, without the leading NUL.
    Abstract(String),
    /// Filesystem socket path.
    Path(PathBuf),
}

impl SocketName {
    /// Abstract name derived from a kind identifier.
    pub fn abstract_name(name: impl Into<String>) -> Self {
        Self::Abstract(name.into())
    }

    /// Whether this is an abstract (non-filesystem) name.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Abstract(_))
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Abstract(name) => name.as_bytes(),
            Self::Path(path) => {
                use std::os::unix::ffi::OsStrExt;
                path.as_os_str().as_bytes()
            }
        }
    }

    /// Build the `sockaddr_un` for this name.
    ///
    /// Abstract names are passed with a leading NUL, which `socket2` maps to
    /// the abstract namespace.
    #[cfg(target_os = "linux")]
    pub(crate) fn to_sockaddr(&self) -> Result<socket2::SockAddr> {
        let bytes = self.as_bytes();
        // Abstract names need a leading NUL, paths a trailing one.
        let max = SUN_PATH_LEN - 1;
        if bytes.len() > max {
            return Err(TransportError::NameTooLong {
                name: self.clone(),
                len: bytes.len(),
                max,
            });
        }
        if !self.is_abstract() && bytes.contains(&0) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "socket path contains an interior NUL byte",
            )));
        }

        let addr = match self {
            Self::Abstract(name) => {
                use std::os::unix::ffi::OsStrExt;
                let mut raw = Vec::with_capacity(name.len() + 1);
                raw.push(0);
                raw.extend_from_slice(name.as_bytes());
                socket2::SockAddr::unix(std::ffi::OsStr::from_bytes(&raw))?
            }
            Self::Path(path) => socket2::SockAddr::unix(path)?,
        };
        Ok(addr)
    }
}

impl Default for SocketName {
    fn default() -> Self {
        Self::Abstract(XETH_KIND.to_string())
    }
}

impl fmt::Display for SocketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abstract(name) => write!(f, "@{name}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for SocketName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.strip_prefix('@') {
            Some(name) => Self::Abstract(name.to_string()),
            None => Self::Path(PathBuf::from(s)),
        })
    }
}
