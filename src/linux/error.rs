//! Internal error type for setup/IO call sites (§3.2, §7.1).
//!
//! This is strictly plumbing: every call site that produces one is already
//! inside a step of the ordered setup sequence or the supervisor loop that
//! has exactly one specific exit code to report on failure, so callers
//! convert it to that exit code immediately. It exists so those call sites
//! can use `?` instead of hand-rolling error propagation, and so that the
//! rare case where it does get logged has a readable message.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("system call failed (errno {code})")]
    Syscall { code: i32 },

    #[error("sandbox user {name:?} does not resolve to a uid")]
    UserNotFound { name: String },

    #[error("bind-mounting {src:?} failed")]
    MountFailed { src: String },

    #[error("chroot setup failed")]
    ChrootFailed,

    #[error("fork() failed")]
    Fork,
}

impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Self {
        match err.as_errno() {
            Some(errno) => Error::Syscall { code: errno as i32 },
            None => Error::Syscall { code: -1 },
        }
    }
}

impl From<errno::Errno> for Error {
    fn from(err: errno::Errno) -> Self {
        Error::Syscall { code: err.0 }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
