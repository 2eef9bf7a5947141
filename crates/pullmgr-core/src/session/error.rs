use thiserror::Error;

/// Failure reported by a transfer session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The remote listing (or the session itself) could not be obtained.
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    /// A single file transfer failed.
    #[error("transfer of {path} failed")]
    Transfer {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The remote relative path would escape the local root.
    #[error("invalid remote path: {0:?}")]
    InvalidPath(String),
    /// The session was ended before the call.
    #[error("session has ended")]
    Ended,
}
