use thiserror::Error;

/// Main error type for Krill operations
#[derive(Error, Debug)]
pub enum KrillError {
    #[error("document id must not be empty")]
    EmptyDocId,

    #[error("no data found for key")]
    NoData,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("lease not found")]
    LeaseNotFound,

    #[error("no endpoints available for service {0}")]
    NoEndpoints(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for Krill operations
pub type Result<T> = std::result::Result<T, KrillError>;

impl KrillError {
    /// Check whether this is the distinguished missing-key error of the
    /// forward index.
    pub fn is_no_data(&self) -> bool {
        matches!(self, KrillError::NoData)
    }

    /// Check whether this error means the registration lease has expired
    /// and the caller should re-register from scratch.
    pub fn is_lease_not_found(&self) -> bool {
        matches!(self, KrillError::LeaseNotFound)
    }
}

impl From<sled::Error> for KrillError {
    fn from(e: sled::Error) -> Self {
        KrillError::Storage(e.to_string())
    }
}

impl From<tonic::Status> for KrillError {
    fn from(s: tonic::Status) -> Self {
        KrillError::Rpc(s.to_string())
    }
}

impl From<tonic::transport::Error> for KrillError {
    fn from(e: tonic::transport::Error) -> Self {
        KrillError::Transport(e.to_string())
    }
}
