use thiserror::Error;

/// Why a listing request was turned away at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("too many requests, try again later")]
    RateLimited,
    #[error("collection listing already in progress")]
    AlreadyInProgress,
    #[error("too many collections being listed, try again later")]
    CapacityExceeded,
    #[error("collection already listed")]
    AlreadyListed,
    #[error("failed to list collection")]
    Internal,
}
