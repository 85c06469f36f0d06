//! Error types for the SAT>IP RTP/RTCP streaming core.

/// Errors surfaced from the streaming data plane.
///
/// RTCP send failures are deliberately *not* represented here — per the
/// reporter's failure semantics they are logged and otherwise ignored, so
/// there is no typed error for a caller to act on.
#[derive(Debug, thiserror::Error)]
pub enum SatipError {
    /// Underlying socket I/O error (RTP send, or RTCP send on a caller-owned
    /// socket returned to the caller for inspection).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A flush or send on the RTP socket failed; fatal to the owning session.
    #[error("RTP send failed, session terminating: {0}")]
    FlushFailed(std::io::Error),

    /// An MPEG-TS payload handed to the packer was not a multiple of 188
    /// bytes. In release builds the packer only `debug_assert!`s this; this
    /// variant exists for the checked constructors used by tests and by
    /// callers that want to validate untrusted input explicitly.
    #[error("MPEG-TS payload length {len} is not a multiple of 188")]
    NonAligned { len: usize },
}

/// Convenience alias for `Result<T, SatipError>`.
pub type Result<T> = std::result::Result<T, SatipError>;
