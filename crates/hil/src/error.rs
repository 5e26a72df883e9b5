use std::io;

/// Errors produced while framing or parsing MAVLink payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unknown message id: {0}")]
    UnknownMessageId(u8),

    #[error("Payload length mismatch for message {msg_id}: expected {expected}, got {actual}")]
    PayloadLength {
        msg_id: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Truncated payload: {0}")]
    Truncated(#[from] io::Error),
}

/// Errors produced by a transport while sending.
///
/// None of these are fatal for the bridge; the next step simply tries again.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Peer address unknown, nothing received yet")]
    PeerUnknown,

    #[error("Encode error: {0}")]
    Encode(#[from] CodecError),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
