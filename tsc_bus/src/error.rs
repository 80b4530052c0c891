use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to encode outbound frame: {0}")]
    Encode(String),

    #[error("failed to decode inbound frame: {0}")]
    Decode(String),

    #[error("core channel disconnected")]
    Disconnected,
}
