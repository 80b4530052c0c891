use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to serialize status snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write telemetry frame: {0}")]
    Io(#[from] std::io::Error),
}
