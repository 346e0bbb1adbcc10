use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("malformed signaling message: {0}")]
    Parse(String),

    #[error("failed to connect to relay: {0}")]
    Connect(String),

    #[error("relay connection closed")]
    Closed,

    #[error("failed to send signaling message: {0}")]
    Send(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("offer from {0} collided with a local offer in flight")]
    Glare(String),

    #[error("connection already closed")]
    Closed,

    #[error("no connection for peer {0}")]
    UnknownEdge(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("processing primitive unavailable: {0}")]
    Unsupported(String),

    #[error("denoiser init failed: {0}")]
    ModelInit(String),

    #[error("failed to attach processing node: {0}")]
    Attach(String),

    #[error("track is not an audio track: {0}")]
    NotAudio(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
