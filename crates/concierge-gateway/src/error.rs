use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Malformed gateway frame: {0}")]
    MalformedFrame(String),

    #[error("Failed to connect to gateway: {0}")]
    Connect(String),

    #[error("Gateway transport closed: {0}")]
    TransportClosed(String),

    #[error("Discord API returned {status}: {body}")]
    UpstreamRest { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Server error: {0}")]
    ServerError(String),
}
