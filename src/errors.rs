//! Internal error type for transport and configuration plumbing.
//!
//! Callers of [`LicenseClient`](crate::client::LicenseClient) never see these
//! directly: the facade converts them into a transport [`Fault`](crate::fault::Fault).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FantasticoError {
    /// The HTTP request could not be sent or the connection dropped.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The connect or request timeout elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success HTTP status.
    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The SOAP envelope carried a `Fault` element instead of a response.
    #[error("SOAP fault {code}: {message}")]
    SoapFault { code: String, message: String },

    /// The service description could not be used to locate the endpoint.
    #[error("WSDL error: {0}")]
    WsdlError(String),

    /// The response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type FantasticoResult<T> = Result<T, FantasticoError>;

impl From<reqwest::Error> for FantasticoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FantasticoError::Timeout(err.to_string())
        } else if err.is_decode() {
            FantasticoError::DecodeError(err.to_string())
        } else {
            FantasticoError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FantasticoError {
    fn from(err: serde_json::Error) -> Self {
        FantasticoError::DecodeError(err.to_string())
    }
}

impl From<config::ConfigError> for FantasticoError {
    fn from(err: config::ConfigError) -> Self {
        FantasticoError::ConfigError(err.to_string())
    }
}
