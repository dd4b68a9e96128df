//! Error types for the chain client.

use thiserror::Error;
use vaultledger_core::Error as CoreError;

/// Errors raised while talking to a JSON-RPC node or price endpoint.
#[derive(Error, Debug)]
pub enum ChainClientError {
    /// Connection, timeout or body read failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx HTTP status.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code} calling {method}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Malformed response to {method}: {message}")]
    MalformedResponse { method: String, message: String },
}

impl ChainClientError {
    pub fn malformed(method: &str, message: impl Into<String>) -> Self {
        ChainClientError::MalformedResponse {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

/// Everything the client can fail with is an event-source failure from the
/// ledger's point of view; the scanner retries it.
impl From<ChainClientError> for CoreError {
    fn from(err: ChainClientError) -> Self {
        CoreError::ExternalFetchFailure(err.to_string())
    }
}
