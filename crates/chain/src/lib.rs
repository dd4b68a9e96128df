//! Vaultledger Chain - network-facing collaborators of the ledger.
//!
//! Provides the JSON-RPC [`RpcVaultEventSource`] the scanner reads vault
//! logs from, and an HTTP [`HttpPriceOracle`] for goal valuation.

pub mod errors;
pub mod event_source;
pub mod price_oracle;
pub mod rpc;

pub use errors::ChainClientError;
pub use event_source::RpcVaultEventSource;
pub use price_oracle::HttpPriceOracle;
pub use rpc::JsonRpcClient;
