//! Domain events module.
//!
//! Services emit these after a ledger commit succeeds. The server wires a
//! sink that logs them.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
