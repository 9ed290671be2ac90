//! Transaction engine: scoped writes, coalesced change events and
//! per-database value hooks.

mod pending;
#[allow(clippy::module_inception)]
mod transaction;
mod value_hooks;

pub use transaction::{Transaction, TransactionState};
pub use value_hooks::{ValueGenerator, ValueHooks, WriteKind};
