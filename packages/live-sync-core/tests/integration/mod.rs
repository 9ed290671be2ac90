//! Integration suite for the core crate.
//!
//! 1. Statement model against a live catalog
//! 2. Transactions and commit publication
//! 3. Joined reads on the relational configuration

pub mod helpers;
pub mod join_tests;
pub mod statement_tests;
pub mod transaction_tests;
