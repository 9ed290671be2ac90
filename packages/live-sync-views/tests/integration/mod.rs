//! Integration tests for live views.

pub mod composite_key_tests;
pub mod dependent_param_tests;
pub mod helpers;
pub mod join_tests;
pub mod lifecycle_tests;
pub mod view_tests;
