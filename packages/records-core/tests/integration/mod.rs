//! Integration tests for the record store.

mod persistence_tests;
mod store_tests;
