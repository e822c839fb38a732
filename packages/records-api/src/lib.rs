//! REST API server for playbook records.
//!
//! Provides the HTTP endpoints for the record and playbook resources and the
//! request routing in front of them.

pub mod handlers;
pub mod router;
pub mod server;
