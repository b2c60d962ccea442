//! Fleet control plane API
//!
//! Request and response bodies exchanged with the fleet control plane.

pub mod models;
