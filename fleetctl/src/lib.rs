//! fleetctl library
//!
//! Rolling deployments and rollbacks of a containerized service running on
//! an elastic, load-balanced fleet, with a durable history of every attempt.

pub mod app;
pub mod cloud;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod health;
pub mod history;
pub mod http;
pub mod logs;
pub mod models;
pub mod shutdown;
pub mod utils;
