//! HTTP adapters for the fleet control plane and member endpoints

pub mod client;
pub mod fleet;
pub mod objects;
pub mod probe;
pub mod targets;

pub use client::HttpClient;
pub use probe::HttpProbe;
