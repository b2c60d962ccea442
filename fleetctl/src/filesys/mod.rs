//! Local filesystem access

pub mod dir;
pub mod file;
pub mod objects;

pub use objects::FileObjectStore;
