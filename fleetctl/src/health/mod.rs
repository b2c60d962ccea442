//! Health verification gates

pub mod fleet;
pub mod gate;

pub use fleet::FleetHealthGate;
pub use gate::HealthGate;
