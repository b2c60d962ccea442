//! Application layer: settings, command options and runners

pub mod options;
pub mod run;
pub mod settings;
