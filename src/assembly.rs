//! Cellwise construction of local systems and their assembly into global sparse systems.
pub mod enforcement;
pub mod global;
pub mod hodge;
pub mod local;
