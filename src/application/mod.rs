pub mod engine_config;
pub mod ports;
pub mod scheduler;
pub mod usecases;

pub use engine_config::*;
pub use ports::*;
