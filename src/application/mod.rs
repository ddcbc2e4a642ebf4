pub mod actors;
pub mod log_bus;
pub mod services;
