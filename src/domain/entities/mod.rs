pub mod bot_log;
pub mod market;
pub mod opportunity;
pub mod position;
pub mod settings;
pub mod trade;
