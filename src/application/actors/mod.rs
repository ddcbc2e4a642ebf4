pub mod bot_controller;

pub use bot_controller::{BotConfig, BotController, BotControllerHandle, BotDependencies, BotStatus};
