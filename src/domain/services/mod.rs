pub mod execution;
pub mod indicators;
pub mod position_manager;
pub mod risk_manager;
pub mod signal_aggregator;
pub mod strategies;
