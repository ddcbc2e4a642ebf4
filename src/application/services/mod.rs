pub mod trading_engine;

pub use trading_engine::TradingEngine;
