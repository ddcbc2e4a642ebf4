//! dualbot
//!
//! Two independently controlled trading bots, one for spot and one for
//! leverage, sharing a persistence layer and a log bus. Each bot re-evaluates
//! its symbols on a fixed interval: indicators, strategy signals, risk sizing,
//! paper or live execution, and position lifecycle.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
