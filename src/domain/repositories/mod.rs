pub mod market_data;
pub mod order_venue;
pub mod store;
