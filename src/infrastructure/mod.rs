pub mod http_market_data;
pub mod http_order_venue;

pub use http_market_data::HttpMarketData;
pub use http_order_venue::HttpOrderVenue;
