pub mod backend_client;
pub mod mention_feed;
pub mod price_provider;
