pub mod config;
pub mod drive_store;
pub mod engine;
pub mod error;
pub mod fake_feed;
pub mod feed;
pub mod fetch;
pub mod field_state;
pub mod fingerprint;
pub mod http_cache;
pub mod http_client;
pub mod participants;
pub mod scheduler;
pub mod state;
pub mod win_prob;
