pub mod config;
pub mod errors;
pub mod hashing;
pub mod limiter;
pub mod server;
pub mod store;
