pub mod config;
pub mod platform;
pub mod protocol;
pub mod resolve;
pub mod store;
pub mod update;
