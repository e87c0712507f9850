pub mod app;
pub mod config;
pub mod error;
pub mod keypairs;
pub mod middleware;
pub mod server;
