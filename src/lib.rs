pub mod app;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod render;
pub mod rpc;
pub mod state;
