pub mod api;
pub mod config;
pub mod dashboard;
pub mod edits;
pub mod error;
pub mod logging;
pub mod mac;
pub mod models;
pub mod network;
pub mod oui;
pub mod ping;
pub mod scanner;
pub mod store;
pub mod view;
