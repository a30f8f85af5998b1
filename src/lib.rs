pub mod chat;
pub mod client;
pub mod code_sync;
pub mod config;
pub mod errors;
pub mod execution;
pub mod history;
