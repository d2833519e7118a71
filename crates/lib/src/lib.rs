//! Analyst core library — session state, upload/chat client, and rendering
//! used by both the CLI and desktop applications.

pub mod api;
pub mod chat;
pub mod config;
pub mod debug_log;
pub mod files;
pub mod init;
pub mod render;
pub mod session;
pub mod upload;
