//! Zapgate - WhatsApp gateway session lifecycle and message dispatch.

pub mod build_info;
pub mod client;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod session;
pub mod signature;
pub mod store;
pub mod templates;
