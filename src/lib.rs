//! A decoy SMTP server: speaks enough SMTP to convince a sender that mail
//! was accepted, while tarpitting and soft-rejecting misbehaved clients.

pub mod abuse;
pub mod commands;
pub mod config;
pub mod connection;
pub mod engine;
pub mod limits;
pub mod replies;
pub mod server;
pub mod session;
pub mod storage;
pub mod utils;
pub mod validate;
