//! cmdgate core library: command whitelist, shell executor, and the HTTP gateway
//! used by the CLI.

pub mod config;
pub mod exec;
pub mod gateway;
pub mod init;
pub mod whitelist;
