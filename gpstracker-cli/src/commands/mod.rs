//! CLI command implementations.

pub mod config;
pub mod init;
pub mod replay;
pub mod run;
mod session;
