//! Server module for Chansync
//!
//! Contains the main server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `init`: Component wiring and the main server run loop

pub mod config;
mod init;
mod loader;

// Re-export public API
pub use init::{build_components, build_router, run, Components};
pub use loader::load_config;
