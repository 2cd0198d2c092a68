//! Configuration types for the session service
//!
//! Re-exports configuration from lampion-core to avoid circular dependencies

pub use lampion_core::config::LampionConfig;
