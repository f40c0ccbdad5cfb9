//! Core business logic module
//!
//! This module contains the domain models, configuration, the collaborator
//! boundaries (media provider, player backend) and the process supervisor.

pub mod config;
pub mod models;
pub mod player;
pub mod provider;
pub mod supervisor;
pub mod ytdlp;


// Re-export commonly used types
pub use config::AppConfig;
pub use supervisor::{ProcessSupervisor, SupervisorEvent};
