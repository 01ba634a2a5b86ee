//! Command, query and synchronization services.

pub mod commands;
pub mod error;
pub mod jobs;
pub mod queries;
pub mod repos;
pub mod sync;
