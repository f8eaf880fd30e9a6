//! Side-effecting adapters: environment, processes, files.

pub mod build;
pub mod config;
pub mod disk;
pub mod launcher;
pub mod pump;
