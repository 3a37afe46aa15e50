pub mod config;
pub mod logging;

pub mod control;
pub mod controller;
pub mod events;
pub mod job;
pub mod metadata;
pub mod orchestrator;
pub mod paths;
pub mod provider;
pub mod retry;
pub mod rotation;
pub mod store;
pub mod transfer;
