//! Use-case services orchestrating domain objects over the ports.

pub mod device_service;
pub mod export_service;
pub mod source_facade;
pub mod workout_manager;
pub mod workout_service;
