// src/api/http/mod.rs

pub mod health;

pub use health::{generic_banner, health_check};
