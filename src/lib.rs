//! Library crate for idleforge-back, exposing modules for binaries and integration tests.

pub mod cache;
pub mod config;
pub mod dao;
pub mod domain;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod stream;
