//! Findings server library.
//!
//! This library provides the core functionality for the findings server:
//! the finding submission workflow, database operations, object storage,
//! and API services.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
