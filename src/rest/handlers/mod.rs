//! REST API Handlers
//!
//! Contains all HTTP endpoint handlers organized by domain.

pub mod ask;
pub mod databases;
pub mod schema;
