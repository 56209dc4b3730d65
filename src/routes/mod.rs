//! HTTP API routes

pub mod blobs;
pub mod health;
