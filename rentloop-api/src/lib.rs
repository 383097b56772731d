//! # Rentloop API Server Library
//!
//! HTTP surface of the rentloop marketplace: identity, catalog, rentals,
//! payments and uploads, served from one axum router.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Response security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
