//! # Rentloop Shared Library
//!
//! Types and business logic shared by the Rentloop API server and the
//! settlement worker.
//!
//! ## Module Organization
//!
//! - `auth`: passwords, bearer tokens, request authentication
//! - `db`: connection pool and embedded migrations
//! - `models`: database models
//! - `booking`: overlap detection and deposit calculation
//! - `catalog`: the catalog collaborator used by rentals and payments
//! - `ledger`: booking and returning rentals
//! - `payments`: fees, processor client, webhooks, settlement

pub mod auth;
pub mod booking;
pub mod catalog;
pub mod db;
pub mod ledger;
pub mod models;
pub mod payments;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
