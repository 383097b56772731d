//! # Rentloop Worker Library
//!
//! Background settlement for the marketplace: payments left uncaptured after
//! their rental was returned are captured through the processor on a fixed
//! interval.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `settlement`: the sweep and its loop

pub mod config;
pub mod settlement;
