//! Taiwanese House ordering API library.
//!
//! The binary in `main.rs` wires these modules together; the integration
//! tests drive the same router against the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
