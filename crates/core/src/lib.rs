//! Taiwanese House Core - Shared domain library.
//!
//! This crate provides the domain types used across all Taiwanese House
//! components:
//! - `server` - JSON API consumed by the mobile ordering app
//! - `cli` - Command-line tools for migrations, menu seeding and coin grants
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Pricing and validation live here so they can be
//! tested in isolation and reused by any storage backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, coins, emails, phone numbers and statuses
//! - [`menu`] - Menu categories, items and add-ons
//! - [`cart`] - Cart lines and selection validation
//! - [`pricing`] - Subtotals, coin discounts and checkout quotes
//! - [`payment`] - Simulated payment details and card checks
//! - [`order`] - Placed orders
//! - [`account`] - Profile, password and feedback validation
//! - [`flow`] - Login methods and the password-recovery progression

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod cart;
pub mod flow;
pub mod menu;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod types;

pub use types::*;
