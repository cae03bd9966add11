//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Signup, password and phone-code login, recovery, account edits
//! - `verification` - One-time codes (issue, check, consume)
//! - `notify` - Code delivery by email (SMTP) or log
//! - `menu` - Cached menu reads and menu imports
//! - `cart` - Cart edits and live cart snapshots
//! - `checkout` - Orders, simulated payment and loyalty coins

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod menu;
pub mod notify;
pub mod verification;
