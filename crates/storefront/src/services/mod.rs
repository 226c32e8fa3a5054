//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Session cart store and catalog-backed cart edits
//! - `inventory` - Available sizes and stock checks (fail closed)
//! - `orders` - Order writer and order numbers
//! - `stock` - Post-order stock decrement
//! - `notifications` - Admin feed entries and customer email
//! - `accounts` - Inline account creation (argon2)
//! - `checkout` - The checkout orchestrator
//! - `tracking` - Guest order lookup
//! - `admin` - Order management and dashboard

pub mod accounts;
pub mod admin;
pub mod cart;
pub mod checkout;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod stock;
pub mod tracking;
