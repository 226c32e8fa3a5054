//! Larkspur Core - Shared domain types.
//!
//! This crate provides the types that flow through the checkout pipeline:
//! - `storefront` - HTTP service, repositories, and the checkout orchestrator
//! - `cli` - Command-line tools for migrations and stock management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart arithmetic and order-status transitions live
//! here so they can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`cart`] - Session cart and its line items
//! - [`order`] - Orders, order items, and the redacted tracking view
//! - [`inventory`] - Per-size stock records
//! - [`notification`] - Admin notification feed entries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod types;

pub use cart::{Cart, CartLine, LineKey, ProductSummary};
pub use inventory::{DecrementOutcome, InventoryRecord};
pub use notification::{AdminNotification, NewNotification};
pub use order::{CustomerDetails, Order, OrderDraft, OrderItem, OrderView, PaymentRecord};
pub use types::*;
