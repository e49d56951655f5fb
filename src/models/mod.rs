//! Data models mirroring the hosted services' records.
//!
//! The hosted database owns the tables; these types are how the storefront
//! reads and writes them.

/// Catalog products
pub mod product;
/// Orders and their payment lifecycle
pub mod order;
/// Users and auth sessions
pub mod user;
/// Checkout sessions and webhook events
pub mod payment;
