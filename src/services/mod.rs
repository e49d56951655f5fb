//! Business logic services.
//!
//! Services contain the storefront's rules separated from HTTP handlers.
//! They only talk to the hosted services through the traits in `clients`.

pub mod checkout_service;
pub mod webhook_service;
