//! # storefront
//!
//! Server-rendered web shop backed by hosted services.
//!
//! ```text
//! Browser ──► axum Router (TraceLayer, CSRF, session)
//!                 │
//!                 ├── handlers ──► services
//!                 │                  │
//!                 │                  ├── Store / IdentityProvider ──► hosted database/auth platform
//!                 │                  └── PaymentGateway           ──► payment processor
//!                 └── Templates (tera)
//! ```
//!
//! Persistence, authentication and payment settlement belong to the hosted
//! services; this crate validates requests, keeps orders in step with payment
//! events, and renders pages.

pub mod app_state;
pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod templates;
