//! rxcart - checkout and payment reconciliation for an online pharmacy storefront
//!
//! This library provides the order store, the Stripe Checkout integration, and the
//! HTTP handlers that create checkout sessions and reconcile paid sessions back onto
//! orders.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod money;
pub mod pagination;
pub mod payments;
pub mod reconcile;
pub mod util;
