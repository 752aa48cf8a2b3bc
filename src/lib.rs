//! Chaleur Commerce
//!
//! Back-end of a French/Arabic storefront for a heating-equipment retailer
//! in Algeria. Cash on delivery is the primary payment path.
//!
//! ## Features
//! - Product catalog with bilingual names, prices in DZD
//! - Stock-validated cart: every quantity change is checked against live stock
//! - Atomic stock reservation on checkout, release on cancellation
//! - Order management and low-stock reporting for the back-office

pub mod config;
pub mod domain;
pub mod error;
pub mod orders;
pub mod routes;
pub mod stock;
pub mod store;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use error::{ApiError, StockError};
pub use routes::AppState;
pub use stock::{StockService, DEFAULT_LOW_STOCK_THRESHOLD};
