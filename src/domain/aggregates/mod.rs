//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, ProductError, ProductStatus};
pub use order::{Order, OrderError, OrderStatus, PaymentMethod, LineItem};
pub use cart::{Cart, CartError, CartLine, MAX_LINES, STOCK_ERROR_MSG};
