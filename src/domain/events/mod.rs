//! Domain events
use crate::domain::value_objects::Sku;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::Product(ProductEvent::Created { .. }) => "commerce.product.created",
            DomainEvent::Product(ProductEvent::StockReserved { .. }) => "commerce.stock.reserved",
            DomainEvent::Product(ProductEvent::StockReleased { .. }) => "commerce.stock.released",
            DomainEvent::Order(OrderEvent::Confirmed { .. }) => "commerce.order.confirmed",
            DomainEvent::Order(OrderEvent::Cancelled { .. }) => "commerce.order.cancelled",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: String, sku: Sku },
    StockReserved { product_id: String, quantity: u32 },
    StockReleased { product_id: String, quantity: u32 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    Confirmed { order_id: String, total: Decimal },
    Cancelled { order_id: String },
}
