//! Order aggregate.
//!
//! Line items snapshot name/price/quantity at placement and are immune to
//! later product mutation. Cash on delivery is the primary payment path.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::value_objects::Money;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug)]
pub struct Order {
    id: String,
    order_number: String,
    customer_name: String,
    customer_phone: String,
    status: OrderStatus,
    payment: PaymentMethod,
    items: Vec<LineItem>,
    subtotal: Money,
    shipping: Money,
    total: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug)] pub struct LineItem { pub id: String, pub product_id: String, pub name: String, pub sku: String, pub quantity: u32, pub unit_price: Money, pub total: Money }
#[derive(Clone, Debug, Default, PartialEq, Eq)] pub enum OrderStatus { #[default] Pending, Confirmed, Shipped, Delivered, Cancelled }
#[derive(Clone, Debug, Default, PartialEq, Eq)] pub enum PaymentMethod { #[default] CashOnDelivery, BankTransfer }

impl Order {
    pub fn create(order_number: impl Into<String>, customer_name: impl Into<String>, customer_phone: impl Into<String>, currency: &str) -> Self {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        Self {
            id: id.clone(), order_number: order_number.into(),
            customer_name: customer_name.into(), customer_phone: customer_phone.into(),
            status: OrderStatus::Pending, payment: PaymentMethod::CashOnDelivery,
            items: vec![], subtotal: Money::zero(currency), shipping: Money::zero(currency),
            total: Money::zero(currency), created_at: now, updated_at: now, events: vec![],
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn status(&self) -> &OrderStatus { &self.status }
    pub fn payment(&self) -> &PaymentMethod { &self.payment }
    pub fn total(&self) -> &Money { &self.total }
    pub fn items(&self) -> &[LineItem] { &self.items }

    pub fn add_item(&mut self, item: LineItem) { self.items.push(item); self.recalculate(); }

    pub fn set_shipping(&mut self, shipping: Money) { self.shipping = shipping; self.recalculate(); }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if self.items.is_empty() { return Err(OrderError::NoItems); }
        self.status = OrderStatus::Confirmed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Confirmed { order_id: self.id.clone(), total: self.total.amount() }));
        Ok(())
    }

    pub fn ship(&mut self) { self.status = OrderStatus::Shipped; self.touch(); }
    pub fn deliver(&mut self) { self.status = OrderStatus::Delivered; self.touch(); }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Delivered { return Err(OrderError::CannotCancel); }
        self.status = OrderStatus::Cancelled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id.clone() }));
        Ok(())
    }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(self.subtotal.currency()), |acc, i| acc.add(&i.total).unwrap_or(acc));
        self.total = self.subtotal.add(&self.shipping).unwrap_or(self.subtotal.clone());
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone)] pub enum OrderError { NoItems, CannotCancel }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::NoItems => write!(f, "Commande vide"), Self::CannotCancel => write!(f, "Annulation impossible") }
    }
}
