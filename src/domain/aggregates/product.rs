//! Product aggregate.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::value_objects::{Sku, Money, Quantity};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug)]
pub struct Product {
    id: String,
    sku: Sku,
    /// French display name; `name_ar` carries the Arabic translation when set.
    name: String,
    name_ar: Option<String>,
    description: String,
    price: Money,
    sale_price: Option<Money>,
    stock: Quantity,
    status: ProductStatus,
    category_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)] pub enum ProductStatus { #[default] Draft, Active, Archived }

impl Product {
    pub fn create(sku: Sku, name: impl Into<String>, price: Money) -> Self {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut product = Self {
            id: id.clone(), sku: sku.clone(), name: name.into(), name_ar: None,
            description: String::new(), price, sale_price: None, stock: Quantity::default(),
            status: ProductStatus::Draft, category_id: None,
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, sku }));
        product
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn name_ar(&self) -> Option<&str> { self.name_ar.as_deref() }
    pub fn price(&self) -> &Money { &self.price }
    pub fn sale_price(&self) -> Option<&Money> { self.sale_price.as_ref() }
    pub fn stock(&self) -> &Quantity { &self.stock }
    pub fn status(&self) -> &ProductStatus { &self.status }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }
    pub fn is_low_stock(&self, threshold: u32) -> bool { self.stock.value() <= threshold }

    /// Effective unit price: sale price when a promotion is set.
    pub fn effective_price(&self) -> &Money {
        self.sale_price.as_ref().unwrap_or(&self.price)
    }

    pub fn translate(&mut self, name_ar: impl Into<String>) {
        self.name_ar = Some(name_ar.into());
        self.touch();
    }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.is_empty() { return Err(ProductError::MissingName); }
        self.status = ProductStatus::Active;
        self.touch();
        Ok(())
    }

    pub fn archive(&mut self) { self.status = ProductStatus::Archived; self.touch(); }

    pub fn update_price(&mut self, new_price: Money) {
        self.price = new_price;
        self.touch();
    }

    pub fn set_sale_price(&mut self, sale_price: Option<Money>) {
        self.sale_price = sale_price;
        self.touch();
    }

    pub fn restock(&mut self, qty: u32) {
        self.stock = self.stock.add(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReleased { product_id: self.id.clone(), quantity: qty }));
    }

    pub fn reserve(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReserved { product_id: self.id.clone(), quantity: qty }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone)] pub enum ProductError { MissingName, InsufficientStock }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::MissingName => write!(f, "Nom manquant"), Self::InsufficientStock => write!(f, "Stock insuffisant") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_product_create() {
        let p = Product::create(Sku::new("CONV-2000").unwrap(), "Convecteur 2000W", Money::dzd(Decimal::new(18900, 0)));
        assert_eq!(p.name(), "Convecteur 2000W");
        assert!(!p.is_active());
    }

    #[test]
    fn test_reserve_and_restock() {
        let mut p = Product::create(Sku::new("RAD-001").unwrap(), "Radiateur", Money::dzd(Decimal::new(100, 0)));
        p.restock(10);
        assert!(p.is_in_stock());
        p.reserve(5).unwrap();
        assert_eq!(p.stock().value(), 5);
        assert!(p.reserve(6).is_err());
        assert_eq!(p.stock().value(), 5);
    }

    #[test]
    fn test_effective_price_prefers_sale() {
        let mut p = Product::create(Sku::new("POELE-01").unwrap(), "Poêle à bois", Money::dzd(Decimal::new(45000, 0)));
        assert_eq!(p.effective_price().amount(), Decimal::new(45000, 0));
        p.set_sale_price(Some(Money::dzd(Decimal::new(39900, 0))));
        assert_eq!(p.effective_price().amount(), Decimal::new(39900, 0));
    }

    #[test]
    fn test_low_stock() {
        let mut p = Product::create(Sku::new("CHAUD-10").unwrap(), "Chaudière", Money::dzd(Decimal::new(100, 0)));
        p.restock(10);
        assert!(p.is_low_stock(10));
        p.restock(1);
        assert!(!p.is_low_stock(10));
    }
}
