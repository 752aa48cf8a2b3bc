//! Client-mirror cart aggregate.
//!
//! Mirrors the browser-side cart state: quantities are clamped against the
//! stock ceiling known at last sync, and the line count is bounded with FIFO
//! eviction. Advisory only — checkout always revalidates against live stock.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// Distinct-line ceiling; the oldest line is evicted when a new one would exceed it.
pub const MAX_LINES: usize = 4;

pub const STOCK_ERROR_MSG: &str = "Stock insuffisant pour ce produit";

#[derive(Clone, Debug)]
pub struct Cart {
    id: String,
    session_id: Option<String>,
    lines: Vec<CartLine>,
    last_error: Option<String>,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Advisory stock ceiling mirrored from the product at last sync.
    pub max_stock: u32,
    pub unit_price: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(), session_id: None,
            lines: vec![], last_error: None, currency: currency.to_string(),
            created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    pub fn for_session(session_id: impl Into<String>, currency: &str) -> Self {
        let mut cart = Self::new(currency);
        cart.session_id = Some(session_id.into());
        cart
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }
    pub fn take_error(&mut self) -> Option<String> { self.last_error.take() }

    /// Merge into an existing line (clamped to its ceiling) or insert a new one,
    /// evicting the oldest line when the cart is full.
    pub fn add_item(&mut self, line: CartLine) {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.product_id == line.product_id) {
            existing.max_stock = line.max_stock;
            let wanted = existing.quantity.saturating_add(line.quantity);
            existing.quantity = wanted.min(existing.max_stock);
            if wanted > existing.max_stock {
                self.last_error = Some(STOCK_ERROR_MSG.to_string());
            }
        } else {
            if self.lines.len() >= MAX_LINES {
                self.lines.remove(0);
            }
            let mut line = line;
            if line.quantity > line.max_stock {
                line.quantity = line.max_stock;
                self.last_error = Some(STOCK_ERROR_MSG.to_string());
            }
            self.lines.push(line);
        }
        self.touch();
    }

    /// Clamp the requested quantity to `[0, max_stock]`; zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: u32) -> Result<(), CartError> {
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id).ok_or(CartError::LineNotFound)?;
        if quantity == 0 {
            self.lines.retain(|l| l.product_id != product_id);
        } else {
            if quantity > line.max_stock {
                line.quantity = line.max_stock;
                self.last_error = Some(STOCK_ERROR_MSG.to_string());
            } else {
                line.quantity = quantity;
            }
        }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before { return Err(CartError::LineNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); self.last_error = None; self.touch(); }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, l| acc.add(&l.line_total()).unwrap_or(acc))
    }

    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone)] pub enum CartError { LineNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Ligne introuvable") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(product_id: &str, quantity: u32, max_stock: u32, price: i64) -> CartLine {
        CartLine {
            product_id: product_id.into(), name: format!("Produit {product_id}"),
            quantity, max_stock, unit_price: Money::dzd(Decimal::new(price, 0)),
        }
    }

    #[test]
    fn test_add_merges_and_clamps_to_ceiling() {
        let mut cart = Cart::new("DZD");
        cart.add_item(line("p1", 1, 3, 100));
        cart.add_item(line("p1", 5, 3, 100));
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.last_error(), Some(STOCK_ERROR_MSG));
    }

    #[test]
    fn test_update_quantity_clamps() {
        let mut cart = Cart::new("DZD");
        cart.add_item(line("p1", 1, 4, 100));
        cart.update_quantity("p1", 10).unwrap();
        assert_eq!(cart.lines()[0].quantity, 4);
        assert_eq!(cart.last_error(), Some(STOCK_ERROR_MSG));
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new("DZD");
        cart.add_item(line("p1", 2, 5, 100));
        cart.update_quantity("p1", 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_subtotal_and_total_items() {
        let mut cart = Cart::new("DZD");
        cart.add_item(line("p1", 2, 10, 1200));
        cart.add_item(line("p2", 1, 10, 300));
        assert_eq!(cart.subtotal().amount(), Decimal::new(2700, 0));
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut cart = Cart::new("DZD");
        for i in 0..MAX_LINES {
            cart.add_item(line(&format!("p{i}"), 1, 10, 100));
        }
        cart.add_item(line("fresh", 1, 10, 100));
        assert_eq!(cart.line_count(), MAX_LINES);
        assert!(cart.lines().iter().all(|l| l.product_id != "p0"));
        assert_eq!(cart.lines().last().unwrap().product_id, "fresh");
    }

    #[test]
    fn test_clamp_on_insert() {
        let mut cart = Cart::new("DZD");
        cart.add_item(line("p1", 9, 4, 100));
        assert_eq!(cart.lines()[0].quantity, 4);
        assert_eq!(cart.take_error().as_deref(), Some(STOCK_ERROR_MSG));
        assert_eq!(cart.last_error(), None);
    }
}
