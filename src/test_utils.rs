//! In-memory implementation of the product store for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::store::{OrderStore, ProductRecord, ProductStore};

/// Build a product record with the fields the stock flow cares about.
pub fn product(id: Uuid, name: &str, stock_quantity: i32, is_active: bool) -> ProductRecord {
    ProductRecord {
        id,
        sku: format!("SKU-{}", &id.simple().to_string()[..8].to_uppercase()),
        name: name.to_string(),
        name_ar: None,
        price: 10_000,
        sale_price: None,
        stock_quantity,
        is_active,
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<Uuid, ProductRecord>>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(self, record: ProductRecord) -> Self {
        self.products.write().unwrap().insert(record.id, record);
        self
    }

    pub fn stock_of(&self, id: Uuid) -> Option<i32> {
        self.products.read().unwrap().get(&id).map(|p| p.stock_quantity)
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<ProductRecord>, sqlx::Error> {
        Ok(self.products.read().unwrap().get(&id).cloned())
    }

    async fn try_decrement(&self, id: Uuid, quantity: i32) -> Result<bool, sqlx::Error> {
        let mut products = self.products.write().unwrap();
        match products.get_mut(&id) {
            Some(p) if p.is_active && p.stock_quantity >= quantity => {
                p.stock_quantity -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment(&self, id: Uuid, quantity: i32) -> Result<(), sqlx::Error> {
        if let Some(p) = self.products.write().unwrap().get_mut(&id) {
            p.stock_quantity += quantity;
        }
        Ok(())
    }

    async fn active_at_or_below(&self, threshold: i32) -> Result<Vec<ProductRecord>, sqlx::Error> {
        let products = self.products.read().unwrap();
        let mut matches: Vec<ProductRecord> = products
            .values()
            .filter(|p| p.is_active && p.stock_quantity <= threshold)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.stock_quantity
                .cmp(&b.stock_quantity)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(matches)
    }
}

struct OrderEntry {
    status: String,
    lines: Vec<(Uuid, i32)>,
}

#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, OrderEntry>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(self, id: Uuid, status: &str, lines: Vec<(Uuid, i32)>) -> Self {
        self.orders
            .write()
            .unwrap()
            .insert(id, OrderEntry { status: status.to_string(), lines });
        self
    }

    pub fn status_of(&self, id: Uuid) -> Option<String> {
        self.orders.read().unwrap().get(&id).map(|o| o.status.clone())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn try_mark_cancelled(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut orders = self.orders.write().unwrap();
        match orders.get_mut(&id) {
            Some(o) if o.status != "cancelled" && o.status != "delivered" => {
                o.status = "cancelled".to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn status(&self, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        Ok(self.status_of(id))
    }

    async fn line_quantities(&self, id: Uuid) -> Result<Vec<(Uuid, i32)>, sqlx::Error> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .get(&id)
            .map(|o| o.lines.clone())
            .unwrap_or_default())
    }
}
