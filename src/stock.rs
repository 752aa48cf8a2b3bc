//! Stock validation and reservation.
//!
//! Single source of truth for "can this quantity be sold right now" and for
//! mutating stock under that decision. Read-only checks report failures as
//! data; mutating operations return typed errors. The decrement is a single
//! conditional UPDATE, so stock never goes negative under concurrent orders.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::StockError;
use crate::store::{ProductRecord, ProductStore};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

/// One requested line of a cart or order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Why a single line cannot be sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockIssue {
    NotFound,
    Inactive,
    InsufficientStock { requested: i32, available: i32 },
}

impl StockIssue {
    /// Storefront-facing French message, embedding the product name when known.
    pub fn message(&self, product_name: Option<&str>) -> String {
        let name = product_name.unwrap_or("produit");
        match self {
            StockIssue::NotFound => "Produit introuvable".to_string(),
            StockIssue::Inactive => format!("Le produit « {name} » n'est plus disponible"),
            StockIssue::InsufficientStock { requested, available } => format!(
                "Stock insuffisant pour « {name} »: demandé {requested}, disponible {available}"
            ),
        }
    }
}

/// Outcome of a single read-only availability check.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StockIssue>,
}

impl ValidationOutcome {
    fn valid(product: ProductRecord) -> Self {
        let available = product.stock_quantity;
        Self { is_valid: true, product: Some(product), available_stock: Some(available), error: None }
    }

    fn invalid(product: Option<ProductRecord>, issue: StockIssue) -> Self {
        let available = product.as_ref().map(|p| p.stock_quantity);
        Self { is_valid: false, product, available_stock: available, error: Some(issue) }
    }

    pub fn message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|issue| issue.message(self.product.as_ref().map(|p| p.name.as_str())))
    }
}

/// One failing line of a whole-cart validation.
#[derive(Debug, Clone, Serialize)]
pub struct LineFailure {
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub requested_quantity: i32,
    pub available_stock: Option<i32>,
    #[serde(flatten)]
    pub issue: StockIssue,
    pub message: String,
}

/// Aggregate of per-line failures for a cart/order at submission time.
#[derive(Debug, Clone, Serialize)]
pub struct StockValidationReport {
    pub is_valid: bool,
    pub errors: Vec<LineFailure>,
}

pub struct StockService<S> {
    store: S,
}

impl<S: ProductStore> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read-only availability check; no side effects. Failures come back as
    /// data, `Err` is reserved for store failures.
    pub async fn validate_availability(
        &self,
        product_id: Uuid,
        requested: i32,
    ) -> Result<ValidationOutcome, StockError> {
        debug_assert!(requested >= 1);
        let Some(product) = self.store.fetch(product_id).await? else {
            return Ok(ValidationOutcome::invalid(None, StockIssue::NotFound));
        };
        if !product.is_active {
            return Ok(ValidationOutcome::invalid(Some(product), StockIssue::Inactive));
        }
        if product.stock_quantity < requested {
            let available = product.stock_quantity;
            return Ok(ValidationOutcome::invalid(
                Some(product),
                StockIssue::InsufficientStock { requested, available },
            ));
        }
        Ok(ValidationOutcome::valid(product))
    }

    /// Check every line sequentially, collecting all failures in input order so
    /// the client can fix everything in one round trip.
    pub async fn validate_many(
        &self,
        items: &[LineRequest],
    ) -> Result<StockValidationReport, StockError> {
        let mut errors = Vec::new();
        for item in items {
            let outcome = self.validate_availability(item.product_id, item.quantity).await?;
            if let Some(issue) = outcome.error {
                let product_name = outcome.product.as_ref().map(|p| p.name.clone());
                let message = issue.message(product_name.as_deref());
                errors.push(LineFailure {
                    product_id: item.product_id,
                    product_name,
                    requested_quantity: item.quantity,
                    available_stock: outcome.available_stock,
                    issue,
                    message,
                });
            }
        }
        Ok(StockValidationReport { is_valid: errors.is_empty(), errors })
    }

    /// Reserve `quantity` units: a single conditional decrement, never a
    /// check-then-act. A failed decrement is diagnosed into the precise error.
    pub async fn reserve(&self, product_id: Uuid, quantity: i32) -> Result<(), StockError> {
        // One retry absorbs the race where stock was released between the
        // failed decrement and its diagnosis.
        for _ in 0..2 {
            if self.store.try_decrement(product_id, quantity).await? {
                tracing::debug!(%product_id, quantity, "stock reserved");
                return Ok(());
            }
            let outcome = self.validate_availability(product_id, quantity).await?;
            match outcome.error {
                Some(StockIssue::NotFound) => return Err(StockError::NotFound { product_id }),
                Some(StockIssue::Inactive) => return Err(StockError::Inactive { product_id }),
                Some(StockIssue::InsufficientStock { requested, available }) => {
                    return Err(StockError::InsufficientStock { product_id, requested, available })
                }
                None => continue,
            }
        }
        Err(StockError::InsufficientStock { product_id, requested: quantity, available: 0 })
    }

    /// Undo a reservation. Always permitted, no availability check.
    pub async fn release(&self, product_id: Uuid, quantity: i32) -> Result<(), StockError> {
        self.store.increment(product_id, quantity).await?;
        tracing::debug!(%product_id, quantity, "stock released");
        Ok(())
    }

    /// Whether the product's stock is at or below `threshold`. An unknown
    /// product reads as not-low; store failures still propagate.
    pub async fn is_low_stock(&self, product_id: Uuid, threshold: i32) -> Result<bool, StockError> {
        match self.store.fetch(product_id).await? {
            Some(product) => Ok(product.stock_quantity <= threshold),
            None => {
                tracing::warn!(%product_id, "low-stock check for unknown product");
                Ok(false)
            }
        }
    }

    /// Active products with no stock left.
    pub async fn out_of_stock(&self) -> Result<Vec<ProductRecord>, StockError> {
        Ok(self.store.active_at_or_below(0).await?)
    }

    /// Active products at or below `threshold`, ascending by stock.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<ProductRecord>, StockError> {
        Ok(self.store.active_at_or_below(threshold).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{product, InMemoryProductStore};

    fn service(store: InMemoryProductStore) -> StockService<InMemoryProductStore> {
        StockService::new(store)
    }

    #[tokio::test]
    async fn test_validate_within_stock() {
        let id = Uuid::new_v4();
        let svc = service(InMemoryProductStore::new().with_product(product(id, "Convecteur", 5, true)));
        let outcome = svc.validate_availability(id, 5).await.unwrap();
        assert!(outcome.is_valid);
        assert_eq!(outcome.available_stock, Some(5));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_validate_over_stock() {
        let id = Uuid::new_v4();
        let svc = service(InMemoryProductStore::new().with_product(product(id, "Convecteur", 5, true)));
        let outcome = svc.validate_availability(id, 6).await.unwrap();
        assert!(!outcome.is_valid);
        assert_eq!(outcome.available_stock, Some(5));
        assert_eq!(outcome.error, Some(StockIssue::InsufficientStock { requested: 6, available: 5 }));
    }

    #[tokio::test]
    async fn test_validate_inactive_always_invalid() {
        let id = Uuid::new_v4();
        let svc = service(InMemoryProductStore::new().with_product(product(id, "Poêle", 100, false)));
        for requested in [1, 50, 100] {
            let outcome = svc.validate_availability(id, requested).await.unwrap();
            assert!(!outcome.is_valid);
            assert_eq!(outcome.error, Some(StockIssue::Inactive));
        }
    }

    #[tokio::test]
    async fn test_validate_unknown_product() {
        let svc = service(InMemoryProductStore::new());
        let outcome = svc.validate_availability(Uuid::new_v4(), 1).await.unwrap();
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error, Some(StockIssue::NotFound));
        assert!(outcome.available_stock.is_none());
    }

    #[tokio::test]
    async fn test_validate_many_collects_in_input_order() {
        let ok = Uuid::new_v4();
        let short = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let svc = service(
            InMemoryProductStore::new()
                .with_product(product(ok, "Radiateur", 10, true))
                .with_product(product(short, "Chaudière", 1, true)),
        );
        let items = vec![
            LineRequest { product_id: short, quantity: 3 },
            LineRequest { product_id: ok, quantity: 2 },
            LineRequest { product_id: missing, quantity: 1 },
        ];
        let report = svc.validate_many(&items).await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].product_id, short);
        assert_eq!(report.errors[0].available_stock, Some(1));
        assert_eq!(report.errors[0].product_name.as_deref(), Some("Chaudière"));
        assert_eq!(report.errors[1].product_id, missing);
        assert_eq!(report.errors[1].issue, StockIssue::NotFound);
    }

    #[tokio::test]
    async fn test_validate_many_all_valid() {
        let id = Uuid::new_v4();
        let svc = service(InMemoryProductStore::new().with_product(product(id, "Radiateur", 10, true)));
        let report = svc
            .validate_many(&[LineRequest { product_id: id, quantity: 10 }])
            .await
            .unwrap();
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_reserve_decrements_exactly() {
        let id = Uuid::new_v4();
        let store = InMemoryProductStore::new().with_product(product(id, "Radiateur", 8, true));
        let svc = service(store.clone());
        svc.reserve(id, 3).await.unwrap();
        assert_eq!(store.stock_of(id), Some(5));
    }

    #[tokio::test]
    async fn test_reserve_over_stock_fails_without_partial_decrement() {
        let id = Uuid::new_v4();
        let store = InMemoryProductStore::new().with_product(product(id, "Radiateur", 2, true));
        let svc = service(store.clone());
        let err = svc.reserve(id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            StockError::InsufficientStock { requested: 3, available: 2, .. }
        ));
        assert_eq!(store.stock_of(id), Some(2));
    }

    #[tokio::test]
    async fn test_reserve_inactive_and_unknown() {
        let id = Uuid::new_v4();
        let store = InMemoryProductStore::new().with_product(product(id, "Poêle", 10, false));
        let svc = service(store.clone());
        assert!(matches!(svc.reserve(id, 1).await.unwrap_err(), StockError::Inactive { .. }));
        assert!(matches!(
            svc.reserve(Uuid::new_v4(), 1).await.unwrap_err(),
            StockError::NotFound { .. }
        ));
        assert_eq!(store.stock_of(id), Some(10));
    }

    #[tokio::test]
    async fn test_release_always_increments() {
        let id = Uuid::new_v4();
        let store = InMemoryProductStore::new().with_product(product(id, "Radiateur", 0, false));
        let svc = service(store.clone());
        svc.release(id, 4).await.unwrap();
        assert_eq!(store.stock_of(id), Some(4));
    }

    #[tokio::test]
    async fn test_reserve_release_round_trip() {
        let id = Uuid::new_v4();
        let store = InMemoryProductStore::new().with_product(product(id, "Radiateur", 7, true));
        let svc = service(store.clone());
        svc.reserve(id, 6).await.unwrap();
        svc.release(id, 6).await.unwrap();
        assert_eq!(store.stock_of(id), Some(7));
    }

    #[tokio::test]
    async fn test_is_low_stock() {
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();
        let svc = service(
            InMemoryProductStore::new()
                .with_product(product(low, "Radiateur", 10, true))
                .with_product(product(high, "Convecteur", 11, true)),
        );
        assert!(svc.is_low_stock(low, DEFAULT_LOW_STOCK_THRESHOLD).await.unwrap());
        assert!(!svc.is_low_stock(high, DEFAULT_LOW_STOCK_THRESHOLD).await.unwrap());
        // Unknown products read as not-low.
        assert!(!svc.is_low_stock(Uuid::new_v4(), DEFAULT_LOW_STOCK_THRESHOLD).await.unwrap());
    }

    #[tokio::test]
    async fn test_low_stock_report_sorted_ascending_active_only() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let svc = service(
            InMemoryProductStore::new()
                .with_product(product(a, "Radiateur", 7, true))
                .with_product(product(b, "Convecteur", 2, true))
                .with_product(product(c, "Poêle", 1, false)),
        );
        let report = svc.low_stock(10).await.unwrap();
        let stocks: Vec<i32> = report.iter().map(|p| p.stock_quantity).collect();
        assert_eq!(stocks, vec![2, 7]);
    }

    #[tokio::test]
    async fn test_out_of_stock_report() {
        let empty = Uuid::new_v4();
        let stocked = Uuid::new_v4();
        let svc = service(
            InMemoryProductStore::new()
                .with_product(product(empty, "Chaudière", 0, true))
                .with_product(product(stocked, "Radiateur", 3, true)),
        );
        let report = svc.out_of_stock().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].id, empty);
    }

    #[test]
    fn test_issue_messages_are_french_and_specific() {
        let issue = StockIssue::InsufficientStock { requested: 5, available: 2 };
        let msg = issue.message(Some("Convecteur 2000W"));
        assert!(msg.contains("Convecteur 2000W"));
        assert!(msg.contains('5') && msg.contains('2'));
        assert!(msg.starts_with("Stock insuffisant"));
    }
}
