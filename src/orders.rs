//! Order cancellation flow.
//!
//! Cancellation claims the order first through a conditional status flip,
//! then releases stock per line. The flip is the only gate: a repeated or
//! concurrent request finds the order already cancelled and never releases
//! stock a second time, so cancellation can never inflate stock.

use thiserror::Error;
use uuid::Uuid;

use crate::error::StockError;
use crate::stock::StockService;
use crate::store::{OrderStore, ProductStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationOutcome {
    /// This request claimed the order; its stock was released.
    Cancelled,
    /// A previous request already cancelled it; nothing was released.
    AlreadyCancelled,
}

#[derive(Debug, Error)]
pub enum CancelError {
    #[error("Commande introuvable")]
    NotFound,

    #[error("Commande déjà livrée")]
    Delivered,

    #[error(transparent)]
    Stock(#[from] StockError),
}

pub async fn cancel_and_release<O, S>(
    orders: &O,
    stock: &StockService<S>,
    order_id: Uuid,
) -> Result<CancellationOutcome, CancelError>
where
    O: OrderStore,
    S: ProductStore,
{
    if orders.try_mark_cancelled(order_id).await.map_err(StockError::from)? {
        for (product_id, quantity) in
            orders.line_quantities(order_id).await.map_err(StockError::from)?
        {
            // The order is already marked cancelled, so a failed line is
            // logged and the rest still released; stock stays withheld for
            // that line rather than risking a double release on retry.
            if let Err(e) = stock.release(product_id, quantity).await {
                tracing::error!(%order_id, %product_id, quantity, "release on cancellation failed: {e}");
            }
        }
        return Ok(CancellationOutcome::Cancelled);
    }
    match orders.status(order_id).await.map_err(StockError::from)? {
        None => Err(CancelError::NotFound),
        Some(status) if status == "delivered" => Err(CancelError::Delivered),
        Some(_) => Ok(CancellationOutcome::AlreadyCancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{product, InMemoryOrderStore, InMemoryProductStore};

    #[tokio::test]
    async fn test_cancel_releases_each_line_once() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let order_id = Uuid::new_v4();
        let products = InMemoryProductStore::new()
            .with_product(product(p1, "Radiateur", 5, true))
            .with_product(product(p2, "Convecteur", 0, true));
        let orders = InMemoryOrderStore::new()
            .with_order(order_id, "confirmed", vec![(p1, 2), (p2, 3)]);
        let stock = StockService::new(products.clone());

        let outcome = cancel_and_release(&orders, &stock, order_id).await.unwrap();
        assert_eq!(outcome, CancellationOutcome::Cancelled);
        assert_eq!(products.stock_of(p1), Some(7));
        assert_eq!(products.stock_of(p2), Some(3));
        assert_eq!(orders.status_of(order_id).as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_repeated_cancel_does_not_double_release() {
        let p1 = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        let products = InMemoryProductStore::new().with_product(product(p1, "Radiateur", 1, true));
        let orders = InMemoryOrderStore::new().with_order(order_id, "confirmed", vec![(p1, 4)]);
        let stock = StockService::new(products.clone());

        let first = cancel_and_release(&orders, &stock, order_id).await.unwrap();
        let second = cancel_and_release(&orders, &stock, order_id).await.unwrap();
        assert_eq!(first, CancellationOutcome::Cancelled);
        assert_eq!(second, CancellationOutcome::AlreadyCancelled);
        assert_eq!(products.stock_of(p1), Some(5));
    }

    #[tokio::test]
    async fn test_cancel_delivered_rejected_without_release() {
        let p1 = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        let products = InMemoryProductStore::new().with_product(product(p1, "Poêle", 2, true));
        let orders = InMemoryOrderStore::new().with_order(order_id, "delivered", vec![(p1, 1)]);
        let stock = StockService::new(products.clone());

        let err = cancel_and_release(&orders, &stock, order_id).await.unwrap_err();
        assert!(matches!(err, CancelError::Delivered));
        assert_eq!(products.stock_of(p1), Some(2));
    }

    #[tokio::test]
    async fn test_cancel_unknown_order() {
        let stock = StockService::new(InMemoryProductStore::new());
        let err = cancel_and_release(&InMemoryOrderStore::new(), &stock, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CancelError::NotFound));
    }
}
