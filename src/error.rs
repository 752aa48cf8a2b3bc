//! Error types for the service.
//!
//! Stock failures carry a typed kind so callers branch structurally instead of
//! matching on message text. User-facing messages are French; log lines are not.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the stock validation/reservation flow.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("Produit introuvable")]
    NotFound { product_id: Uuid },

    #[error("Produit non disponible à la vente")]
    Inactive { product_id: Uuid },

    #[error("Stock insuffisant: demandé {requested}, disponible {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Erreur d'accès aux données")]
    Store(#[from] sqlx::Error),
}

/// Application-level errors used by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Stock(#[from] StockError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Non autorisé")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Erreur de base de données")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Stock(StockError::NotFound { .. }) => (StatusCode::NOT_FOUND, Some("not_found")),
            ApiError::Stock(StockError::Inactive { .. }) => (StatusCode::BAD_REQUEST, Some("inactive")),
            ApiError::Stock(StockError::InsufficientStock { .. }) => {
                (StatusCode::BAD_REQUEST, Some("insufficient_stock"))
            }
            ApiError::Stock(StockError::Store(e)) => {
                tracing::error!("store error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ApiError::Database(e) => {
                tracing::error!("database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = Json(ErrorBody {
            error: self.to_string(),
            kind,
        });
        (status, body).into_response()
    }
}
