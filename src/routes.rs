//! HTTP surface: storefront catalog/cart/checkout plus the admin back-office.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::domain::events::{DomainEvent, OrderEvent, ProductEvent};
use crate::domain::value_objects::Money;
use crate::error::{ApiError, StockError};
use crate::orders::{cancel_and_release, CancelError, CancellationOutcome};
use crate::stock::{LineRequest, StockIssue, StockService};
use crate::store::{PgOrderStore, PgProductStore};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub stock: Arc<StockService<PgProductStore>>,
    pub nats: Option<async_nats::Client>,
    pub config: Config,
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(deactivate_product))
        .route("/products/:id/restock", post(restock_product))
        .route("/categories", post(create_category))
        .route("/orders", get(list_orders))
        .route("/stock/low", get(low_stock_report))
        .route("/stock/out", get(out_of_stock_report))
        .route("/stats", get(stats))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/categories", get(list_categories))
        .route("/api/v1/categories/:id", get(get_category))
        .route("/api/v1/cart/validate", post(validate_cart))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items", post(add_to_cart))
        .route(
            "/api/v1/cart/:session/items/:product_id",
            put(update_cart_item).delete(remove_cart_item),
        )
        .route("/api/v1/checkout", post(checkout))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/cancel", post(cancel_order))
        .nest("/api/v1/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bearer-token guard for the back-office. Open when no token is configured
/// (local development).
async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.config.admin_token {
        let presented = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "chaleur-commerce"}))
}

fn publish_event(state: &AppState, event: DomainEvent) {
    let Some(nats) = state.nats.clone() else { return };
    let subject = event.subject();
    let payload = match serde_json::to_vec(&event) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("event serialization failed: {e}");
            return;
        }
    };
    tokio::spawn(async move {
        if let Err(e) = nats.publish(subject, payload.into()).await {
            tracing::warn!(subject, "event publish failed: {e}");
        }
    });
}

/// Translate a stock issue from a cart mutation into the HTTP contract:
/// unknown product is 404, everything else 400 with the French message.
fn cart_mutation_error(issue: StockIssue, product_name: Option<&str>) -> ApiError {
    match issue {
        StockIssue::NotFound => ApiError::NotFound(issue.message(product_name)),
        _ => ApiError::BadRequest(issue.message(product_name)),
    }
}

fn reserve_error(err: StockError, product_name: Option<&str>) -> ApiError {
    match err {
        StockError::NotFound { .. } => cart_mutation_error(StockIssue::NotFound, product_name),
        StockError::Inactive { .. } => cart_mutation_error(StockIssue::Inactive, product_name),
        StockError::InsufficientStock { requested, available, .. } => {
            cart_mutation_error(StockIssue::InsufficientStock { requested, available }, product_name)
        }
        StockError::Store(e) => ApiError::Database(e),
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid, pub sku: String, pub name: String, pub name_ar: Option<String>,
    pub description: Option<String>, pub price: i64, pub sale_price: Option<i64>,
    pub currency: String, pub category_id: Option<Uuid>, pub stock_quantity: i32,
    pub is_active: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: Uuid, pub name: String, pub name_ar: Option<String>, pub slug: String,
    pub description: Option<String>, pub parent_id: Option<Uuid>, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub category: Option<Uuid>, pub search: Option<String> }

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

async fn list_products(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<ProductRow>>, ApiError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let products = sqlx::query_as::<_, ProductRow>(
        "SELECT * FROM products WHERE is_active \
         AND ($3::uuid IS NULL OR category_id = $3) \
         AND ($4::text IS NULL OR name ILIKE '%' || $4 || '%' OR name_ar ILIKE '%' || $4 || '%') \
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .bind(p.category)
    .bind(p.search.as_deref())
    .fetch_all(&s.db)
    .await?;
    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE is_active \
         AND ($1::uuid IS NULL OR category_id = $1) \
         AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR name_ar ILIKE '%' || $2 || '%')",
    )
    .bind(p.category)
    .bind(p.search.as_deref())
    .fetch_one(&s.db)
    .await?;
    Ok(Json(PaginatedResponse { data: products, total: total.0, page }))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductRow>, ApiError> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Produit introuvable".to_string()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i64,
    pub sale_price: Option<i64>,
    pub category_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub stock_quantity: Option<i32>,
}

async fn create_product(
    State(s): State<AppState>,
    Json(r): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductRow>), ApiError> {
    r.validate()?;
    let sku = format!("CHF-{:08}", rand::random::<u32>());
    let product = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products (id, sku, name, name_ar, description, price, sale_price, currency, category_id, stock_quantity, is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'DZD', $8, $9, TRUE, NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&sku)
    .bind(&r.name)
    .bind(&r.name_ar)
    .bind(&r.description)
    .bind(r.price)
    .bind(r.sale_price)
    .bind(r.category_id)
    .bind(r.stock_quantity.unwrap_or(0))
    .fetch_one(&s.db)
    .await?;
    publish_event(&s, DomainEvent::Product(ProductEvent::Created {
        product_id: product.id.to_string(),
        sku: crate::domain::value_objects::Sku::new(&sku)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    }));
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<CreateProductRequest>,
) -> Result<Json<ProductRow>, ApiError> {
    r.validate()?;
    // Stock is deliberately not updatable here; it moves only through the
    // reservation path and the restock endpoint.
    let product = sqlx::query_as::<_, ProductRow>(
        "UPDATE products SET name = $2, name_ar = $3, description = $4, price = $5, sale_price = $6, category_id = $7, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&r.name)
    .bind(&r.name_ar)
    .bind(&r.description)
    .bind(r.price)
    .bind(r.sale_price)
    .bind(r.category_id)
    .fetch_optional(&s.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Produit introuvable".to_string()))?;
    Ok(Json(product))
}

async fn deactivate_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RestockRequest {
    #[validate(range(min = 1))]
    pub quantity: i32,
}

async fn restock_product(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<RestockRequest>,
) -> Result<Json<ProductRow>, ApiError> {
    r.validate()?;
    sqlx::query("SELECT 1 FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Produit introuvable".to_string()))?;
    s.stock.release(id, r.quantity).await?;
    publish_event(&s, DomainEvent::Product(ProductEvent::StockReleased {
        product_id: id.to_string(),
        quantity: r.quantity as u32,
    }));
    get_product(State(s), Path(id)).await
}

async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<CategoryRow>>, ApiError> {
    let cats = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name")
        .fetch_all(&s.db)
        .await?;
    Ok(Json(cats))
}

async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CategoryRow>, ApiError> {
    sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Catégorie introuvable".to_string()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

async fn create_category(
    State(s): State<AppState>,
    Json(r): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryRow>), ApiError> {
    r.validate()?;
    let slug = r.name.to_lowercase().replace(' ', "-");
    let cat = sqlx::query_as::<_, CategoryRow>(
        "INSERT INTO categories (id, name, name_ar, slug, description, parent_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&r.name)
    .bind(&r.name_ar)
    .bind(&slug)
    .bind(&r.description)
    .bind(r.parent_id)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(cat)))
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLineRow {
    pub id: Uuid, pub session_id: String, pub product_id: Uuid, pub name: String,
    pub quantity: i32, pub unit_price: i64, pub max_stock: i32, pub created_at: DateTime<Utc>,
}

async fn fetch_cart(s: &AppState, session: &str) -> Result<Vec<CartLineRow>, ApiError> {
    let lines = sqlx::query_as::<_, CartLineRow>(
        "SELECT ci.id, ci.session_id, ci.product_id, p.name, ci.quantity, ci.unit_price, ci.max_stock, ci.created_at \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.session_id = $1 ORDER BY ci.created_at",
    )
    .bind(session)
    .fetch_all(&s.db)
    .await?;
    Ok(lines)
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<Vec<CartLineRow>>, ApiError> {
    Ok(Json(fetch_cart(&s, &session).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

async fn add_to_cart(
    State(s): State<AppState>,
    Path(session): Path<String>,
    Json(r): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLineRow>), ApiError> {
    r.validate()?;
    let existing: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE session_id = $1 AND product_id = $2")
            .bind(&session)
            .bind(r.product_id)
            .fetch_optional(&s.db)
            .await?;
    let desired = existing.map_or(r.quantity, |(q,)| q + r.quantity);

    let outcome = s.stock.validate_availability(r.product_id, desired).await?;
    let product_name = outcome.product.as_ref().map(|p| p.name.clone());
    if let Some(issue) = outcome.error {
        return Err(cart_mutation_error(issue, product_name.as_deref()));
    }
    let product = outcome.product.ok_or_else(|| ApiError::Internal("validation sans produit".into()))?;
    let unit_price = product.sale_price.unwrap_or(product.price);

    // The merge itself stays atomic (no lost increment under concurrent
    // adds), clamped to the live stock ceiling just validated.
    let row: (Uuid, i32, DateTime<Utc>) = sqlx::query_as(
        "INSERT INTO cart_items (id, session_id, product_id, quantity, unit_price, max_stock, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
         ON CONFLICT (session_id, product_id) \
         DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, EXCLUDED.max_stock), \
                       unit_price = EXCLUDED.unit_price, max_stock = EXCLUDED.max_stock \
         RETURNING id, quantity, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(&session)
    .bind(r.product_id)
    .bind(r.quantity)
    .bind(unit_price)
    .bind(product.stock_quantity)
    .fetch_one(&s.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CartLineRow {
            id: row.0,
            session_id: session,
            product_id: r.product_id,
            name: product.name,
            quantity: row.1,
            unit_price,
            max_stock: product.stock_quantity,
            created_at: row.2,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
}

async fn update_cart_item(
    State(s): State<AppState>,
    Path((session, product_id)): Path<(String, Uuid)>,
    Json(r): Json<UpdateCartItemRequest>,
) -> Result<StatusCode, ApiError> {
    r.validate()?;
    if r.quantity == 0 {
        return remove_cart_item(State(s), Path((session, product_id))).await;
    }
    let outcome = s.stock.validate_availability(product_id, r.quantity).await?;
    let product_name = outcome.product.as_ref().map(|p| p.name.clone());
    if let Some(issue) = outcome.error {
        return Err(cart_mutation_error(issue, product_name.as_deref()));
    }
    let product = outcome.product.ok_or_else(|| ApiError::Internal("validation sans produit".into()))?;
    let updated = sqlx::query(
        "UPDATE cart_items SET quantity = $3, max_stock = $4 WHERE session_id = $1 AND product_id = $2",
    )
    .bind(&session)
    .bind(product_id)
    .bind(r.quantity)
    .bind(product.stock_quantity)
    .execute(&s.db)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::NotFound("Ligne introuvable".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_cart_item(
    State(s): State<AppState>,
    Path((session, product_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let deleted = sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2")
        .bind(&session)
        .bind(product_id)
        .execute(&s.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound("Ligne introuvable".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode, ApiError> {
    sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
        .bind(&session)
        .execute(&s.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ValidateCartRequest {
    pub items: Vec<LineRequest>,
}

async fn validate_cart(
    State(s): State<AppState>,
    Json(r): Json<ValidateCartRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    for item in &r.items {
        item.validate().map_err(ApiError::from)?;
    }
    let report = s.stock.validate_many(&r.items).await?;
    Ok(Json(serde_json::json!({"success": true, "data": report})))
}

// ---------------------------------------------------------------------------
// Checkout & orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid, pub order_number: String, pub session_id: String,
    pub customer_name: String, pub customer_phone: String, pub customer_email: Option<String>,
    pub status: String, pub payment_method: String,
    pub subtotal: i64, pub shipping: i64, pub total: i64, pub currency: String,
    pub shipping_address: serde_json::Value,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: Uuid, pub order_id: Uuid, pub product_id: Uuid, pub sku: String,
    pub name: String, pub quantity: i32, pub unit_price: i64, pub total: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(length(min = 8, max = 20))]
    pub customer_phone: String,
    #[validate(email)]
    pub customer_email: Option<String>,
    pub shipping_address: serde_json::Value,
    #[validate(range(min = 0))]
    pub shipping: Option<i64>,
}

async fn checkout(
    State(s): State<AppState>,
    Json(r): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    r.validate()?;
    let lines = fetch_cart(&s, &r.session_id).await?;
    if lines.is_empty() {
        return Err(ApiError::BadRequest("Panier vide".to_string()));
    }

    // Whole-cart revalidation against live stock; any failing line rejects the
    // entire order, with every problem reported at once.
    let items: Vec<LineRequest> = lines
        .iter()
        .map(|l| LineRequest { product_id: l.product_id, quantity: l.quantity })
        .collect();
    let report = s.stock.validate_many(&items).await?;
    if !report.is_valid {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"success": false, "data": report})),
        ));
    }

    // Reserve line by line; on failure, compensate the lines already taken.
    let mut reserved: Vec<(Uuid, i32)> = Vec::new();
    for line in &lines {
        match s.stock.reserve(line.product_id, line.quantity).await {
            Ok(()) => reserved.push((line.product_id, line.quantity)),
            Err(err) => {
                release_all(&s, &reserved).await;
                return Err(reserve_error(err, Some(&line.name)));
            }
        }
    }

    match place_order(&s, &r, &lines).await {
        Ok(order) => {
            publish_event(&s, DomainEvent::Order(OrderEvent::Confirmed {
                order_id: order.id.to_string(),
                total: Money::from_centimes(order.total, &order.currency).amount(),
            }));
            tracing::info!(order_number = %order.order_number, total = order.total, "order placed");
            Ok((StatusCode::CREATED, Json(serde_json::json!({"success": true, "data": order}))))
        }
        Err(err) => {
            release_all(&s, &reserved).await;
            Err(err)
        }
    }
}

async fn release_all(s: &AppState, reserved: &[(Uuid, i32)]) {
    for (product_id, quantity) in reserved {
        if let Err(e) = s.stock.release(*product_id, *quantity).await {
            tracing::error!(%product_id, quantity, "compensating release failed: {e}");
        }
    }
}

async fn place_order(s: &AppState, r: &CheckoutRequest, lines: &[CartLineRow]) -> Result<OrderRow, ApiError> {
    let subtotal: i64 = lines.iter().map(|l| l.unit_price * l.quantity as i64).sum();
    let shipping = r.shipping.unwrap_or(0);
    let order_number = format!("CMD-{:08}", rand::random::<u32>());

    let mut tx = s.db.begin().await?;
    let order = sqlx::query_as::<_, OrderRow>(
        "INSERT INTO orders (id, order_number, session_id, customer_name, customer_phone, customer_email, status, payment_method, subtotal, shipping, total, currency, shipping_address, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'confirmed', 'cash_on_delivery', $7, $8, $9, 'DZD', $10, NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&order_number)
    .bind(&r.session_id)
    .bind(&r.customer_name)
    .bind(&r.customer_phone)
    .bind(&r.customer_email)
    .bind(subtotal)
    .bind(shipping)
    .bind(subtotal + shipping)
    .bind(&r.shipping_address)
    .fetch_one(&mut *tx)
    .await?;

    for line in lines {
        let sku: (String,) = sqlx::query_as("SELECT sku FROM products WHERE id = $1")
            .bind(line.product_id)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, sku, name, quantity, unit_price, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(line.product_id)
        .bind(&sku.0)
        .bind(&line.name)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.unit_price * line.quantity as i64)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
        .bind(&r.session_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(order)
}

async fn list_orders(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<OrderRow>>, ApiError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let orders = sqlx::query_as::<_, OrderRow>(
        "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(&s.db)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse { data: orders, total: total.0, page }))
}

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Commande introuvable".to_string()))?;
    let items = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1")
        .bind(id)
        .fetch_all(&s.db)
        .await?;
    Ok(Json(serde_json::json!({"order": order, "items": items})))
}

async fn cancel_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderRow>, ApiError> {
    let orders = PgOrderStore::new(s.db.clone());
    let outcome = cancel_and_release(&orders, &s.stock, id).await.map_err(|e| match e {
        CancelError::NotFound => ApiError::NotFound(e.to_string()),
        CancelError::Delivered => ApiError::BadRequest(e.to_string()),
        CancelError::Stock(err) => ApiError::Stock(err),
    })?;

    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Commande introuvable".to_string()))?;
    if outcome == CancellationOutcome::Cancelled {
        publish_event(&s, DomainEvent::Order(OrderEvent::Cancelled { order_id: order.id.to_string() }));
        tracing::info!(order_number = %order.order_number, "order cancelled, stock released");
    }
    Ok(Json(order))
}

// ---------------------------------------------------------------------------
// Admin reports
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ThresholdParams { pub threshold: Option<i32> }

async fn low_stock_report(
    State(s): State<AppState>,
    Query(p): Query<ThresholdParams>,
) -> Result<Json<Vec<crate::store::ProductRecord>>, ApiError> {
    let threshold = p.threshold.unwrap_or(s.config.low_stock_threshold);
    Ok(Json(s.stock.low_stock(threshold).await?))
}

async fn out_of_stock_report(State(s): State<AppState>) -> Result<Json<Vec<crate::store::ProductRecord>>, ApiError> {
    Ok(Json(s.stock.out_of_stock().await?))
}

async fn stats(State(s): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let (order_count, revenue): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(total) FILTER (WHERE status <> 'cancelled'), 0)::BIGINT FROM orders",
    )
    .fetch_one(&s.db)
    .await?;
    let (product_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE is_active")
        .fetch_one(&s.db)
        .await?;
    let low_stock_count = s.stock.low_stock(s.config.low_stock_threshold).await?.len();
    Ok(Json(serde_json::json!({
        "orders": order_count,
        "revenue": revenue,
        "active_products": product_count,
        "low_stock_products": low_stock_count,
    })))
}
