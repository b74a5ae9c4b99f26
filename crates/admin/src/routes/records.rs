//! Generic JSON CRUD handlers for business records.
//!
//! One router per record type, mounted under `/api/<collection>`. Every
//! handler requires [`BackOffice`], so the routes only answer requests the
//! access guard admitted.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::db::RecordRepository;
use crate::error::AppError;
use crate::middleware::BackOffice;
use crate::models::{
    Customer, Expense, Income, Invoice, Payment, Policy, Record, ServiceOffering, StaffMember,
    Stored, Versioned,
};
use crate::services::RecordService;
use crate::state::AppState;

/// Build the record router for every collection.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(record_routes::<Customer>())
        .merge(record_routes::<StaffMember>())
        .merge(record_routes::<Invoice>())
        .merge(record_routes::<Payment>())
        .merge(record_routes::<Income>())
        .merge(record_routes::<Expense>())
        .merge(record_routes::<ServiceOffering>())
        .merge(record_routes::<Policy>())
}

/// Build the CRUD routes for one record type.
fn record_routes<R: Record>() -> Router<AppState> {
    let collection = format!("/api/{}", R::COLLECTION);
    let item = format!("{collection}/{{id}}");

    Router::new()
        .route(&collection, get(list::<R>).post(create::<R>))
        .route(&item, get(show::<R>).put(update::<R>).delete(remove::<R>))
}

/// GET /api/<collection>
async fn list<R: Record>(
    State(state): State<AppState>,
    BackOffice(_): BackOffice,
) -> Result<Json<Vec<Stored<R>>>, AppError> {
    let records = RecordRepository::<R>::new(state.store()).list().await?;
    Ok(Json(records))
}

/// POST /api/<collection>
///
/// Numbered records get the next number from their counter before anything
/// is written.
async fn create<R: Record>(
    State(state): State<AppState>,
    BackOffice(auth): BackOffice,
    Json(record): Json<R>,
) -> Result<impl IntoResponse, AppError> {
    let stored = RecordService::new(state.store(), state.allocator())
        .create(record)
        .await?;

    tracing::info!(
        collection = %R::COLLECTION,
        id = %stored.id,
        uid = %auth.principal.uid,
        "Record created"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/<collection>/{id}
async fn show<R: Record>(
    State(state): State<AppState>,
    BackOffice(_): BackOffice,
    Path(id): Path<String>,
) -> Result<Json<Stored<R>>, AppError> {
    RecordRepository::<R>::new(state.store())
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{}/{id}", R::COLLECTION)))
}

/// PUT /api/<collection>/{id}
///
/// The body carries the version the client last read; a stale version is a
/// conflict.
async fn update<R: Record>(
    State(state): State<AppState>,
    BackOffice(auth): BackOffice,
    Path(id): Path<String>,
    Json(edit): Json<Versioned<R>>,
) -> Result<Json<Stored<R>>, AppError> {
    let stored = RecordRepository::<R>::new(state.store())
        .update(&id, edit.version, edit.record)
        .await?;

    tracing::info!(
        collection = %R::COLLECTION,
        id = %id,
        version = stored.version,
        uid = %auth.principal.uid,
        "Record updated"
    );
    Ok(Json(stored))
}

/// DELETE /api/<collection>/{id}
async fn remove<R: Record>(
    State(state): State<AppState>,
    BackOffice(auth): BackOffice,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    RecordRepository::<R>::new(state.store()).delete(&id).await?;

    tracing::info!(
        collection = %R::COLLECTION,
        id = %id,
        uid = %auth.principal.uid,
        "Record deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
