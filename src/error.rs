use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::response::{ApiResponse, Meta};
use crate::status::OrderStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cart cannot be empty")]
    EmptyCart,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid product ids: {}", format_ids(.0))]
    InvalidProductReference(Vec<Uuid>),

    #[error("Variant not found for product {product} with storage {storage} and condition {condition}")]
    VariantNotFound {
        product: String,
        storage: String,
        condition: String,
    },

    #[error("Not enough stock for product {product}")]
    InsufficientStock { product: String },

    #[error("Order not found")]
    OrderNotFound,

    #[error("Invalid status value: {0}")]
    InvalidStatus(String),

    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Storage failure")]
    DbError(#[from] sqlx::Error),

    #[error("Storage failure")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

fn format_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::EmptyCart
            | AppError::InvalidProductReference(_)
            | AppError::VariantNotFound { .. }
            | AppError::InsufficientStock { .. }
            | AppError::UserNotFound
            | AppError::InvalidStatus(_)
            | AppError::IllegalTransition { .. }
            | AppError::Validation(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::OrderNotFound | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
