use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::chart::ChartError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PlaceNotFound(String),
    #[error("Erro ao calcular mapa astral: {0}")]
    Computation(#[from] ChartError),
    #[error("Limite de requisições excedido. Tente novamente mais tarde.")]
    RateLimited,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PlaceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Computation(e) => {
                tracing::error!(error = %e, "chart computation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        };
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
