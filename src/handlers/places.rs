use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::metrics::REQUEST_TOTAL;
use crate::models::PlaceLookupResponse;
use crate::state::AppState;

/// `GET /api/v1/localidades/{*place}`, e.g. `/localidades/Curitiba/PR`
pub async fn place_handler(
    State(state): State<Arc<AppState>>,
    Path(place): Path<String>,
) -> ApiResult<Json<PlaceLookupResponse>> {
    REQUEST_TOTAL.with_label_values(&["localidades"]).inc();

    if let Some(data) = state.cache.get_coordinates(&place).await {
        return Ok(Json(PlaceLookupResponse {
            data,
            cache_hit: true,
        }));
    }

    let data = state
        .geocoder
        .resolve(&place)
        .await
        .ok_or_else(|| ApiError::PlaceNotFound(format!("Localidade '{place}' não encontrada")))?;

    state.cache.put_coordinates(&place, &data).await;

    Ok(Json(PlaceLookupResponse {
        data,
        cache_hit: false,
    }))
}
