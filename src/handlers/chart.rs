use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::chart_key;
use crate::chart::BirthSubject;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{
    ChartRequest, ChartResponse, Coordinates, LatLng, PersonalData, ResponseMetadata,
};
use crate::state::AppState;

/// `POST /api/v1/mapa-astral`
pub async fn chart_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChartRequest>, JsonRejection>,
) -> ApiResult<Json<ChartResponse>> {
    REQUEST_TOTAL.with_label_values(&["mapa_astral"]).inc();
    let start_time = Instant::now();

    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    request.validate().map_err(ApiError::Validation)?;

    let key = chart_key(
        &request.birth_date,
        &request.birth_time,
        &request.birth_place,
    );
    if let Some(mut cached) = state.cache.get_chart(&key).await {
        cached.metadata.cache_hit = true;
        REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
        return Ok(Json(cached));
    }

    let coordinates = coordinates_for(&state, &request.birth_place).await?;

    let birth_datetime = request
        .birth_datetime()
        .map_err(|e| ApiError::Validation(format!("Erro ao processar data/hora: {e}")))?;

    let chart = state
        .charts
        .submit(BirthSubject {
            name: request.name.clone(),
            local_datetime: birth_datetime,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            timezone: request.timezone.clone(),
        })
        .await?;

    let response = ChartResponse {
        personal_data: PersonalData {
            name: request.name.clone(),
            birth_datetime: birth_datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
            formatted_place: coordinates.formatted_place(),
            coordinates: LatLng {
                latitude: coordinates.latitude,
                longitude: coordinates.longitude,
            },
        },
        chart,
        metadata: ResponseMetadata {
            computed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            api_version: state.app_version.clone(),
            cache_hit: false,
        },
    };

    state.cache.put_chart(&key, &response).await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    tracing::info!(place = %request.birth_place, "chart computed");
    Ok(Json(response))
}

// Cached coordinates, else the geocoder with write-through
async fn coordinates_for(state: &AppState, place: &str) -> ApiResult<Coordinates> {
    if let Some(coordinates) = state.cache.get_coordinates(place).await {
        return Ok(coordinates);
    }

    let coordinates = state.geocoder.resolve(place).await.ok_or_else(|| {
        ApiError::PlaceNotFound(format!(
            "Localidade '{place}' não encontrada. Verifique o formato: Cidade/UF"
        ))
    })?;
    state.cache.put_coordinates(place, &coordinates).await;
    Ok(coordinates)
}
