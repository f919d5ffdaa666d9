use std::sync::Arc;

use axum::{
    Json,
    extract::{self, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{
    error::AppError,
    messaging::{BRIDGE_TOKEN_HEADER, InboundMessage},
    pairing::issue_pairing,
    state::State,
    update::update_profile_picture,
    utils::normalize_phone,
};

#[derive(Deserialize)]
pub struct PairRequest {
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    success: bool,
    pair_code: String,
    qr_image: String,
    deep_link: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    image_data: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    success: bool,
    message: &'static str,
}

#[derive(Deserialize)]
pub struct InboundBatch {
    messages: Vec<InboundMessage>,
}

/// Constant-time check of the gateway's shared secret.
fn token_matches(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get(BRIDGE_TOKEN_HEADER)
        .is_some_and(|presented| bool::from(presented.as_bytes().ct_eq(token.as_bytes())))
}

fn required(field: Option<String>, missing: &'static str) -> Result<String, AppError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or(AppError::InvalidInput(missing))
}

fn phone_from(field: Option<String>) -> Result<String, AppError> {
    let phone = required(field, "Phone number required")?;

    normalize_phone(&phone).ok_or(AppError::InvalidInput("Invalid phone number"))
}

pub async fn generate_pair_handler(
    extract::State(state): extract::State<Arc<State>>,
    payload: Result<Json<PairRequest>, JsonRejection>,
) -> Result<Json<PairResponse>, AppError> {
    let Json(request) = payload.map_err(|_| AppError::InvalidInput("Phone number required"))?;
    let phone = phone_from(request.phone)?;

    let pairing = issue_pairing(&state, &phone, Utc::now()).await?;

    Ok(Json(PairResponse {
        success: true,
        pair_code: pairing.code,
        qr_image: pairing.qr_image,
        deep_link: pairing.deep_link,
        expires_at: pairing.expires_at,
    }))
}

pub async fn update_dp_handler(
    extract::State(state): extract::State<Arc<State>>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>, AppError> {
    let Json(request) = payload.map_err(|_| AppError::InvalidInput("Malformed payload"))?;
    let phone = phone_from(request.phone)?;
    let image_data = required(request.image_data, "Image data required")?;

    update_profile_picture(&state, &phone, &image_data).await?;

    Ok(Json(UpdateResponse {
        success: true,
        message: "DP updated successfully!",
    }))
}

pub async fn inbound_handler(
    extract::State(state): extract::State<Arc<State>>,
    headers: HeaderMap,
    payload: Result<Json<InboundBatch>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    if let Some(token) = &state.config.bridge_token {
        if !token_matches(&headers, token) {
            return Ok(StatusCode::UNAUTHORIZED);
        }
    }

    let Json(batch) = payload.map_err(|_| AppError::InvalidInput("Malformed payload"))?;

    for message in batch.messages {
        state
            .inbound
            .send(message)
            .await
            .map_err(|_| AppError::Internal("verification listener stopped".to_string()))?;
    }

    Ok(StatusCode::ACCEPTED)
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn with_token(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(BRIDGE_TOKEN_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches(&with_token("s3cret"), "s3cret"));
        assert!(!token_matches(&with_token("s3cre"), "s3cret"));
        assert!(!token_matches(&with_token("s3cret!"), "s3cret"));
        assert!(!token_matches(&with_token("S3CRET"), "s3cret"));
        assert!(!token_matches(&HeaderMap::new(), "s3cret"));
    }
}
