use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use rand::Rng;
use tracing::info;

use crate::{error::AppError, state::State, store::PairingEntry};

const QR_MIN_SIZE: u32 = 256;

pub struct Pairing {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub deep_link: String,
    pub qr_image: String,
}

/// Uniform over 100000..=999999, so codes never start with zero.
pub fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999u32).to_string()
}

/// Link that opens a chat with the service account, prefilled with the code.
pub fn deep_link(service_phone: Option<&str>, code: &str) -> String {
    format!("https://wa.me/{}?text={code}", service_phone.unwrap_or_default())
}

pub fn qr_data_url(link: &str) -> Result<String, AppError> {
    let qr = QrCode::new(link.as_bytes()).map_err(|e| AppError::Internal(e.to_string()))?;

    let img = qr
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build();

    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(png.into_inner())
    ))
}

/// Issues a fresh code for an already normalized phone, replacing any
/// pending one.
pub async fn issue_pairing(
    state: &State,
    phone: &str,
    now: DateTime<Utc>,
) -> Result<Pairing, AppError> {
    let code = generate_code();
    let ttl = TimeDelta::from_std(state.config.code_ttl)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let expires_at = now + ttl;

    let deep_link = deep_link(state.config.service_phone.as_deref(), &code);
    let qr_image = qr_data_url(&deep_link)?;

    if state.store.pairing(phone).await.is_some() {
        info!("Replacing pending pair code for {phone}");
    }

    state
        .store
        .put_pairing(phone, PairingEntry::new(code.clone(), expires_at))
        .await;

    info!("Issued pair code for {phone}, expires at {expires_at}");

    Ok(Pairing {
        code,
        expires_at,
        deep_link,
        qr_image,
    })
}
