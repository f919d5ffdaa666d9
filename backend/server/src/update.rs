use chrono::Utc;
use tokio::{task::spawn_blocking, time::timeout};
use tracing::info;

use crate::{
    error::AppError,
    messaging::{MessengerError, to_address},
    picture::{ImageError, ImageSpec, decode_payload, process_image},
    state::State,
};

/// Claims the phone's verified session and pushes the picture.
///
/// Single attempt. Unpaired phones are turned away before the payload is
/// decoded, and a payload that is not base64 leaves the session in place.
/// The claim consumes the session and any pending code in one step, so
/// concurrent requests for the same phone see `NotAuthorized` and a new
/// cycle started while the push runs is left alone.
pub async fn update_profile_picture(
    state: &State,
    phone: &str,
    image_data: &str,
) -> Result<(), AppError> {
    if !state.store.is_active(phone, Utc::now()).await {
        return Err(AppError::NotAuthorized);
    }

    let bytes = decode_payload(image_data).map_err(|_| AppError::InvalidInput("Invalid image data"))?;

    if !state.store.claim(phone, Utc::now()).await {
        return Err(AppError::NotAuthorized);
    }

    push_picture(state, phone, bytes).await?;
    info!("Profile picture updated for {phone}");

    Ok(())
}

async fn push_picture(state: &State, phone: &str, bytes: Vec<u8>) -> Result<(), AppError> {
    let spec = ImageSpec {
        size: state.config.image_size,
        quality: state.config.jpeg_quality,
    };

    let jpeg = timeout(
        state.config.update_timeout,
        spawn_blocking(move || process_image(&bytes, spec)),
    )
    .await
    .map_err(|_| ImageError::TimedOut)?
    .map_err(|e| AppError::Internal(e.to_string()))??;

    timeout(
        state.config.update_timeout,
        state.messenger.set_profile_picture(&to_address(phone), jpeg),
    )
    .await
    .map_err(|_| MessengerError::Timeout)??;

    Ok(())
}
