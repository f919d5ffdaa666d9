use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{sync::mpsc::Receiver, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    messaging::{InboundMessage, Messenger, from_address},
    state::State,
    store::Verification,
    utils::normalize_phone,
};

pub const ACCEPTED_REPLY: &str = "Pair code accepted! Your DP will be updated shortly.";

/// Consumes inbound messages one at a time until every sender is dropped.
pub async fn run(state: Arc<State>, mut inbound: Receiver<InboundMessage>) {
    info!("Verification listener started");

    while let Some(message) = inbound.recv().await {
        handle_message(&state, message, Utc::now()).await;
    }

    info!("Inbound channel closed, verification listener stopping");
}

/// Sends the acceptance reply off the listener loop so a slow gateway
/// cannot hold up other senders.
async fn confirm(messenger: Arc<dyn Messenger>, address: String, phone: String, limit: Duration) {
    match timeout(limit, messenger.send_text(&address, ACCEPTED_REPLY)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to confirm pairing to {phone}: {e}"),
        Err(_) => warn!("Timed out confirming pairing to {phone}"),
    }
}

/// Matches a message against the sender's pending code.
///
/// Returns `None` for messages that are not one-to-one text. Rejections
/// never get a reply, the reply to an acceptance is sent in the background.
pub async fn handle_message(
    state: &State,
    message: InboundMessage,
    now: DateTime<Utc>,
) -> Option<Verification> {
    let phone = from_address(&message.from).and_then(normalize_phone)?;
    let text = message
        .text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())?;

    let outcome = state.store.verify(&phone, text, now).await;

    match outcome {
        Verification::Accepted => {
            info!("Pair code accepted for {phone}");

            tokio::spawn(confirm(
                state.messenger.clone(),
                message.from,
                phone,
                state.config.update_timeout,
            ));
        }
        Verification::Expired => info!("Expired pair code from {phone}"),
        Verification::Exhausted => warn!("Too many wrong pair codes from {phone}, pairing dropped"),
        Verification::WrongCode { attempts } => debug!("Wrong pair code from {phone} ({attempts} so far)"),
        Verification::NoPairing => {}
    }

    Some(outcome)
}
