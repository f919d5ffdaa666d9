use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, Sender, channel};

use super::{
    config::Config,
    messaging::{BridgeMessenger, InboundMessage, Messenger},
    store::{MemoryStore, PairingStore},
};

const INBOUND_CAPACITY: usize = 256;

pub struct State {
    pub config: Config,
    pub store: Arc<dyn PairingStore>,
    pub messenger: Arc<dyn Messenger>,
    pub inbound: Sender<InboundMessage>,
}

impl State {
    pub async fn new() -> (Arc<Self>, Receiver<InboundMessage>) {
        let config = Config::load();

        let store = Arc::new(MemoryStore::new(
            config.max_verify_attempts,
            config.session_ttl,
        ));

        let messenger = Arc::new(
            BridgeMessenger::new(
                &config.bridge_url,
                config.bridge_token.clone(),
                &config.auth_state_path,
                config.update_timeout,
            )
            .expect("Gateway client misconfigured!"),
        );

        Self::with_parts(config, store, messenger)
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn PairingStore>,
        messenger: Arc<dyn Messenger>,
    ) -> (Arc<Self>, Receiver<InboundMessage>) {
        let (inbound, receiver) = channel(INBOUND_CAPACITY);

        let state = Arc::new(Self {
            config,
            store,
            messenger,
            inbound,
        });

        (state, receiver)
    }
}
