//! A running peer: repository, transfer listener, directory session, and
//! pinger wired together.

use crate::{Catalog, FsStore, PeerClient, PeerConfig, Result, TransferListener};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything one peer runs.
#[derive(Debug)]
pub struct PeerNode {
    client: Arc<PeerClient>,
    store: Arc<FsStore>,
    listener: TransferListener,
    pinger: JoinHandle<()>,
    pinger_token: CancellationToken,
}

impl PeerNode {
    /// Opens the repository, starts the listener, registers with the
    /// directory, and starts pinging.
    ///
    /// The identity uses the listener's actual port, so a configured port
    /// of 0 works.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the repository
    /// cannot be opened, the port cannot be bound, or the directory refuses.
    pub async fn start(config: &PeerConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(FsStore::open(config.repository_path())?);
        let catalog = Arc::new(Catalog::new(store.clone()));

        let listener =
            TransferListener::bind(config.listen_addr, Arc::clone(&catalog), config.chunk_size)
                .await?;
        let identity = config.identity(listener.local_addr().port())?;

        let client = match PeerClient::connect(&config.directory, identity, catalog).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                listener.shutdown();
                return Err(e);
            }
        };
        let pinger_token = CancellationToken::new();
        let pinger = client.spawn_pinger(config.ping_interval, pinger_token.clone());

        info!(
            peer = %client.identity(),
            repository = %store.root().display(),
            "Peer started"
        );
        Ok(Self {
            client,
            store,
            listener,
            pinger,
            pinger_token,
        })
    }

    /// Returns the directory client.
    #[must_use]
    pub fn client(&self) -> &Arc<PeerClient> {
        &self.client
    }

    /// Returns the local repository.
    #[must_use]
    pub fn store(&self) -> &Arc<FsStore> {
        &self.store
    }

    /// Returns the transfer listener.
    #[must_use]
    pub fn listener(&self) -> &TransferListener {
        &self.listener
    }

    /// Leaves the network and stops serving.
    ///
    /// A ping already in flight finishes before BYE is sent.
    pub async fn shutdown(self) {
        self.pinger_token.cancel();
        if let Err(e) = self.pinger.await {
            warn!(error = %e, "Pinger task failed");
        }
        self.client.disconnect().await;
        self.listener.shutdown();
        info!(peer = %self.client.identity(), "Peer stopped");
    }
}
