//! Directory client and fetch orchestration.

use crate::transfer::{download, resolve_provider};
use crate::{Catalog, FailedAttempt, PeerError, Result};
use peerdex_core::PeerId;
use peerdex_protocol::{read_message, write_message, Message};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a fetch was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was already in the local repository; nothing was sent.
    AlreadyLocal,
    /// The file was downloaded.
    Downloaded {
        /// The provider that served it.
        provider: PeerId,
        /// Bytes written to the repository.
        bytes: u64,
    },
}

/// A registered session with the directory.
///
/// Requests from the user and from the pinger share one control connection.
/// Each request holds the connection until its reply arrives, so replies are
/// never interleaved.
#[derive(Debug)]
pub struct PeerClient {
    identity: PeerId,
    directory: String,
    control: Mutex<TcpStream>,
    catalog: Arc<Catalog>,
}

impl PeerClient {
    /// Connects to the directory, registers with HELLO, and announces the
    /// current file list.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unreachable or refuses the
    /// registration.
    pub async fn connect(directory: &str, identity: PeerId, catalog: Arc<Catalog>) -> Result<Self> {
        let stream = TcpStream::connect(directory)
            .await
            .map_err(|e| PeerError::connection(directory, e))?;
        let client = Self {
            identity,
            directory: directory.to_string(),
            control: Mutex::new(stream),
            catalog,
        };

        let reply = client
            .exchange(Message::Hello {
                name: client.identity.host().to_string(),
                port: client.identity.port(),
            })
            .await?;
        expect_ok(reply)?;
        info!(directory = %client.directory, peer = %client.identity, "Registered with directory");

        client.update_file_list().await?;
        Ok(client)
    }

    /// Returns this peer's identity.
    #[must_use]
    pub fn identity(&self) -> &PeerId {
        &self.identity
    }

    /// Returns the catalog of served files.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    async fn exchange(&self, request: Message) -> Result<Message> {
        let mut control = self.control.lock().await;
        write_message(&mut *control, &request).await?;
        read_message(&mut *control)
            .await?
            .ok_or(PeerError::Disconnected)
    }

    /// Announces a local file, optionally under a different name.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::LocalFileMissing`] if `local` is not in the
    /// repository, or an error if the directory refuses.
    pub async fn publish(&self, local: &str, announced: Option<&str>) -> Result<()> {
        if !self.catalog.store().file_exists(local) {
            return Err(PeerError::LocalFileMissing(local.to_string()));
        }
        let announced = announced.unwrap_or(local);
        self.catalog.alias(announced, local);

        let reply = self
            .exchange(Message::Publish {
                filename: announced.to_string(),
                peer: self.identity.clone(),
            })
            .await;
        match reply.and_then(expect_ok) {
            Ok(()) => {
                info!(file = %announced, local = %local, "File published");
                Ok(())
            }
            Err(e) => {
                self.catalog.unalias(announced);
                Err(e)
            }
        }
    }

    /// Gets a file into the local repository.
    ///
    /// Asks the directory for providers and tries each distinct one, other
    /// than this peer, in the order received until one transfer completes.
    ///
    /// # Errors
    ///
    /// - [`PeerError::NoProviders`] if nobody else provides the file
    /// - [`PeerError::AllProvidersFailed`] with one entry per attempt
    pub async fn fetch(&self, filename: &str) -> Result<FetchOutcome> {
        if self.catalog.store().file_exists(filename) {
            debug!(file = %filename, "Already in repository");
            return Ok(FetchOutcome::AlreadyLocal);
        }

        let items = match self
            .exchange(Message::Fetch {
                filename: filename.to_string(),
            })
            .await?
        {
            Message::Result { items } => items,
            other => return Err(reply_error(other)),
        };

        let mut candidates: Vec<PeerId> = Vec::with_capacity(items.len());
        for item in &items {
            match item.parse::<PeerId>() {
                Ok(peer) if peer == self.identity => debug!(file = %filename, "Skipping self"),
                Ok(peer) if !candidates.contains(&peer) => candidates.push(peer),
                Ok(_) => {}
                Err(e) => warn!(provider = %item, error = %e, "Ignoring unparsable provider"),
            }
        }
        if candidates.is_empty() {
            return Err(PeerError::NoProviders(filename.to_string()));
        }
        info!(file = %filename, providers = candidates.len(), "Providers found");

        let store = self.catalog.store();
        let mut attempts = Vec::new();
        for provider in candidates {
            let result = match resolve_provider(&provider).await {
                Ok(addr) => download(addr, filename, &self.identity, store.as_ref()).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(bytes) => {
                    if let Err(e) = self.update_file_list().await {
                        warn!(error = %e, "Failed to announce downloaded file");
                    }
                    return Ok(FetchOutcome::Downloaded { provider, bytes });
                }
                Err(e) => {
                    warn!(provider = %provider, file = %filename, error = %e, "Provider failed");
                    attempts.push(FailedAttempt {
                        provider,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(PeerError::AllProvidersFailed {
            filename: filename.to_string(),
            attempts,
        })
    }

    /// Lists every file known to the directory with its providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn discover(&self) -> Result<BTreeMap<String, Vec<PeerId>>> {
        match self.exchange(Message::Discover { peer: None }).await? {
            Message::Listing { entries } => Ok(entries
                .into_iter()
                .map(|entry| (entry.filename, entry.providers))
                .collect()),
            Message::Result { items } if items.is_empty() => Ok(BTreeMap::new()),
            other => Err(reply_error(other)),
        }
    }

    /// Lists the files one peer has announced.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn discover_peer(&self, peer: &PeerId) -> Result<Vec<String>> {
        match self
            .exchange(Message::Discover {
                peer: Some(peer.clone()),
            })
            .await?
        {
            Message::Result { items } => Ok(items),
            Message::Listing { entries } if entries.is_empty() => Ok(Vec::new()),
            other => Err(reply_error(other)),
        }
    }

    /// Refreshes this peer's liveness.
    ///
    /// # Errors
    ///
    /// Returns an error unless the directory answers ALIVE.
    pub async fn ping(&self) -> Result<()> {
        match self
            .exchange(Message::Ping {
                peer: Some(self.identity.clone()),
            })
            .await?
        {
            Message::Alive => Ok(()),
            other => Err(reply_error(other)),
        }
    }

    /// Pings every `interval` until `token` is cancelled.
    ///
    /// Cancellation is only observed between pings, so a PING in flight
    /// always reads its ALIVE and the control stream stays in step. Failures
    /// are logged and the loop keeps going.
    pub fn spawn_pinger(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match client.ping().await {
                    Ok(()) => debug!("Ping acknowledged"),
                    Err(e) => warn!(error = %e, "Ping failed"),
                }
            }
            debug!("Pinger stopped");
        })
    }

    /// Replaces the directory's view of this peer's files.
    ///
    /// Returns the number of names announced.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or the directory
    /// refuses.
    pub async fn update_file_list(&self) -> Result<usize> {
        let files = self.catalog.announced_names()?;
        let count = files.len();
        let reply = self
            .exchange(Message::Update {
                peer: self.identity.clone(),
                files,
            })
            .await?;
        expect_ok(reply)?;
        debug!(files = count, "File list synchronized");
        Ok(count)
    }

    /// Leaves the network: sends BYE and closes the connection.
    ///
    /// A failed BYE is logged; the directory's sweep removes the peer
    /// eventually.
    pub async fn disconnect(&self) {
        match self.exchange(Message::Bye).await {
            Ok(Message::Ok { .. }) => info!(peer = %self.identity, "Left the network"),
            Ok(other) => warn!(reply = %other.kind(), "Unexpected reply to BYE"),
            Err(e) => warn!(error = %e, "BYE failed"),
        }
        let _ = self.control.lock().await.shutdown().await;
    }
}

fn expect_ok(reply: Message) -> Result<()> {
    match reply {
        Message::Ok { .. } => Ok(()),
        other => Err(reply_error(other)),
    }
}

fn reply_error(reply: Message) -> PeerError {
    match reply {
        Message::Error { code, description } => PeerError::Rejected { code, description },
        other => PeerError::unexpected(&other),
    }
}
