//! The directory's TCP front end.
//!
//! One task per accepted connection. Each task owns a [`Session`] and loops
//! read frame, handle, write reply. The server keeps a table of live
//! connections so shutdown can abort them and operators can list them.

use crate::{DirectoryConfig, Result, Session};
use parking_lot::Mutex;
use peerdex_core::PeerId;
use peerdex_protocol::{read_frame, write_message, Message};
use peerdex_registry::Registry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A live control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Remote socket address.
    pub addr: SocketAddr,
    /// Identity bound by HELLO, if any.
    pub peer: Option<PeerId>,
}

#[derive(Debug)]
struct ConnectionEntry {
    info: ConnectionInfo,
    abort: Option<AbortHandle>,
}

#[derive(Debug, Default)]
struct ConnectionTable {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, ConnectionEntry>>,
}

impl ConnectionTable {
    fn open(&self, addr: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(
            id,
            ConnectionEntry {
                info: ConnectionInfo { addr, peer: None },
                abort: None,
            },
        );
        id
    }

    /// A missing entry means the task already closed itself or shutdown
    /// drained the table first. Aborting covers both.
    fn attach(&self, id: u64, abort: AbortHandle) {
        match self.entries.lock().get_mut(&id) {
            Some(entry) => entry.abort = Some(abort),
            None => abort.abort(),
        }
    }

    fn bind(&self, id: u64, peer: Option<&PeerId>) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.info.peer = peer.cloned();
        }
    }

    fn close(&self, id: u64) {
        self.entries.lock().remove(&id);
    }

    fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<_> = self
            .entries
            .lock()
            .values()
            .map(|entry| entry.info.clone())
            .collect();
        infos.sort_by_key(|info| info.addr);
        infos
    }

    fn abort_all(&self) -> usize {
        let entries: Vec<_> = self.entries.lock().drain().collect();
        for (_, entry) in &entries {
            if let Some(abort) = &entry.abort {
                abort.abort();
            }
        }
        entries.len()
    }
}

/// Stops a running [`DirectoryServer`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    connections: Arc<ConnectionTable>,
}

impl ShutdownHandle {
    /// Stops accepting, stops the sweeper, and aborts live connections.
    ///
    /// Connection tasks are not awaited.
    pub fn shutdown(&self) {
        self.token.cancel();
        let aborted = self.connections.abort_all();
        info!(aborted, "Directory shut down");
    }

    /// Returns the live connections.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections.snapshot()
    }
}

/// The directory server.
#[derive(Debug)]
pub struct DirectoryServer {
    listener: TcpListener,
    config: DirectoryConfig,
    registry: Arc<Registry>,
    connections: Arc<ConnectionTable>,
    token: CancellationToken,
}

impl DirectoryServer {
    /// Validates `config` and binds the control-plane listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound.
    pub async fn bind(config: DirectoryConfig, registry: Arc<Registry>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.listen_addr).await?;
        info!(addr = %listener.local_addr()?, "Directory listening");
        Ok(Self {
            listener,
            config,
            registry,
            connections: Arc::new(ConnectionTable::default()),
            token: CancellationToken::new(),
        })
    }

    /// Returns the bound address, useful when listening on port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the registry this server serves.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Returns the live connections.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections.snapshot()
    }

    /// Returns a handle that stops the server once [`run`](Self::run) has
    /// taken ownership of it.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.token.clone(),
            connections: Arc::clone(&self.connections),
        }
    }

    /// Stops the server. Equivalent to [`ShutdownHandle::shutdown`].
    pub fn shutdown(&self) {
        self.shutdown_handle().shutdown();
    }

    /// Accepts connections until shut down, running the sweeper alongside.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are logged and the
    /// loop continues.
    pub async fn run(self) -> Result<()> {
        let sweeper = tokio::spawn(crate::sweep::run_sweeper(
            Arc::clone(&self.registry),
            self.config.sweep_interval,
            self.config.peer_timeout,
            self.token.clone(),
        ));

        loop {
            tokio::select! {
                () = self.token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
            }
        }

        sweeper.abort();
        self.connections.abort_all();
        info!("Directory stopped accepting");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let id = self.connections.open(addr);
        info!(addr = %addr, "Connection accepted");

        let task = tokio::spawn(serve_connection(
            stream,
            addr,
            id,
            Arc::clone(&self.registry),
            Arc::clone(&self.connections),
        ));
        self.connections.attach(id, task.abort_handle());
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    id: u64,
    registry: Arc<Registry>,
    connections: Arc<ConnectionTable>,
) {
    let (mut reader, mut writer) = stream.split();
    let mut session = Session::new(registry);

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(addr = %addr, error = %e, "Dropping connection");
                break;
            }
        };

        let reply = match Message::decode_bytes(&frame) {
            Ok(request) => {
                debug!(addr = %addr, kind = %request.kind(), "Request");
                session.handle(request)
            }
            Err(e) => session.reject_malformed(&e),
        };
        connections.bind(id, session.identity());

        if let Err(e) = write_message(&mut writer, &reply).await {
            warn!(addr = %addr, error = %e, "Failed to write reply");
            break;
        }
        if session.is_closed() {
            break;
        }
    }

    // The peer record stays until BYE or the sweeper removes it.
    connections.close(id);
    info!(addr = %addr, peer = ?session.identity(), "Connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[tokio::test]
    async fn attach_after_drain_aborts_the_task() {
        let table = ConnectionTable::default();
        let id = table.open(addr());
        assert_eq!(table.abort_all(), 1);

        let task = tokio::spawn(std::future::pending::<()>());
        table.attach(id, task.abort_handle());

        assert!(task.await.unwrap_err().is_cancelled());
        assert!(table.snapshot().is_empty());
    }

    #[tokio::test]
    async fn abort_all_reaches_attached_tasks() {
        let table = ConnectionTable::default();
        let id = table.open(addr());
        let task = tokio::spawn(std::future::pending::<()>());
        table.attach(id, task.abort_handle());
        assert_eq!(table.snapshot().len(), 1);

        assert_eq!(table.abort_all(), 1);
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
