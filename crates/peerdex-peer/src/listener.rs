//! Serving side of a peer-to-peer transfer.
//!
//! Each accepted connection carries exactly one GET. The listener answers
//! with a DATA header followed by the raw bytes, or with an ERROR, and then
//! closes the connection.

use crate::{Catalog, Result};
use peerdex_protocol::{codes, read_message, write_message, Message};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Accepts GET requests and streams files from a [`Catalog`].
#[derive(Debug)]
pub struct TransferListener {
    local_addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TransferListener {
    /// Binds `addr` and starts serving in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, catalog: Arc<Catalog>, chunk_size: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| crate::PeerError::connection(addr, e))?;
        let local_addr = listener.local_addr()?;
        let token = CancellationToken::new();
        info!(addr = %local_addr, "Transfer listener started");

        let task = tokio::spawn(accept_loop(
            listener,
            catalog,
            chunk_size.max(1),
            token.clone(),
        ));
        Ok(Self {
            local_addr,
            token,
            task,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and aborts transfers in flight.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Returns true once the accept loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TransferListener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    catalog: Arc<Catalog>,
    chunk_size: usize,
    token: CancellationToken,
) {
    let mut handlers = JoinSet::new();
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(addr = %addr, "Transfer connection accepted");
                    handlers.spawn(serve_request(stream, addr, Arc::clone(&catalog), chunk_size));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
        }
    }
    handlers.abort_all();
    info!("Transfer listener stopped");
}

async fn serve_request(
    mut stream: TcpStream,
    addr: SocketAddr,
    catalog: Arc<Catalog>,
    chunk_size: usize,
) {
    if let Err(e) = respond(&mut stream, &catalog, chunk_size).await {
        warn!(addr = %addr, error = %e, "Transfer failed");
    }
    let _ = stream.shutdown().await;
}

async fn respond(stream: &mut TcpStream, catalog: &Catalog, chunk_size: usize) -> Result<()> {
    let (filename, requester) = match read_message(stream).await {
        Ok(Some(Message::Get {
            filename,
            requester,
        })) => (filename, requester),
        Ok(None) => return Ok(()),
        Ok(Some(other)) => {
            let reply = Message::error(codes::INVALID, format!("expected GET, got {}", other.kind()));
            return Ok(write_message(stream, &reply).await?);
        }
        Err(e) if !e.is_fatal() => {
            let reply = Message::error(codes::INVALID, "invalid request");
            return Ok(write_message(stream, &reply).await?);
        }
        Err(e) => return Err(e.into()),
    };

    let content = match catalog.resolve(&filename) {
        Some(local) => catalog.store().read_file(&local),
        None => Err(crate::PeerError::LocalFileMissing(filename.clone())),
    };
    let content = match content {
        Ok(content) => content,
        Err(e) => {
            info!(file = %filename, requester = %requester, error = %e, "Requested file not available");
            let reply = Message::error(codes::NOT_FOUND, format!("file not found: {filename}"));
            return Ok(write_message(stream, &reply).await?);
        }
    };

    write_message(
        stream,
        &Message::Data {
            filename: filename.clone(),
            size: content.len() as u64,
        },
    )
    .await?;
    for chunk in content.chunks(chunk_size) {
        stream.write_all(chunk).await?;
    }
    stream.flush().await?;

    info!(file = %filename, requester = %requester, bytes = content.len(), "File sent");
    Ok(())
}
