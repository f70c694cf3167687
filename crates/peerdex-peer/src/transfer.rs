//! Requesting side of a peer-to-peer transfer.

use crate::{LocalStore, PeerError, Result};
use peerdex_core::PeerId;
use peerdex_protocol::{codes, read_message, write_message, Message};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Upper bound on the buffer reserved up front for a download.
const INITIAL_BUFFER_LIMIT: u64 = 1024 * 1024;

/// Turns a provider identity into a socket address.
///
/// An IP host is used as is. A bare name with no dots is a node name from
/// HELLO and is taken to live on this machine. Anything else is looked up.
///
/// # Errors
///
/// Returns [`PeerError::Connection`] if the lookup fails or yields nothing.
pub async fn resolve_provider(peer: &PeerId) -> Result<SocketAddr> {
    if let Ok(ip) = peer.host().parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, peer.port()));
    }
    if !peer.host().contains('.') {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), peer.port()));
    }
    let mut addrs = tokio::net::lookup_host((peer.host(), peer.port()))
        .await
        .map_err(|e| PeerError::connection(peer, e))?;
    addrs.next().ok_or_else(|| {
        PeerError::connection(
            peer,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
        )
    })
}

/// Downloads `filename` from the peer listening at `addr` into `store`.
///
/// The file is written only once every announced byte has arrived.
/// Returns the number of bytes written.
///
/// # Errors
///
/// - [`PeerError::Connection`] if the provider cannot be reached
/// - [`PeerError::NotFound`] if the provider does not have the file
/// - [`PeerError::Rejected`] for any other ERROR reply
/// - [`PeerError::UnexpectedReply`] for a reply that is not DATA for
///   `filename`
/// - [`PeerError::IncompleteTransfer`] if the stream ends early
pub async fn download(
    addr: SocketAddr,
    filename: &str,
    requester: &PeerId,
    store: &dyn LocalStore,
) -> Result<u64> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| PeerError::connection(addr, e))?;
    debug!(addr = %addr, file = %filename, "Requesting file");

    write_message(
        &mut stream,
        &Message::Get {
            filename: filename.to_string(),
            requester: requester.clone(),
        },
    )
    .await?;

    let expected = match read_message(&mut stream).await? {
        Some(Message::Data { filename: name, size }) if name == filename => size,
        Some(Message::Data { filename: name, .. }) => {
            return Err(PeerError::UnexpectedReply(format!(
                "DATA for {name} instead of {filename}"
            )));
        }
        Some(Message::Error { code, .. }) if code == codes::NOT_FOUND => {
            return Err(PeerError::NotFound(filename.to_string()));
        }
        Some(Message::Error { code, description }) => {
            return Err(PeerError::Rejected { code, description });
        }
        Some(other) => return Err(PeerError::unexpected(&other)),
        None => {
            return Err(PeerError::UnexpectedReply(
                "connection closed before reply".into(),
            ));
        }
    };

    let mut content =
        Vec::with_capacity(usize::try_from(expected.min(INITIAL_BUFFER_LIMIT)).unwrap_or(0));
    let received = (&mut stream)
        .take(expected)
        .read_to_end(&mut content)
        .await? as u64;
    if received < expected {
        warn!(addr = %addr, file = %filename, expected, received, "Transfer cut short");
        return Err(PeerError::IncompleteTransfer { expected, received });
    }

    store.write_file(filename, &content)?;
    info!(addr = %addr, file = %filename, bytes = received, "Download complete");
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_names_to_loopback() {
        let peer = PeerId::new("alice", 5001).unwrap();
        assert_eq!(
            resolve_provider(&peer).await.unwrap(),
            "127.0.0.1:5001".parse().unwrap()
        );

        let peer = PeerId::new("10.1.2.3", 7000).unwrap();
        assert_eq!(
            resolve_provider(&peer).await.unwrap(),
            "10.1.2.3:7000".parse().unwrap()
        );

        let peer = PeerId::new("::1", 7000).unwrap();
        assert_eq!(
            resolve_provider(&peer).await.unwrap(),
            "[::1]:7000".parse().unwrap()
        );
    }
}
