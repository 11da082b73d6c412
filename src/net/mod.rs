//! Connection management.
//!
//! The input peer does not talk to privacy peers itself; sessions do. What
//! the round controller needs from the network layer is a connection quorum
//! and the sorted list of peers that are active for the round.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;
use std::sync::Mutex;

use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::protocol::messaging::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    ConnectionFailed,
    StreamClosed,
    InvalidAddress,
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::ConnectionFailed => write!(f, "Connection failed"),
            NetError::StreamClosed => write!(f, "Stream closed"),
            NetError::InvalidAddress => write!(f, "Invalid address format"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NetError {}

/// Role a connected peer plays in the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    PrivacyPeer,
    InputPeer,
}

/// Connection-management service consumed by the round controller.
pub trait ConnectionManager: Send + Sync {
    /// Resolves once the configured quorum of privacy peers is connected.
    fn wait_for_connections(&self) -> BoxFuture<'_, Result<(), NetError>>;

    /// Promotes provisional connections to active.
    fn activate_temporary_connections(&self);

    /// Active peers sorted by identifier.
    fn active_peers(&self, only_privacy_peers: bool) -> Vec<PeerId>;
}

#[derive(Debug, Default)]
struct Connections {
    temporary: BTreeMap<PeerId, PeerRole>,
    active: BTreeMap<PeerId, PeerRole>,
}

impl Connections {
    fn privacy_peers(&self) -> usize {
        self.temporary
            .values()
            .chain(self.active.values())
            .filter(|role| **role == PeerRole::PrivacyPeer)
            .count()
    }
}

/// In-memory [`ConnectionManager`] fed by whatever transport accepts peers.
#[derive(Debug)]
pub struct PeerRegistry {
    quorum: usize,
    connections: Mutex<Connections>,
    connected: watch::Sender<usize>,
}

impl PeerRegistry {
    /// `quorum` privacy peers must be connected before a round can start.
    pub fn new(quorum: usize) -> Self {
        let (connected, _) = watch::channel(0);
        Self {
            quorum,
            connections: Mutex::new(Connections::default()),
            connected,
        }
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connections> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a provisional connection.
    pub fn connect(&self, peer: PeerId, role: PeerRole) -> Result<(), NetError> {
        if peer.as_str().trim().is_empty() {
            return Err(NetError::InvalidAddress);
        }
        let count = {
            let mut conns = self.lock();
            if conns.active.contains_key(&peer) {
                conns.active.insert(peer.clone(), role);
            } else {
                conns.temporary.insert(peer.clone(), role);
            }
            conns.privacy_peers()
        };
        log::debug!("Peer {} connected as {:?} ({} privacy peers)", peer, role, count);
        self.connected.send_replace(count);
        Ok(())
    }

    pub fn disconnect(&self, peer: &PeerId) {
        let count = {
            let mut conns = self.lock();
            conns.temporary.remove(peer);
            conns.active.remove(peer);
            conns.privacy_peers()
        };
        log::info!("Peer {} disconnected ({} privacy peers left)", peer, count);
        self.connected.send_replace(count);
    }

    pub fn connected_privacy_peers(&self) -> usize {
        self.lock().privacy_peers()
    }
}

impl ConnectionManager for PeerRegistry {
    fn wait_for_connections(&self) -> BoxFuture<'_, Result<(), NetError>> {
        let mut rx = self.connected.subscribe();
        let quorum = self.quorum;
        Box::pin(async move {
            rx.wait_for(|count| *count >= quorum)
                .await
                .map_err(|_| NetError::StreamClosed)?;
            log::info!("Connection quorum of {} privacy peers reached", quorum);
            Ok(())
        })
    }

    fn activate_temporary_connections(&self) {
        let mut conns = self.lock();
        let promoted = core::mem::take(&mut conns.temporary);
        if !promoted.is_empty() {
            log::debug!("Activating {} temporary connections", promoted.len());
        }
        conns.active.extend(promoted);
    }

    fn active_peers(&self, only_privacy_peers: bool) -> Vec<PeerId> {
        self.lock()
            .active
            .iter()
            .filter(|(_, role)| !only_privacy_peers || **role == PeerRole::PrivacyPeer)
            .map(|(peer, _)| peer.clone())
            .collect()
    }
}
