//! Privacy-peer sessions.
//!
//! One session runs per active privacy peer and round. Sessions deliver the
//! peer's shares, follow the privacy peers through the protocol and finally
//! report the outcome through [`SessionContext::report`]. How a session talks
//! to its peer is up to the [`SessionFactory`]; this module only defines what
//! a session is given.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Barrier};

use crate::dataset::TopologyDataset;
use crate::protocol::messaging::{IdrMessage, PeerId, SessionMessage};
use crate::shares::PeerShares;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The controller no longer listens for this round.
    ChannelClosed,
    /// The input peer is shutting down.
    Stopped,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ChannelClosed => write!(f, "Result channel closed"),
            SessionError::Stopped => write!(f, "Input peer stopped"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Cooperative stop signal shared by the controller and every session.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a session is handed at spawn time.
#[derive(Clone)]
pub struct SessionContext {
    /// Position of the peer in the round's sorted peer list.
    pub local_index: usize,
    pub peer_id: PeerId,
    pub time_slot: u32,
    pub shares: Arc<PeerShares>,
    pub dataset: Arc<TopologyDataset>,
    barrier: Arc<Barrier>,
    sender: mpsc::UnboundedSender<SessionMessage>,
    stop: StopFlag,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("local_index", &self.local_index)
            .field("peer_id", &self.peer_id)
            .field("time_slot", &self.time_slot)
            .field("shares", &"***SENSITIVE***")
            .finish()
    }
}

impl SessionContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_index: usize,
        peer_id: PeerId,
        time_slot: u32,
        shares: Arc<PeerShares>,
        dataset: Arc<TopologyDataset>,
        barrier: Arc<Barrier>,
        sender: mpsc::UnboundedSender<SessionMessage>,
        stop: StopFlag,
    ) -> Self {
        Self {
            local_index,
            peer_id,
            time_slot,
            shares,
            dataset,
            barrier,
            sender,
            stop,
        }
    }

    /// Waits until every session of the round has reached this point.
    pub async fn synchronize(&self) {
        let result = self.barrier.wait().await;
        if result.is_leader() {
            log::debug!("All sessions of time slot {} synchronized", self.time_slot);
        }
    }

    /// Forwards a message to the round's aggregator.
    pub fn report(&self, message: IdrMessage) -> Result<(), SessionError> {
        let msg = SessionMessage::new(self.peer_id.clone(), self.local_index, self.time_slot, message);
        self.sender.send(msg).map_err(|_| SessionError::ChannelClosed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Errors with [`SessionError::Stopped`] once the controller has stopped.
    pub fn check_stopped(&self) -> Result<(), SessionError> {
        if self.is_stopped() {
            return Err(SessionError::Stopped);
        }
        Ok(())
    }
}

/// Creates the session task for one privacy peer.
pub trait SessionFactory: Send + Sync {
    fn spawn_session(&self, ctx: SessionContext) -> BoxFuture<'static, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Properties;

    fn context(
        index: usize,
        barrier: Arc<Barrier>,
        sender: mpsc::UnboundedSender<SessionMessage>,
        stop: StopFlag,
    ) -> SessionContext {
        let dataset = TopologyDataset::from_properties(
            &Properties::parse("nitems=0\nDestination=1"),
            &Properties::new(),
        )
        .unwrap();
        let shares = PeerShares {
            peer_index: index,
            classification: Vec::new(),
            export: Vec::new(),
            zero: Vec::new(),
        };
        SessionContext::new(
            index,
            PeerId::new(format!("pp{}", index)),
            1,
            Arc::new(shares),
            Arc::new(dataset),
            barrier,
            sender,
            stop,
        )
    }

    #[tokio::test]
    async fn test_sessions_pass_barrier_together() {
        let barrier = Arc::new(Barrier::new(3));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stop = StopFlag::new();

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let ctx = context(i, barrier.clone(), tx.clone(), stop.clone());
                tokio::spawn(async move {
                    ctx.synchronize().await;
                    ctx.report(IdrMessage::Dummy).unwrap();
                })
            })
            .collect();
        drop(tx);
        for handle in handles {
            handle.await.unwrap();
        }

        let mut senders = Vec::new();
        while let Some(msg) = rx.recv().await {
            assert_eq!(msg.time_slot, 1);
            senders.push(msg.peer_index);
        }
        senders.sort();
        assert_eq!(senders, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_report_after_close_and_stop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = StopFlag::new();
        let ctx = context(0, Arc::new(Barrier::new(1)), tx, stop.clone());

        assert!(ctx.check_stopped().is_ok());
        stop.stop();
        assert!(ctx.is_stopped());
        assert_eq!(ctx.check_stopped(), Err(SessionError::Stopped));

        drop(rx);
        assert_eq!(ctx.report(IdrMessage::Goodbye), Err(SessionError::ChannelClosed));
    }
}
