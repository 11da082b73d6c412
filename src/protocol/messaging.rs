//! Session Messaging.
//!
//! Defines what a privacy-peer session reports back to the input peer's
//! controller. Sessions talk to the privacy peers on their own; the controller
//! only ever sees these summaries.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::dataset::NO_EXPORT;

/// Network identifier of a privacy peer. Ordering is the peers' canonical order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Best route of one domain towards the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub as_path_length: i64,
    pub next_hop: i64,
}

impl Route {
    /// "No route" sentinel.
    pub const NONE: Route = Route {
        as_path_length: NO_EXPORT,
        next_hop: NO_EXPORT,
    };
}

/// Routing decision for every node, in dataset order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FinalResult {
    routes: Vec<Route>,
}

impl FinalResult {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Route of node `index`, or [`Route::NONE`] when the result does not cover it.
    pub fn route(&self, index: usize) -> Route {
        self.routes.get(index).copied().unwrap_or(Route::NONE)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Messages a session forwards to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdrMessage {
    Hello,
    InitialSharesAck,
    Goodbye,
    /// The privacy peers' output, if this session obtained one.
    FinalResult(Option<FinalResult>),
    /// Stand-in for a final result when a session cannot produce one.
    Dummy,
}

/// Discriminant of [`IdrMessage`], for error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Hello,
    InitialSharesAck,
    Goodbye,
    FinalResult,
    Dummy,
}

impl IdrMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            IdrMessage::Hello => MessageKind::Hello,
            IdrMessage::InitialSharesAck => MessageKind::InitialSharesAck,
            IdrMessage::Goodbye => MessageKind::Goodbye,
            IdrMessage::FinalResult(_) => MessageKind::FinalResult,
            IdrMessage::Dummy => MessageKind::Dummy,
        }
    }

    /// Dummy messages count as a final result without payload.
    pub fn into_final_result(self) -> Option<Option<FinalResult>> {
        match self {
            IdrMessage::FinalResult(result) => Some(result),
            IdrMessage::Dummy => Some(None),
            _ => None,
        }
    }
}

/// An [`IdrMessage`] with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub sender: PeerId,
    pub peer_index: usize,
    pub time_slot: u32,
    pub message: IdrMessage,
}

impl SessionMessage {
    pub fn new(sender: PeerId, peer_index: usize, time_slot: u32, message: IdrMessage) -> Self {
        Self {
            sender,
            peer_index,
            time_slot,
            message,
        }
    }
}
