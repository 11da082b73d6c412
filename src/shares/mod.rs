//! Share generation for the input peer.
//!
//! Turns a loaded [`TopologyDataset`] into three aligned share families, each
//! split into one share vector per privacy peer:
//!
//! - **classification** `[node][peer]`: per neighbor `class * M`, or
//!   [`UNCLASSIFIED`] when the neighbor is in no class list.
//! - **export** `[node][row][peer]`: one sharing per export matrix row.
//! - **zero** `[node][peer]`: `M + 1` zeros, used downstream for blinding.
//!
//! All vectors of a node are indexed by its canonical neighbor ordering. The
//! family is regenerated from scratch every round; zero shares in particular
//! must never be reused, since two sharings of the same zeros under related
//! randomness leak through the differences.

use alloc::vec::Vec;
use core::fmt;

use crate::dataset::{ClassificationLists, TopologyDataset};
use crate::mpc::{MpcError, SecretSplitter, ShareVector};

/// Classification of a neighbor found in no list: half of `i32::MAX`, far
/// from any `class * M`.
pub const UNCLASSIFIED: i64 = (i32::MAX / 2) as i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    /// The splitter failed.
    Split(MpcError),
    /// The splitter is configured for a different number of peers.
    PeerCountMismatch { expected: usize, actual: usize },
    /// The splitter returned the wrong number or length of share vectors.
    MalformedSplit,
    /// `M` is zero or too large to keep classes apart from [`UNCLASSIFIED`].
    InvalidMargin(u32),
}

impl fmt::Display for ShareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareError::Split(e) => write!(f, "Secret splitting failed: {}", e),
            ShareError::PeerCountMismatch { expected, actual } => write!(
                f,
                "Splitter configured for {} peers, round has {}",
                actual, expected
            ),
            ShareError::MalformedSplit => write!(f, "Splitter returned malformed share vectors"),
            ShareError::InvalidMargin(m) => write!(f, "Invalid classification margin {}", m),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ShareError {}

impl From<MpcError> for ShareError {
    fn from(err: MpcError) -> Self {
        ShareError::Split(err)
    }
}

/// Checks that `class * M` for every class stays well below [`UNCLASSIFIED`].
pub fn validate_margin(margin: u32) -> Result<(), ShareError> {
    if margin == 0 || 2 * margin as i64 >= UNCLASSIFIED {
        return Err(ShareError::InvalidMargin(margin));
    }
    Ok(())
}

/// Plaintext classification vector over `neighbors`.
///
/// Each neighbor gets `class * margin` for the first class list containing it
/// (customers, then peers, then providers), else [`UNCLASSIFIED`].
pub fn classification_vector(neighbors: &[i64], lists: &ClassificationLists, margin: u32) -> Vec<i64> {
    neighbors
        .iter()
        .map(|&h| match lists.class_of(h) {
            Some(class) => class.index() * margin as i64,
            None => UNCLASSIFIED,
        })
        .collect()
}

/// The shares of one round, for all nodes and all privacy peers.
pub struct ShareFamily {
    peers: usize,
    margin: u32,
    classification: Vec<Vec<ShareVector>>,
    export: Vec<Vec<Vec<ShareVector>>>,
    zero: Vec<Vec<ShareVector>>,
}

impl fmt::Debug for ShareFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareFamily")
            .field("nodes", &self.classification.len())
            .field("peers", &self.peers)
            .field("margin", &self.margin)
            .finish()
    }
}

/// Splits `values` and checks the result has the promised shape.
fn split_checked(
    splitter: &mut dyn SecretSplitter,
    values: &[i64],
    peers: usize,
) -> Result<Vec<ShareVector>, ShareError> {
    let shares = splitter.split(values)?;
    if shares.len() != peers || shares.iter().any(|s| s.len() != values.len()) {
        return Err(ShareError::MalformedSplit);
    }
    Ok(shares)
}

/// Generates the classification, export and zero share families.
///
/// The splitter must already be initialized for `peers` privacy peers.
pub fn generate(
    dataset: &TopologyDataset,
    splitter: &mut dyn SecretSplitter,
    peers: usize,
    margin: u32,
) -> Result<ShareFamily, ShareError> {
    validate_margin(margin)?;
    if splitter.peer_count() != peers {
        return Err(ShareError::PeerCountMismatch {
            expected: peers,
            actual: splitter.peer_count(),
        });
    }
    log::info!(
        "Generating initial shares for {} nodes and {} privacy peers",
        dataset.node_count(),
        peers
    );

    let mut classification = Vec::with_capacity(dataset.node_count());
    let mut export = Vec::with_capacity(dataset.node_count());
    let mut zero = Vec::with_capacity(dataset.node_count());
    let zeros = alloc::vec![0i64; margin as usize + 1];

    for node in dataset.nodes() {
        let classes = classification_vector(&node.neighbors, &node.classification, margin);
        classification.push(split_checked(splitter, &classes, peers)?);

        let rows = node
            .exports
            .rows()
            .map(|row| split_checked(splitter, row, peers))
            .collect::<Result<Vec<_>, _>>()?;
        export.push(rows);

        zero.push(split_checked(splitter, &zeros, peers)?);
    }

    Ok(ShareFamily {
        peers,
        margin,
        classification,
        export,
        zero,
    })
}

impl ShareFamily {
    pub fn node_count(&self) -> usize {
        self.classification.len()
    }

    pub fn peer_count(&self) -> usize {
        self.peers
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    pub fn classification(&self, node: usize, peer: usize) -> Option<&ShareVector> {
        self.classification.get(node)?.get(peer)
    }

    pub fn export(&self, node: usize, row: usize, peer: usize) -> Option<&ShareVector> {
        self.export.get(node)?.get(row)?.get(peer)
    }

    /// Number of export rows shared for `node`.
    pub fn export_rows(&self, node: usize) -> usize {
        self.export.get(node).map_or(0, Vec::len)
    }

    pub fn zero(&self, node: usize, peer: usize) -> Option<&ShareVector> {
        self.zero.get(node)?.get(peer)
    }

    /// Everything one privacy peer receives, by local peer index.
    pub fn for_peer(&self, peer: usize) -> Option<PeerShares> {
        if peer >= self.peers {
            return None;
        }
        Some(PeerShares {
            peer_index: peer,
            classification: self.classification.iter().map(|n| n[peer].clone()).collect(),
            export: self
                .export
                .iter()
                .map(|rows| rows.iter().map(|r| r[peer].clone()).collect())
                .collect(),
            zero: self.zero.iter().map(|n| n[peer].clone()).collect(),
        })
    }
}

/// One privacy peer's slice of a [`ShareFamily`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerShares {
    pub peer_index: usize,
    /// `[node]`, each of the node's neighbor count.
    pub classification: Vec<ShareVector>,
    /// `[node][row]`, each of the node's neighbor count.
    pub export: Vec<Vec<ShareVector>>,
    /// `[node]`, each of length `M + 1`.
    pub zero: Vec<ShareVector>,
}
