//! Private routing dataset.
//!
//! One [`TopologyDataset`] is loaded per round from two key/value sources:
//!
//! - **private data**: `nitems`, `Destination`, and per node `i` (1-based)
//!   `{i}_peerID`, `{i}_peerType`, `{i}_customers`, `{i}_peers`,
//!   `{i}_providers`, plus `{i}_{h}` holding the export policy towards
//!   neighbor `h` for ISP nodes.
//! - **topology**: one key per node identifier listing its neighbors.
//!
//! The sorted union of a node's customer/peer/provider lists is the node's
//! canonical neighbor ordering. Every share array built for the node is indexed
//! by it, so it must not be reordered after load.

pub mod properties;
pub mod tokens;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use alloc::format;
use core::fmt;

pub use properties::Properties;
pub use tokens::NO_EXPORT;

use tokens::{parse_export_row, parse_id_list, parse_tolerant};

pub const PROP_N_ITEMS: &str = "nitems";
pub const PROP_DESTINATION: &str = "Destination";
pub const PROP_PEER_ID: &str = "peerID";
pub const PROP_TYPE: &str = "peerType";
pub const PROP_CUSTOMERS: &str = "customers";
pub const PROP_PEERS: &str = "peers";
pub const PROP_PROVIDERS: &str = "providers";

/// Errors raised while loading a round's dataset. All are fatal for the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// A source could not be read (path and reason).
    Unreadable(String),
    /// A mandatory key is absent.
    MissingKey(String),
    /// A mandatory key holds something that is not a number.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Unreadable(reason) => write!(f, "Cannot read source: {}", reason),
            DatasetError::MissingKey(key) => write!(f, "Missing key '{}'", key),
            DatasetError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for key '{}'", value, key)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DatasetError {}

/// Business relationship of a neighbor, in classification scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NeighborClass {
    Customer = 0,
    Peer = 1,
    Provider = 2,
}

impl NeighborClass {
    pub const ALL: [NeighborClass; 3] = [NeighborClass::Customer, NeighborClass::Peer, NeighborClass::Provider];

    pub fn index(self) -> i64 {
        self as i64
    }
}

/// A node's customer, peer and provider lists as read from the private data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationLists {
    pub customers: Vec<i64>,
    pub peers: Vec<i64>,
    pub providers: Vec<i64>,
}

impl ClassificationLists {
    pub fn get(&self, class: NeighborClass) -> &[i64] {
        match class {
            NeighborClass::Customer => &self.customers,
            NeighborClass::Peer => &self.peers,
            NeighborClass::Provider => &self.providers,
        }
    }

    /// Class of `neighbor`, scanning customers, then peers, then providers.
    ///
    /// A neighbor listed in several classes takes the first one found.
    pub fn class_of(&self, neighbor: i64) -> Option<NeighborClass> {
        NeighborClass::ALL
            .into_iter()
            .find(|&class| self.get(class).contains(&neighbor))
    }

    /// Sorted, duplicate-free union of the three lists.
    pub fn sorted_union(&self) -> Vec<i64> {
        let mut all: Vec<i64> = self
            .customers
            .iter()
            .chain(self.peers.iter())
            .chain(self.providers.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    /// Neighbors that appear in more than one list.
    pub fn overlapping(&self) -> Vec<i64> {
        let mut overlaps: Vec<i64> = self
            .sorted_union()
            .into_iter()
            .filter(|id| NeighborClass::ALL.iter().filter(|&&c| self.get(c).contains(id)).count() > 1)
            .collect();
        overlaps.dedup();
        overlaps
    }
}

/// Square export matrix of one node, indexed by its canonical neighbor order.
///
/// `row(j)` lists which neighbors may be routed to through neighbor `j`,
/// padded with [`NO_EXPORT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMatrix {
    rows: Vec<Vec<i64>>,
}

impl ExportMatrix {
    /// All-zero matrix used for nodes without an export policy.
    pub fn zeroed(width: usize) -> Self {
        Self {
            rows: (0..width).map(|_| alloc::vec![0; width]).collect(),
        }
    }

    /// Builds the matrix of an ISP from its per-neighbor policy strings.
    pub fn from_policies<'a, I>(policies: I, width: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let rows: Vec<Vec<i64>> = policies
            .into_iter()
            .map(|policy| parse_export_row(policy, width))
            .collect();
        debug_assert_eq!(rows.len(), width);
        Self { rows }
    }

    pub fn width(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[i64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i64]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// One routing domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: i64,
    pub is_isp: bool,
    pub is_destination: bool,
    /// Canonical neighbor ordering (sorted union of the classification lists).
    pub neighbors: Vec<i64>,
    /// Neighbors as listed by the topology source; may contain [`NO_EXPORT`].
    pub topology_neighbors: Vec<i64>,
    pub classification: ClassificationLists,
    pub exports: ExportMatrix,
}

impl Node {
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }
}

/// The input peer's private data for one time slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyDataset {
    destination: i64,
    nodes: Vec<Node>,
}

impl TopologyDataset {
    /// Reads both sources from disk. Either one being unreadable fails the load.
    #[cfg(feature = "std")]
    pub fn load<P, Q>(private_data: P, topology: Q) -> Result<Self, DatasetError>
    where
        P: AsRef<std::path::Path>,
        Q: AsRef<std::path::Path>,
    {
        let private_props = Properties::load(private_data)?;
        let topology_props = Properties::load(topology)?;
        Self::from_properties(&private_props, &topology_props)
    }

    /// Builds the dataset from already parsed sources.
    pub fn from_properties(private_data: &Properties, topology: &Properties) -> Result<Self, DatasetError> {
        let mut dataset = Self::read_private_data(private_data)?;
        dataset.attach_topology(topology);
        log::info!(
            "Loaded routing data: {} nodes, destination {}, {} ISPs",
            dataset.nodes.len(),
            dataset.destination,
            dataset.nodes.iter().filter(|n| n.is_isp).count()
        );
        Ok(dataset)
    }

    fn read_private_data(props: &Properties) -> Result<Self, DatasetError> {
        let node_count: usize = required(props, PROP_N_ITEMS)?;
        let destination: i64 = required(props, PROP_DESTINATION)?;

        let mut nodes = Vec::new();
        for i in 1..=node_count {
            let prefix = format!("{}_", i);
            let id: i64 = required(props, &format!("{}{}", prefix, PROP_PEER_ID))?;
            let type_key = format!("{}{}", prefix, PROP_TYPE);
            let is_isp = props
                .get(&type_key)
                .ok_or(DatasetError::MissingKey(type_key.clone()))?
                == "1";

            let classification = ClassificationLists {
                customers: parse_id_list(props.get_or(&format!("{}{}", prefix, PROP_CUSTOMERS), "")),
                peers: parse_id_list(props.get_or(&format!("{}{}", prefix, PROP_PEERS), "")),
                providers: parse_id_list(props.get_or(&format!("{}{}", prefix, PROP_PROVIDERS), "")),
            };
            let overlaps = classification.overlapping();
            if !overlaps.is_empty() {
                log::warn!(
                    "Node {} lists neighbors {:?} in more than one class; first class wins",
                    id,
                    overlaps
                );
            }

            let neighbors = classification.sorted_union();
            let exports = if is_isp {
                let policy_keys: Vec<String> = neighbors.iter().map(|h| format!("{}{}", prefix, h)).collect();
                ExportMatrix::from_policies(policy_keys.iter().map(|k| props.get_or(k, "")), neighbors.len())
            } else {
                ExportMatrix::zeroed(neighbors.len())
            };

            nodes.push(Node {
                id,
                is_isp,
                is_destination: id == destination,
                neighbors,
                topology_neighbors: Vec::new(),
                classification,
                exports,
            });
        }

        Ok(Self { destination, nodes })
    }

    fn attach_topology(&mut self, topology: &Properties) {
        for node in self.nodes.iter_mut() {
            node.topology_neighbors = parse_tolerant(topology.get_or(&node.id.to_string(), ""));

            let mut listed: Vec<i64> = node
                .topology_neighbors
                .iter()
                .copied()
                .filter(|&h| h != NO_EXPORT)
                .collect();
            listed.sort_unstable();
            listed.dedup();
            if listed != node.neighbors {
                log::warn!(
                    "Topology for node {} lists {} neighbors, classification covers {}",
                    node.id,
                    listed.len(),
                    node.neighbors.len()
                );
            }
        }
    }

    pub fn destination(&self) -> i64 {
        self.destination
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }
}

fn required<T: core::str::FromStr>(props: &Properties, key: &str) -> Result<T, DatasetError> {
    let raw = props
        .get(key)
        .ok_or_else(|| DatasetError::MissingKey(key.to_string()))?;
    raw.parse::<T>().map_err(|_| DatasetError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample_private() -> Properties {
        Properties::parse(
            "nitems = 2\n\
             Destination = 200\n\
             1_peerID = 100\n\
             1_peerType = 1\n\
             1_customers = 200\n\
             1_peers =\n\
             1_providers =\n\
             1_200 = 200\n\
             2_peerID = 200\n\
             2_peerType = 0\n\
             2_customers =\n\
             2_peers =\n\
             2_providers =\n",
        )
    }

    fn sample_topology() -> Properties {
        Properties::parse("100 = 200\n200 =\n")
    }

    #[test]
    fn test_two_node_dataset() {
        let ds = TopologyDataset::from_properties(&sample_private(), &sample_topology()).unwrap();
        assert_eq!(ds.destination(), 200);
        assert_eq!(ds.node_count(), 2);

        let a = ds.node(0).unwrap();
        assert_eq!(a.id, 100);
        assert!(a.is_isp);
        assert!(!a.is_destination);
        assert_eq!(a.neighbors, vec![200]);
        assert_eq!(a.topology_neighbors, vec![200]);
        assert_eq!(a.exports.width(), 1);
        assert_eq!(a.exports.row(0), Some(&[200][..]));

        let b = ds.node(1).unwrap();
        assert!(b.is_destination);
        assert!(!b.is_isp);
        assert!(b.neighbors.is_empty());
        assert_eq!(b.exports.width(), 0);
    }

    #[test]
    fn test_canonical_order_is_sorted_union() {
        let private = Properties::parse(
            "nitems=1\nDestination=1\n1_peerID=10\n1_peerType=0\n\
             1_customers=9,3\n1_peers=7\n1_providers=1,5\n",
        );
        let ds = TopologyDataset::from_properties(&private, &Properties::new()).unwrap();
        let node = ds.node(0).unwrap();
        assert_eq!(node.neighbors, vec![1, 3, 5, 7, 9]);
        // Non-ISP nodes carry an all-zero square matrix.
        assert_eq!(node.exports.width(), 5);
        assert!(node.exports.rows().all(|r| r.len() == 5 && r.iter().all(|&v| v == 0)));
    }

    #[test]
    fn test_malformed_customer_token_is_dropped() {
        let private = Properties::parse(
            "nitems=1\nDestination=1\n1_peerID=1\n1_peerType=0\n1_customers=5,x,7\n",
        );
        let ds = TopologyDataset::from_properties(&private, &Properties::new()).unwrap();
        let node = ds.node(0).unwrap();
        assert_eq!(node.classification.customers, vec![5, 7]);
        assert!(node.classification.peers.is_empty());
        assert_eq!(node.neighbors, vec![5, 7]);
    }

    #[test]
    fn test_isp_export_rows_are_padded() {
        let private = Properties::parse(
            "nitems=1\nDestination=1\n1_peerID=1\n1_peerType=1\n\
             1_customers=4\n1_peers=6\n1_providers=8\n\
             1_4 = 6,8\n1_6 = oops\n",
        );
        let ds = TopologyDataset::from_properties(&private, &Properties::new()).unwrap();
        let node = ds.node(0).unwrap();
        assert_eq!(node.exports.width(), 3);
        assert_eq!(node.exports.row(0), Some(&[6, 8, NO_EXPORT][..]));
        assert_eq!(node.exports.row(1), Some(&[NO_EXPORT; 3][..]));
        // No policy key for neighbor 8 at all.
        assert_eq!(node.exports.row(2), Some(&[NO_EXPORT; 3][..]));
    }

    #[test]
    fn test_topology_tolerant_parse() {
        let topology = Properties::parse("100 = 200,abc\n");
        let ds = TopologyDataset::from_properties(&sample_private(), &topology).unwrap();
        assert_eq!(ds.node(0).unwrap().topology_neighbors, vec![200, NO_EXPORT]);
        assert!(ds.node(1).unwrap().topology_neighbors.is_empty());
    }

    #[test]
    fn test_first_class_wins() {
        let lists = ClassificationLists {
            customers: vec![3],
            peers: vec![3, 4],
            providers: vec![4, 5],
        };
        assert_eq!(lists.class_of(3), Some(NeighborClass::Customer));
        assert_eq!(lists.class_of(4), Some(NeighborClass::Peer));
        assert_eq!(lists.class_of(5), Some(NeighborClass::Provider));
        assert_eq!(lists.class_of(6), None);
        assert_eq!(lists.overlapping(), vec![3, 4]);
        assert_eq!(lists.sorted_union(), vec![3, 4, 5]);
    }

    #[test]
    fn test_missing_mandatory_keys() {
        let err = TopologyDataset::from_properties(&Properties::new(), &Properties::new()).unwrap_err();
        assert_eq!(err, DatasetError::MissingKey(String::from("nitems")));

        let private = Properties::parse("nitems=two\nDestination=1\n");
        let err = TopologyDataset::from_properties(&private, &Properties::new()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { .. }));

        let private = Properties::parse("nitems=1\nDestination=1\n1_peerID=4\n");
        let err = TopologyDataset::from_properties(&private, &Properties::new()).unwrap_err();
        assert_eq!(err, DatasetError::MissingKey(String::from("1_peerType")));
    }

    #[test]
    fn test_huge_node_count_fails_on_first_missing_node() {
        let private = Properties::parse("nitems=99999999999999999\nDestination=1\n");
        let err = TopologyDataset::from_properties(&private, &Properties::new()).unwrap_err();
        assert_eq!(err, DatasetError::MissingKey(String::from("1_peerID")));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_load_unreadable_source() {
        let dir = std::env::temp_dir().join("idr_dataset_missing");
        let err = TopologyDataset::load(dir.join("nope.txt"), dir.join("nope_topo.txt")).unwrap_err();
        assert!(matches!(err, DatasetError::Unreadable(_)));
    }
}
