//! Round output artifacts.
//!
//! Each completed round produces `<folder>/idr_output__round<NNN>.txt` with
//! one block per node:
//!
//! ```text
//! Route for domain 100:
//! AS_PATH Length: 1
//! NextHop: 200
//! ```
//!
//! # Security
//! - Files are written atomically (write-sync-rename).

use alloc::string::String;
use core::fmt::{self, Write as _};

use crate::dataset::Node;
use crate::protocol::messaging::FinalResult;

#[cfg(feature = "std")]
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    InvalidPath,
    IoError(String),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::InvalidPath => write!(f, "Invalid output path"),
            OutputError::IoError(e) => write!(f, "Output I/O error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OutputError {}

#[cfg(feature = "std")]
impl From<std::io::Error> for OutputError {
    fn from(e: std::io::Error) -> Self {
        OutputError::IoError(e.to_string())
    }
}

/// File name of the artifact for `time_slot`.
pub fn artifact_name(time_slot: u32) -> String {
    alloc::format!("idr_output__round{:03}.txt", time_slot)
}

#[cfg(feature = "std")]
pub fn artifact_path<P: AsRef<Path>>(folder: P, time_slot: u32) -> PathBuf {
    folder.as_ref().join(artifact_name(time_slot))
}

/// Renders the routing decision of every node. Nodes the result does not
/// cover show `-1`.
pub fn render(nodes: &[Node], result: &FinalResult) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        let route = result.route(i);
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "Route for domain {}:\nAS_PATH Length: {}\nNextHop: {}\n\n",
            node.id, route.as_path_length, route.next_hop
        );
    }
    out
}

/// Writes data to a file atomically.
#[cfg(feature = "std")]
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), OutputError> {
    use std::fs::{self, File};
    use std::io::Write;

    let path = path.as_ref();
    let dir = path.parent().ok_or(OutputError::InvalidPath)?;
    let filename = path.file_name().ok_or(OutputError::InvalidPath)?;
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }

    let mut temp_path = dir.to_path_buf();
    temp_path.push(format!("{}.tmp", filename.to_string_lossy()));

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    // Rename to final path (atomic on POSIX)
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Renders and writes the artifact for one round, returning its path and text.
#[cfg(feature = "std")]
pub fn write_round<P: AsRef<Path>>(
    folder: P,
    time_slot: u32,
    nodes: &[Node],
    result: &FinalResult,
) -> Result<(PathBuf, String), OutputError> {
    let path = artifact_path(folder, time_slot);
    let text = render(nodes, result);
    write_atomic(&path, text.as_bytes())?;
    log::info!("Wrote round output {}", path.display());
    Ok((path, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ClassificationLists, ExportMatrix};
    use crate::protocol::messaging::Route;
    use alloc::vec;
    use alloc::vec::Vec;

    fn node(id: i64) -> Node {
        Node {
            id,
            is_isp: false,
            is_destination: false,
            neighbors: Vec::new(),
            topology_neighbors: Vec::new(),
            classification: ClassificationLists::default(),
            exports: ExportMatrix::zeroed(0),
        }
    }

    #[test]
    fn test_artifact_name_is_zero_padded() {
        assert_eq!(artifact_name(1), "idr_output__round001.txt");
        assert_eq!(artifact_name(42), "idr_output__round042.txt");
        assert_eq!(artifact_name(1234), "idr_output__round1234.txt");
    }

    #[test]
    fn test_render_blocks() {
        let result = FinalResult::new(vec![Route { as_path_length: 1, next_hop: 200 }]);
        let text = render(&[node(100), node(200)], &result);
        assert_eq!(
            text,
            "Route for domain 100:\nAS_PATH Length: 1\nNextHop: 200\n\n\
             Route for domain 200:\nAS_PATH Length: -1\nNextHop: -1\n\n"
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_write_round_creates_folder() {
        let dir = std::env::temp_dir().join(format!("idr_output_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let (path, text) = write_round(&dir, 3, &[node(7)], &FinalResult::default()).unwrap();
        assert_eq!(path, dir.join("idr_output__round003.txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
        assert!(!dir.join("idr_output__round003.txt.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
