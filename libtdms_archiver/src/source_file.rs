use std::fmt::Display;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use super::naming::TableId;

/// Modification signature of a recording: its mtime in nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature(u128);

impl Signature {
    pub fn from_nanos(nanos: u128) -> Self {
        Self(nanos)
    }

    pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        let modified = metadata.modified()?;
        // Times before the epoch collapse to 0, which still differs from any real signature
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Self(nanos))
    }

    pub fn as_nanos(&self) -> u128 {
        self.0
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Signature {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// A recording discovered in the watch directory during one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: TableId,
    pub signature: Signature,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// List the recordings in a directory.
///
/// Only regular files accepted by `matches` are returned, sorted by path. Entries whose metadata
/// cannot be read or whose name cannot become an identifier are logged and skipped; when two
/// files map to the same identifier, the first one by path wins.
pub fn scan_directory<F>(parent_path: &Path, matches: F) -> std::io::Result<Vec<SourceFile>>
where
    F: Fn(&Path) -> bool,
{
    let mut paths: Vec<PathBuf> = Vec::new();
    for item in parent_path.read_dir()? {
        let item_path = item?.path();
        if item_path.is_file() && matches(&item_path) {
            paths.push(item_path);
        }
    }
    paths.sort();

    let mut file_list: Vec<SourceFile> = Vec::with_capacity(paths.len());
    for path in paths {
        let id = match TableId::from_path(&path) {
            Ok(id) => id,
            Err(e) => {
                spdlog::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if file_list.iter().any(|f| f.id == id) {
            spdlog::warn!(
                "Skipping {}: identifier {} is already used by another file",
                path.display(),
                id
            );
            continue;
        }
        let metadata = match path.metadata() {
            Ok(m) => m,
            Err(e) => {
                spdlog::warn!("Skipping {}: could not read metadata: {}", path.display(), e);
                continue;
            }
        };
        let signature = match Signature::from_metadata(&metadata) {
            Ok(s) => s,
            Err(e) => {
                spdlog::warn!(
                    "Skipping {}: modification time unavailable: {}",
                    path.display(),
                    e
                );
                continue;
            }
        };
        file_list.push(SourceFile {
            id,
            signature,
            size_bytes: metadata.len(),
            path,
        });
    }
    Ok(file_list)
}
