use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::TrackerError;
use super::naming::TableId;
use super::source_file::{Signature, SourceFile};

/// The processed record: identifier -> signature of the version last merged successfully.
///
/// Persisted as plain text, one `identifier,signature` line per entry. Identifiers cannot hold
/// commas (see [`TableId`]), so no escaping is needed. Every commit rewrites the whole file
/// through a temporary sibling and a rename, so a reader never sees a half written record.
#[derive(Debug)]
pub struct ProcessedTracker {
    path: PathBuf,
    record: BTreeMap<TableId, Signature>,
}

impl ProcessedTracker {
    /// Load the record at path. A missing file is the normal first start and yields an empty
    /// record; malformed lines are logged and dropped, so their files get ingested again.
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let mut record = BTreeMap::new();
        if !path.exists() {
            spdlog::info!(
                "No processed record at {}, starting from scratch",
                path.display()
            );
            return Ok(Self {
                path: path.to_path_buf(),
                record,
            });
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::LoadFailed(path.to_path_buf(), e))?;
        for (line_number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((id, signature)) => {
                    record.insert(id, signature);
                }
                None => spdlog::warn!(
                    "Ignoring malformed line {} in processed record {}: {:?}",
                    line_number + 1,
                    path.display(),
                    line
                ),
            }
        }
        spdlog::info!(
            "Loaded {} processed entries from {}",
            record.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            record,
        })
    }

    /// The files that are new or whose signature differs from the recorded one
    pub fn diff<'a>(&self, current: &'a [SourceFile]) -> Vec<&'a SourceFile> {
        current
            .iter()
            .filter(|file| self.record.get(&file.id) != Some(&file.signature))
            .collect()
    }

    /// Record a successful merge and persist the full record immediately.
    ///
    /// If persisting fails the in-memory entry is rolled back, so the file is offered again on
    /// the next cycle.
    pub fn commit(&mut self, id: &TableId, signature: Signature) -> Result<(), TrackerError> {
        let previous = self.record.insert(id.clone(), signature);
        if let Err(e) = self.persist() {
            match previous {
                Some(sig) => self.record.insert(id.clone(), sig),
                None => self.record.remove(id),
            };
            return Err(TrackerError::TrackerPersistFailed(self.path.clone(), e));
        }
        Ok(())
    }

    pub fn get(&self, id: &TableId) -> Option<Signature> {
        self.record.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> std::io::Result<()> {
        let mut contents = String::new();
        for (id, signature) in self.record.iter() {
            contents.push_str(&format!("{id},{signature}\n"));
        }

        let tmp_path = temporary_sibling(&self.path);
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, &self.path)
    }
}

fn parse_line(line: &str) -> Option<(TableId, Signature)> {
    let (id, signature) = line.rsplit_once(',')?;
    Some((TableId::new(id).ok()?, signature.parse().ok()?))
}

/// `dir/name` -> `dir/.name.tmp`
pub(crate) fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
