use std::fmt::Display;
use std::path::Path;
use time::OffsetDateTime;

use super::error::NamingError;

/// Prefix used for new columns unless the config says otherwise
pub const DEFAULT_COLUMN_PREFIX: &str = "z-axis";

/// Identifier of a recording and of the table its columns are merged into.
///
/// Derived from the file name alone (extension stripped, surrounding whitespace trimmed),
/// so the same recording maps to the same table no matter which directory it sits in. Commas
/// and line breaks are rejected because identifiers are written verbatim to the processed
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(String);

impl TableId {
    pub fn new(name: &str) -> Result<Self, NamingError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(NamingError::Empty);
        }
        if trimmed.contains([',', '\n', '\r']) {
            return Err(NamingError::ForbiddenCharacter(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derive the identifier from a recording's file name
    pub fn from_path(path: &Path) -> Result<Self, NamingError> {
        match path.file_stem() {
            Some(stem) => Self::new(&stem.to_string_lossy()),
            None => Err(NamingError::Empty),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column name for a column ingested at `now`: `<prefix>-YYYY-MM-DD_HH-MM-SS`.
///
/// Fixed width, so names sort chronologically. Unique per second; collisions inside one
/// table are resolved with [`unique_column_name`].
pub fn column_name(prefix: &str, now: OffsetDateTime) -> String {
    format!(
        "{prefix}-{:04}-{:02}-{:02}_{:02}-{:02}-{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Return `base` if no existing column uses it, otherwise the first free `base-N` (N >= 1)
pub fn unique_column_name<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<&str> = existing.into_iter().collect();
    if !taken.contains(&base) {
        return base.to_string();
    }
    let mut suffix: usize = 1;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}

/// The local wall clock, falling back to UTC when the local offset cannot be determined
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
