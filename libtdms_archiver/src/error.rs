use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TdmsError {
    #[error("TdmsFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not open TdmsFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Incorrect lead-in tag {0:?} found in TdmsFile segment at offset {1}; expected \"TDSm\"")]
    BadTag([u8; 4], u64),
    #[error("Unsupported TDMS version {0} found in segment at offset {1}")]
    BadVersion(u32, u64),
    #[error("Unknown TDMS data type code {0:#x}")]
    UnknownDataType(u32),
    #[error("TdmsFile uses an unsupported layout: {0}")]
    Unsupported(String),
    #[error("TdmsFile object path {0:?} is malformed")]
    BadObjectPath(String),
    #[error("TdmsFile string was not valid UTF-8: {0}")]
    BadString(#[from] std::string::FromUtf8Error),
    #[error("TdmsFile segment at offset {0} is truncated")]
    Truncated(u64),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Could not read recording {0:?}: {1}")]
    UnreadableFile(PathBuf, TdmsError),
    #[error("Recording {path:?} has no group {group:?}")]
    GroupNotFound { path: PathBuf, group: String },
    #[error("Recording {path:?} has no channel {channel:?} in group {group:?}")]
    ChannelNotFound {
        path: PathBuf,
        group: String,
        channel: String,
    },
    #[error("Channel {channel:?} in recording {path:?} does not hold numeric data")]
    NonNumericChannel { path: PathBuf, channel: String },
    #[error("Could not derive a table name from recording {0:?}: {1}")]
    BadName(PathBuf, NamingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("Table identifier is empty")]
    Empty,
    #[error("Table identifier {0:?} contains a comma or line break")]
    ForbiddenCharacter(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Store failed to read workbook: {0}")]
    WorkbookRead(#[from] calamine::Error),
    #[error("Store failed to write workbook: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),
    #[error("Store failed due to HTTP transport error: {0}")]
    Transport(String),
    #[error("Store request failed with HTTP status {0}: {1}")]
    Status(u16, String),
    #[error("Store failed to parse JSON: {0}")]
    ParsingError(#[from] serde_json::Error),
    #[error("Store received a malformed response: {0}")]
    BadResponse(String),
    #[error("Store found a malformed cell: {0}")]
    BadCell(String),
    #[error("Store endpoint is not a valid URL: {0}")]
    BadEndpoint(#[from] url::ParseError),
    #[error("Table {0:?} cannot be used as a sheet name: {1}")]
    BadSheetName(String, String),
    #[error("Table {0:?} does not exist")]
    MissingTable(String),
    #[error("Table {0:?} already exists")]
    TableExists(String),
    #[error("Store session has been closed")]
    Closed,
}

impl From<ureq::Error> for StoreError {
    fn from(value: ureq::Error) -> Self {
        match value {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                Self::Status(code, body)
            }
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Merging into table {table:?} failed: {source}")]
    MergeFailed {
        table: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to persist processed record to {0:?}: {1}")]
    TrackerPersistFailed(PathBuf, std::io::Error),
    #[error("Failed to load processed record from {0:?}: {1}")]
    LoadFailed(PathBuf, std::io::Error),
    #[error("Identifier {0:?} cannot be recorded: {1}")]
    BadIdentifier(String, NamingError),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Upload failed due to HTTP transport error: {0}")]
    Transport(String),
    #[error("Upload request failed with HTTP status {0}: {1}")]
    Status(u16, String),
    #[error("Upload received a malformed response: {0}")]
    BadResponse(String),
    #[error("Upload endpoint is not a valid URL: {0}")]
    BadEndpoint(#[from] url::ParseError),
}

impl From<ureq::Error> for UploadError {
    fn from(value: ureq::Error) -> Self {
        match value {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                Self::Status(code, body)
            }
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

/// Failure of a single file's pipeline. Never escapes the cycle that produced it.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Extract(#[from] ExtractError),
    #[error("{0}")]
    Merge(#[from] MergeError),
    #[error("{0}")]
    Commit(#[from] TrackerError),
}

impl IngestError {
    /// Short failure kind used in log lines and cycle reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extract(ExtractError::UnreadableFile(..)) => "UnreadableFile",
            Self::Extract(ExtractError::GroupNotFound { .. })
            | Self::Extract(ExtractError::ChannelNotFound { .. }) => "ChannelNotFound",
            Self::Extract(ExtractError::NonNumericChannel { .. }) => "NonNumericChannel",
            Self::Extract(ExtractError::BadName(..)) => "BadName",
            Self::Merge(_) => "MergeFailed",
            Self::Commit(_) => "TrackerPersistFailed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Watch directory {0:?} does not exist or is not a directory")]
    BadWatchPath(PathBuf),
    #[error("Number of threads must be at least 1, found {0}")]
    BadThreadCount(i32),
    #[error("Environment variable {0} holding the access token is not set")]
    MissingCredentials(String),
    #[error("Upload is only available when the store is a local workbook")]
    UploadWithoutWorkbook,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Monitor failed due to tracker error: {0}")]
    TrackerError(#[from] TrackerError),
    #[error("Monitor failed due to store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Monitor failed due to upload error: {0}")]
    UploadError(#[from] UploadError),
    #[error("Monitor could not read watch directory {0:?}: {1}")]
    BadWatchPath(PathBuf, std::io::Error),
}
