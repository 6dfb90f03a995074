use std::path::Path;

use super::config::Config;
use super::error::ExtractError;
use super::naming::TableId;
use super::tdms::{TdmsChannel, TdmsFile, TdmsGroup};

/// Which channel of the selected group holds the samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSelector {
    First,
    Named(String),
}

/// The result of reading one recording
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub logical_name: TableId,
    pub samples: Vec<f64>,
}

/// Turns a recording on disk into its logical name and sample sequence. Read only.
pub trait ChannelExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Extracted, ExtractError>;
}

/// Extractor for TDMS recordings.
///
/// Selects a group (by name, or the first group) and within it a channel (by name, or the
/// first channel). Samples are returned as stored, in file order, without resampling.
#[derive(Debug, Clone)]
pub struct TdmsExtractor {
    group: Option<String>,
    channel: ChannelSelector,
}

impl TdmsExtractor {
    pub fn new(group: Option<String>, channel: ChannelSelector) -> Self {
        Self { group, channel }
    }

    pub fn from_config(config: &Config) -> Self {
        let channel = match &config.channel_name {
            Some(name) => ChannelSelector::Named(name.clone()),
            None => ChannelSelector::First,
        };
        Self::new(config.group_name.clone(), channel)
    }

    fn select_group<'a>(
        &self,
        file: &'a TdmsFile,
        path: &Path,
    ) -> Result<&'a TdmsGroup, ExtractError> {
        let group = match &self.group {
            Some(name) => file.group(name),
            None => file.groups().first(),
        };
        group.ok_or_else(|| ExtractError::GroupNotFound {
            path: path.to_path_buf(),
            group: self.group.clone().unwrap_or_else(|| String::from("<first>")),
        })
    }

    fn select_channel<'a>(
        &self,
        group: &'a TdmsGroup,
        path: &Path,
    ) -> Result<&'a TdmsChannel, ExtractError> {
        let (channel, wanted) = match &self.channel {
            ChannelSelector::Named(name) => (group.channel(name), name.as_str()),
            ChannelSelector::First => (group.channels().first(), "<first>"),
        };
        channel.ok_or_else(|| ExtractError::ChannelNotFound {
            path: path.to_path_buf(),
            group: group.name().to_string(),
            channel: wanted.to_string(),
        })
    }
}

impl ChannelExtractor for TdmsExtractor {
    fn extract(&self, path: &Path) -> Result<Extracted, ExtractError> {
        let logical_name =
            TableId::from_path(path).map_err(|e| ExtractError::BadName(path.to_path_buf(), e))?;
        let file = TdmsFile::open(path)
            .map_err(|e| ExtractError::UnreadableFile(path.to_path_buf(), e))?;
        let group = self.select_group(&file, path)?;
        let channel = self.select_channel(group, path)?;
        let samples = channel
            .values()
            .ok_or_else(|| ExtractError::NonNumericChannel {
                path: path.to_path_buf(),
                channel: channel.name().to_string(),
            })?
            .to_vec();
        Ok(Extracted {
            logical_name,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tdms::testing::write_recording;

    #[test]
    fn test_extract_named_channel_in_first_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("10hz.tdms");
        write_recording(
            &path,
            "Untitled",
            &[("x", &[9.0]), ("accelerationgroup", &[0.1, 0.2, 0.3])],
        );
        let extractor =
            TdmsExtractor::new(None, ChannelSelector::Named(String::from("accelerationgroup")));
        let extracted = extractor.extract(&path).unwrap();
        assert_eq!(extracted.logical_name.as_str(), "10hz");
        assert_eq!(extracted.samples, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_extract_first_channel_in_named_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("5hz.tdms");
        write_recording(&path, "accelerationgroup", &[("z", &[1.5, -2.5])]);
        let extractor = TdmsExtractor::new(
            Some(String::from("accelerationgroup")),
            ChannelSelector::First,
        );
        assert_eq!(extractor.extract(&path).unwrap().samples, vec![1.5, -2.5]);
    }

    #[test]
    fn test_missing_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("10hz.tdms");
        write_recording(&path, "g", &[("x", &[1.0])]);
        let extractor = TdmsExtractor::new(None, ChannelSelector::Named(String::from("z")));
        assert!(matches!(
            extractor.extract(&path),
            Err(ExtractError::ChannelNotFound { .. })
        ));
        let extractor = TdmsExtractor::new(Some(String::from("other")), ChannelSelector::First);
        assert!(matches!(
            extractor.extract(&path),
            Err(ExtractError::GroupNotFound { .. })
        ));
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tdms");
        std::fs::write(&path, b"definitely not a recording").unwrap();
        let extractor = TdmsExtractor::new(None, ChannelSelector::First);
        assert!(matches!(
            extractor.extract(&path),
            Err(ExtractError::UnreadableFile(..))
        ));
        assert!(matches!(
            extractor.extract(&dir.path().join("gone.tdms")),
            Err(ExtractError::UnreadableFile(..))
        ));
    }
}
