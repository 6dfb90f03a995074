use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::config::{read_token, UploadConfig};
use super::error::{MonitorError, UploadError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);
const MULTIPART_BOUNDARY: &str = "tdms_archiver_upload_boundary";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created { file_id: String },
    Updated { file_id: String },
}

/// Copies a finished local export to a named remote artifact, replacing any previous copy
pub trait Uploader: Send + Sync {
    fn upload(&self, local_path: &Path, remote_name: &str) -> Result<UploadOutcome, UploadError>;
}

/// Upsert-by-name into a Drive v3 compatible file service
#[derive(Debug)]
pub struct DriveUploader {
    agent: ureq::Agent,
    endpoint: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    id: String,
}

impl DriveUploader {
    pub fn new(endpoint: &str, token: &str) -> Result<Self, UploadError> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(UploadError::Transport(format!(
                "endpoint {endpoint} cannot hold a request path"
            )));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(TRANSFER_TIMEOUT)
            .timeout_write(TRANSFER_TIMEOUT)
            .build();
        Ok(Self {
            agent,
            endpoint,
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, MonitorError> {
        let token = read_token(&config.token_env)?;
        Ok(Self::new(&config.endpoint, &token)?)
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn find_by_name(&self, remote_name: &str) -> Result<Option<String>, UploadError> {
        let query = name_query(remote_name);
        let url = self.url(
            &["drive", "v3", "files"],
            &[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id,name)"),
            ],
        );
        let response = self
            .agent
            .get(url.as_str())
            .set("authorization", &self.bearer())
            .call()?;
        let list: FileList = response
            .into_json()
            .map_err(|e| UploadError::BadResponse(e.to_string()))?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    fn update(&self, file_id: &str, mime: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let url = self.url(
            &["upload", "drive", "v3", "files", file_id],
            &[("uploadType", "media"), ("fields", "id")],
        );
        let response = self
            .agent
            .request("PATCH", url.as_str())
            .set("authorization", &self.bearer())
            .set("content-type", mime)
            .send_bytes(bytes)?;
        parse_file_id(response)
    }

    fn create(&self, remote_name: &str, mime: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let url = self.url(
            &["upload", "drive", "v3", "files"],
            &[("uploadType", "multipart"), ("fields", "id")],
        );
        let body = multipart_body(&json!({ "name": remote_name }), mime, bytes);
        let response = self
            .agent
            .post(url.as_str())
            .set("authorization", &self.bearer())
            .set(
                "content-type",
                &format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .send_bytes(&body)?;
        parse_file_id(response)
    }
}

impl Uploader for DriveUploader {
    fn upload(&self, local_path: &Path, remote_name: &str) -> Result<UploadOutcome, UploadError> {
        let bytes = std::fs::read(local_path)?;
        let mime = mime_for(local_path);
        spdlog::info!(
            "Uploading {} ({}) as {}",
            local_path.display(),
            human_bytes::human_bytes(bytes.len() as f64),
            remote_name
        );
        match self.find_by_name(remote_name)? {
            Some(file_id) => {
                let file_id = self.update(&file_id, mime, &bytes)?;
                spdlog::info!("Updated remote file {} ({})", remote_name, file_id);
                Ok(UploadOutcome::Updated { file_id })
            }
            None => {
                let file_id = self.create(remote_name, mime, &bytes)?;
                spdlog::info!("Created remote file {} ({})", remote_name, file_id);
                Ok(UploadOutcome::Created { file_id })
            }
        }
    }
}

fn parse_file_id(response: ureq::Response) -> Result<String, UploadError> {
    let body: Value = response
        .into_json()
        .map_err(|e| UploadError::BadResponse(e.to_string()))?;
    body.get("id")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| UploadError::BadResponse(format!("no file id in {body}")))
}

/// Exact-name search that ignores trashed files. Quotes and backslashes are escaped.
fn name_query(remote_name: &str) -> String {
    let escaped = remote_name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and trashed = false")
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => XLSX_MIME,
        _ => "application/octet-stream",
    }
}

/// multipart/related body: JSON metadata part followed by the media part
fn multipart_body(metadata: &Value, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\ncontent-type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{MULTIPART_BOUNDARY}\r\ncontent-type: {mime}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_query_escapes() {
        assert_eq!(
            name_query("final_data.xlsx"),
            "name = 'final_data.xlsx' and trashed = false"
        );
        assert_eq!(
            name_query("it's\\here"),
            "name = 'it\\'s\\\\here' and trashed = false"
        );
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("out/final_data.XLSX")), XLSX_MIME);
        assert_eq!(mime_for(Path::new("out/data.bin")), "application/octet-stream");
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(&json!({ "name": "a.xlsx" }), XLSX_MIME, b"PK\x03\x04");
        let text = String::from_utf8_lossy(&body);
        let parts: Vec<&str> = text.split(&format!("--{MULTIPART_BOUNDARY}")).collect();
        assert_eq!(parts.len(), 4);
        assert!(parts[1].contains("application/json"));
        assert!(parts[1].contains(r#"{"name":"a.xlsx"}"#));
        assert!(parts[2].contains(XLSX_MIME));
        assert!(parts[2].ends_with("\r\n\r\nPK\x03\x04\r\n"));
        assert_eq!(parts[3], "--\r\n");
    }

    #[test]
    fn test_urls() {
        let uploader = DriveUploader::new("https://files.example.com", "t").unwrap();
        let url = uploader.url(
            &["upload", "drive", "v3", "files", "abc"],
            &[("uploadType", "media")],
        );
        assert_eq!(
            url.as_str(),
            "https://files.example.com/upload/drive/v3/files/abc?uploadType=media"
        );
        assert!(matches!(
            DriveUploader::new("not a url", "t"),
            Err(UploadError::BadEndpoint(_))
        ));
    }
}
