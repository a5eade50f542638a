use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::UisError;

/// Source of dataset archives. The UIS bulk download service is the real
/// implementation; tests substitute in-memory archives.
pub trait ArchiveSource: Send + Sync {
    fn fetch(&self, location: &str) -> Result<ZipFolder, UisError>;
}

impl<T: ArchiveSource + ?Sized> ArchiveSource for Arc<T> {
    fn fetch(&self, location: &str) -> Result<ZipFolder, UisError> {
        (**self).fetch(location)
    }
}

/// A downloaded archive held fully in memory. The buffer lives exactly as
/// long as the handle.
#[derive(Debug)]
pub struct ZipFolder {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ZipFolder {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, UisError> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| UisError::Parse(format!("not a valid zip archive: {err}")))?;
        Ok(Self { archive })
    }

    pub fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive.file_names().any(|member| member == name)
    }

    pub fn read_member(&mut self, name: &str) -> Result<Vec<u8>, UisError> {
        if !self.contains(name) {
            return Err(UisError::MemberNotFound {
                member: name.to_string(),
            });
        }
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|err| UisError::Parse(err.to_string()))?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|err| UisError::Parse(err.to_string()))?;
        debug!(member = name, bytes = bytes.len(), "read archive member");
        Ok(bytes)
    }
}

/// Fetches archives over HTTP with the blocking client. Transient failures
/// are not retried here; the caller decides whether to try again.
#[derive(Clone)]
pub struct HttpArchiveSource {
    client: Client,
}

impl HttpArchiveSource {
    pub fn new() -> Result<Self, UisError> {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, UisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("uisr/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UisError::Transfer(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| UisError::Transfer(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ArchiveSource for HttpArchiveSource {
    fn fetch(&self, location: &str) -> Result<ZipFolder, UisError> {
        if location.trim().is_empty() {
            return Err(UisError::InvalidQuery(
                "archive location must not be empty".to_string(),
            ));
        }
        info!(location, "fetching dataset archive");
        let response = self
            .client
            .get(location)
            .send()
            .map_err(|err| UisError::Transfer(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "archive download failed".to_string());
            return Err(UisError::TransferStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| UisError::Transfer(err.to_string()))?;
        info!(location, bytes = bytes.len(), "archive downloaded");
        ZipFolder::from_bytes(bytes.to_vec())
    }
}
