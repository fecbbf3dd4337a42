//! Input resolution: turn a document location into raw bytes.
//!
//! A request names its document by location. `http://` and `https://`
//! locations are downloaded; anything else is read from the local file
//! system. Scanned bills are small (a few MB at most), so the whole body is
//! held in memory. No temp file is needed because the model consumes bytes
//! directly.
//!
//! Every failure here is fatal for the request: without the image there is
//! nothing to extract.

use crate::error::InvoiceError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Raw document bytes plus where they came from (for logging and errors).
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub source: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetch the document at `location`.
pub async fn fetch_document(
    location: &str,
    timeout_secs: u64,
) -> Result<FetchedDocument, InvoiceError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(InvoiceError::InvalidInput {
            input: location.to_string(),
        });
    }

    let bytes = if is_url(location) {
        download_url(location, timeout_secs).await?
    } else {
        read_local(location).await?
    };

    if bytes.is_empty() {
        return Err(InvoiceError::EmptyDocument {
            source_name: location.to_string(),
        });
    }

    Ok(FetchedDocument {
        source: location.to_string(),
        bytes,
    })
}

/// Read a local file, mapping I/O failures to typed errors.
async fn read_local(path_str: &str) -> Result<Vec<u8>, InvoiceError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(InvoiceError::PermissionDenied { path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(InvoiceError::FileNotFound { path })
        }
        Err(e) => Err(InvoiceError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, InvoiceError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InvoiceError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let timeout_or_failed = |e: reqwest::Error| {
        if e.is_timeout() {
            InvoiceError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InvoiceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(timeout_or_failed)?;

    if !response.status().is_success() {
        return Err(InvoiceError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(timeout_or_failed)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/bill.png"));
        assert!(is_url("http://example.com/bill.png"));
        assert!(!is_url("/tmp/bill.png"));
        assert!(!is_url("bill.png"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn blank_location_is_invalid() {
        let err = fetch_document("   ", 5).await.unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = fetch_document("/definitely/not/a/real/bill.png", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"\x89PNG fake").unwrap();
        let doc = fetch_document(tmp.path().to_str().unwrap(), 5)
            .await
            .unwrap();
        assert_eq!(doc.bytes, b"\x89PNG fake");
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = fetch_document(tmp.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::EmptyDocument { .. }));
    }
}
