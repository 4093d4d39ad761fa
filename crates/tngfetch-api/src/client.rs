//! Blocking TNG API client

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tngfetch_core::http::{DOWNLOAD_TIMEOUT, REQUEST_TIMEOUT};
use tngfetch_core::{SHARED_RUNTIME, http_client};

use crate::error::ApiError;
use crate::snapshot::Snapshot;

/// Public TNG API root.
pub const DEFAULT_BASE_URL: &str = "https://www.tng-project.org/api";

/// Header carrying the user's API key.
const API_KEY_HEADER: &str = "api-key";

/// One page of a paginated collection endpoint.
///
/// Only `results` is read; `count` and `next` are ignored since windows are
/// addressed by explicit offsets.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub results: Vec<Value>,
}

/// Authenticated client for the TNG REST API.
///
/// The key is fixed at construction; an empty key sends unauthenticated
/// requests. No retries happen here, callers decide retry policy.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
}

impl Client {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn simulation_url(&self, simulation: &str) -> String {
        format!("{}/{simulation}/", self.base_url)
    }

    pub fn snapshot_url(&self, simulation: &str, snapshot: u32) -> String {
        format!("{}/{simulation}/snapshots/{snapshot}/", self.base_url)
    }

    pub fn subhalo_url(&self, simulation: &str, snapshot: u32, subhalo: u64) -> String {
        format!(
            "{}/{simulation}/snapshots/{snapshot}/subhalos/{subhalo}/",
            self.base_url
        )
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let rb = http_client().get(url);
        if self.api_key.is_empty() {
            rb
        } else {
            rb.header(API_KEY_HEADER, &self.api_key)
        }
    }

    /// GET `url` and return the body text of a successful response.
    fn get_text(&self, url: &str) -> Result<String, ApiError> {
        log::debug!(
            "GET {url} [thread={}]",
            std::thread::current().name().unwrap_or("main")
        );
        SHARED_RUNTIME.handle().block_on(async {
            let resp = self
                .request(url)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(&e, url))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ApiError::from_status(status.as_u16(), url));
            }
            resp.text().await.map_err(|e| ApiError::from_reqwest(&e, url))
        })
    }

    /// GET `url` and parse the body as JSON.
    pub fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        let body = self.get_text(url)?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("{url}: {e}")))
    }

    /// Simulation-level metadata.
    pub fn simulation(&self, simulation: &str) -> Result<Value, ApiError> {
        self.get_json(&self.simulation_url(simulation))
    }

    /// Resolve a simulation/snapshot pair into its attribute mapping.
    ///
    /// A pair that does not exist upstream yields [`ApiError::NotFound`].
    pub fn resolve(&self, simulation: &str, snapshot: u32) -> Result<Snapshot, ApiError> {
        log::info!("Resolving {simulation} snapshot {snapshot}");
        let url = self.snapshot_url(simulation, snapshot);
        match self.get_json(&url)? {
            Value::Object(attributes) => Ok(Snapshot::new(attributes, url)),
            other => Err(ApiError::Decode(format!(
                "{url}: expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Fetch one page of a paginated collection (`?limit=..&offset=..`).
    pub fn fetch_page(&self, url: &str) -> Result<Page, ApiError> {
        let body = self.get_text(url)?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("{url}: {e}")))
    }

    /// Metadata of a single subhalo.
    pub fn subhalo(&self, simulation: &str, snapshot: u32, subhalo: u64) -> Result<Value, ApiError> {
        self.get_json(&self.subhalo_url(simulation, snapshot, subhalo))
    }

    /// Stream a binary resource to disk.
    ///
    /// If `dest` is an existing directory, or ends in a path separator, the
    /// file name comes from the `content-disposition` header (falling back to
    /// the last URL segment). Missing directories are created. A transfer that
    /// fails midway removes the partial file.
    pub fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, ApiError> {
        log::debug!("Downloading {url}");
        SHARED_RUNTIME.handle().block_on(async {
            let mut resp = self
                .request(url)
                .timeout(DOWNLOAD_TIMEOUT)
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(&e, url))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ApiError::from_status(status.as_u16(), url));
            }

            let target = if is_dir_target(dest) {
                std::fs::create_dir_all(dest).map_err(ApiError::Io)?;
                let name = resp
                    .headers()
                    .get(reqwest::header::CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(disposition_filename)
                    .unwrap_or_else(|| fallback_filename(url));
                dest.join(name)
            } else {
                if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(ApiError::Io)?;
                }
                dest.to_path_buf()
            };

            let mut file = std::fs::File::create(&target).map_err(ApiError::Io)?;
            let streamed = async {
                let mut written = 0u64;
                while let Some(chunk) = resp
                    .chunk()
                    .await
                    .map_err(|e| ApiError::from_reqwest(&e, url))?
                {
                    file.write_all(&chunk).map_err(ApiError::Io)?;
                    written += chunk.len() as u64;
                }
                file.flush().map_err(ApiError::Io)?;
                Ok::<_, ApiError>(written)
            }
            .await;

            match streamed {
                Ok(written) => {
                    log::debug!("{}: {written} bytes", target.display());
                    Ok(target)
                }
                Err(e) => {
                    drop(file);
                    if let Err(rm) = std::fs::remove_file(&target) {
                        log::warn!("Cannot remove partial {}: {rm}", target.display());
                    }
                    Err(e)
                }
            }
        })
    }

    /// Download the particle cutout of a subhalo, or of its parent halo.
    pub fn download_cutout(
        &self,
        simulation: &str,
        snapshot: u32,
        subhalo: u64,
        dest: &Path,
        parent_halo: bool,
    ) -> Result<PathBuf, ApiError> {
        let meta = self.subhalo(simulation, snapshot, subhalo)?;
        let key = if parent_halo { "parent_halo" } else { "subhalo" };
        let url = meta
            .get("cutouts")
            .and_then(|c| c.get(key))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ApiError::Decode(format!(
                    "subhalo {simulation}/{snapshot}/{subhalo} has no cutouts.{key} link"
                ))
            })?;
        log::info!("Downloading {simulation}-{snapshot}-{subhalo} [{url}]");
        self.download(url, dest)
    }
}

/// Whether `dest` names a directory, either existing or spelled with a
/// trailing separator (`cutouts/`).
fn is_dir_target(dest: &Path) -> bool {
    dest.is_dir()
        || dest
            .as_os_str()
            .to_string_lossy()
            .ends_with(['/', std::path::MAIN_SEPARATOR])
}

/// File name from a `content-disposition` value, reduced to its last path component.
pub fn disposition_filename(value: &str) -> Option<String> {
    let raw = value.split("filename=").nth(1)?;
    let raw = raw.split(';').next()?.trim().trim_matches('"');
    let name = Path::new(raw).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_string())
}

fn fallback_filename(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(str::to_string)
        })
        .unwrap_or_else(|| "download.bin".to_string())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let c = Client::new("http://host/api/", "");
        assert_eq!(c.base_url(), "http://host/api");
        assert_eq!(c.simulation_url("TNG50-1"), "http://host/api/TNG50-1/");
        assert_eq!(
            c.snapshot_url("TNG50-1", 99),
            "http://host/api/TNG50-1/snapshots/99/"
        );
        assert_eq!(
            c.subhalo_url("TNG50-1", 99, 7),
            "http://host/api/TNG50-1/snapshots/99/subhalos/7/"
        );
    }

    #[test]
    fn empty_key_is_unauthenticated() {
        assert!(!Client::new(DEFAULT_BASE_URL, "").is_authenticated());
        assert!(Client::new(DEFAULT_BASE_URL, "abc").is_authenticated());
    }

    #[test]
    fn disposition_plain_and_quoted() {
        assert_eq!(
            disposition_filename("attachment; filename=cutout_7.hdf5").as_deref(),
            Some("cutout_7.hdf5")
        );
        assert_eq!(
            disposition_filename("attachment; filename=\"cutout_7.hdf5\"; size=10").as_deref(),
            Some("cutout_7.hdf5")
        );
    }

    #[test]
    fn disposition_strips_directories() {
        assert_eq!(
            disposition_filename("attachment; filename=../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn fallback_uses_last_segment() {
        assert_eq!(
            fallback_filename("http://h/api/TNG50-1/snapshots/99/subhalos/7/cutout.hdf5?x=1"),
            "cutout.hdf5"
        );
        assert_eq!(fallback_filename("http://h/"), "download.bin");
    }

    #[test]
    fn page_ignores_pagination_fields() {
        let page: Page =
            serde_json::from_str(r#"{"count": 6, "next": "http://x/?offset=2", "results": [{"id": 1}]}"#)
                .unwrap();
        assert_eq!(page.results.len(), 1);
        let page: Page = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(page.results.is_empty());
    }
}
