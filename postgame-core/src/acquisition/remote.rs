//! Remote catalog protocol
//!
//! The community map host speaks the GitLab v4 REST shape:
//! - `GET {base}/api/v4/projects?search=&page=&per_page=` lists maps, with
//!   the page count in the `x-total-pages` header
//! - `GET {base}/api/v4/projects/{id}/releases` lists downloadable versions
//! - release asset links point at `.zip` or `.tar.gz` archives

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AcquisitionError;

/// Default community map host
pub const DEFAULT_REMOTE_URL: &str = "https://celab.jetfox.ovh";

/// Results per search page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One downloadable version of a community map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    pub download_url: String,
    /// Optional `sha256:<hex>` digest of the archive
    #[serde(default)]
    pub digest: Option<String>,
}

/// One remote community map search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredContentEntry {
    pub remote_id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Remote preview image
    pub preview_url: Option<String>,
    /// Local preview cache file, once fetched
    pub preview_image: Option<PathBuf>,
    /// Newest first
    pub releases: Vec<Release>,
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub entries: Vec<DiscoveredContentEntry>,
    pub page: u32,
    pub total_pages: u32,
}

/// Bytes received so far; `bytes_total` is 0 when the server gives no size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_total: u64,
    pub bytes_downloaded: u64,
}

impl DownloadProgress {
    /// Completion ratio, if the total is known
    pub fn fraction(&self) -> Option<f64> {
        (self.bytes_total > 0).then(|| self.bytes_downloaded as f64 / self.bytes_total as f64)
    }
}

pub type ProgressCallback<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// Trait for community map sources
///
/// Implementations do their own timeouts. None of these calls can be
/// cancelled; superseded searches are discarded by the caller.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Search one page (1-based)
    async fn search(&self, query: &str, page: u32) -> Result<SearchPage, AcquisitionError>;

    /// Download a release archive, reporting progress as chunks arrive
    async fn download(
        &self,
        release: &Release,
        progress: ProgressCallback<'_>,
    ) -> Result<Vec<u8>, AcquisitionError>;

    /// Download a preview image
    async fn fetch_preview(&self, url: &str) -> Result<Vec<u8>, AcquisitionError>;

    /// Identifier for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct ProjectDto {
    id: u64,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    namespace: Option<NamespaceDto>,
}

#[derive(Debug, Deserialize)]
struct NamespaceDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseDto {
    tag_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    assets: AssetsDto,
}

#[derive(Debug, Default, Deserialize)]
struct AssetsDto {
    #[serde(default)]
    links: Vec<LinkDto>,
}

#[derive(Debug, Deserialize)]
struct LinkDto {
    name: String,
    url: String,
    #[serde(default)]
    direct_asset_url: Option<String>,
}

fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".zip") || lower.ends_with(".tar.gz") || lower.ends_with(".tgz")
}

/// Pull a `sha256:<hex>` token out of free-form release notes
fn digest_from_notes(notes: &str) -> Option<String> {
    notes
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| c == '`' || c == ',' || c == '.'))
        .find(|word| {
            word.strip_prefix("sha256:")
                .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        })
        .map(str::to_string)
}

impl ReleaseDto {
    fn into_release(self) -> Option<Release> {
        let link = self
            .assets
            .links
            .iter()
            .find(|link| is_archive_name(&link.name))
            .or_else(|| self.assets.links.first())?;

        Some(Release {
            version: self.tag_name.clone(),
            download_url: link.direct_asset_url.clone().unwrap_or_else(|| link.url.clone()),
            digest: self.description.as_deref().and_then(digest_from_notes),
        })
    }
}

/// HTTP client for a GitLab-style community map host
pub struct HttpRemoteCatalog {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl HttpRemoteCatalog {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("postgame/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, AcquisitionError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AcquisitionError::Network {
                message: format!("HTTP {} for {}", response.status(), url),
            });
        }
        Ok(response)
    }

    async fn releases(&self, project_id: u64) -> Result<Vec<Release>, AcquisitionError> {
        let url = format!("{}/api/v4/projects/{}/releases", self.base_url, project_id);
        let releases: Vec<ReleaseDto> = self.get(&url).await?.json().await?;
        Ok(releases.into_iter().filter_map(ReleaseDto::into_release).collect())
    }
}

#[async_trait]
impl RemoteCatalog for HttpRemoteCatalog {
    async fn search(&self, query: &str, page: u32) -> Result<SearchPage, AcquisitionError> {
        let page = page.max(1);
        let url = format!("{}/api/v4/projects", self.base_url);
        tracing::debug!("Searching {} for {:?} (page {})", url, query, page);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("search", query.to_string()),
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AcquisitionError::Network {
                message: format!("HTTP {} for {}", response.status(), url),
            });
        }

        let total_pages = response
            .headers()
            .get("x-total-pages")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(page);

        let projects: Vec<ProjectDto> = response.json().await?;

        // Release lists for the whole page are fetched concurrently
        let release_lists = join_all(projects.iter().map(|p| self.releases(p.id))).await;

        let entries = projects
            .into_iter()
            .zip(release_lists)
            .map(|(project, releases)| {
                let releases = releases.unwrap_or_else(|e| {
                    tracing::warn!("Failed to list releases for {}: {}", project.name, e);
                    Vec::new()
                });
                DiscoveredContentEntry {
                    remote_id: project.id.to_string(),
                    title: project.name,
                    author: project.namespace.map(|n| n.name).unwrap_or_default(),
                    description: project.description.unwrap_or_default(),
                    preview_url: project.avatar_url,
                    preview_image: None,
                    releases,
                }
            })
            .collect();

        Ok(SearchPage {
            entries,
            page,
            total_pages: total_pages.max(page),
        })
    }

    async fn download(
        &self,
        release: &Release,
        progress: ProgressCallback<'_>,
    ) -> Result<Vec<u8>, AcquisitionError> {
        tracing::info!("Downloading {} from {}", release.version, release.download_url);

        let mut response = self.get(&release.download_url).await?;
        let mut state = DownloadProgress {
            bytes_total: response.content_length().unwrap_or(0),
            bytes_downloaded: 0,
        };
        progress(state);

        let mut bytes = Vec::with_capacity(state.bytes_total.min(64 * 1024 * 1024) as usize);
        while let Some(chunk) = response.chunk().await? {
            bytes.extend_from_slice(&chunk);
            state.bytes_downloaded = bytes.len() as u64;
            progress(state);
        }

        Ok(bytes)
    }

    async fn fetch_preview(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let bytes = self.get(url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "gitlab"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_prefers_archive_links() {
        let json = r#"{
            "tag_name": "v1.2",
            "description": "Fixed spawn points. Checksum: sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "assets": { "links": [
                { "name": "screenshot.png", "url": "https://x/screenshot.png" },
                { "name": "map.zip", "url": "https://x/map.zip", "direct_asset_url": "https://x/direct/map.zip" }
            ]}
        }"#;
        let dto: ReleaseDto = serde_json::from_str(json).unwrap();
        let release = dto.into_release().unwrap();
        assert_eq!(release.version, "v1.2");
        assert_eq!(release.download_url, "https://x/direct/map.zip");
        assert_eq!(
            release.digest.as_deref(),
            Some("sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
    }

    #[test]
    fn test_release_without_links_is_skipped() {
        let dto: ReleaseDto = serde_json::from_str(r#"{ "tag_name": "v1" }"#).unwrap();
        assert!(dto.into_release().is_none());
    }

    #[test]
    fn test_project_parsing() {
        let json = r#"[{ "id": 42, "name": "Obstacle Course", "description": null,
                        "avatar_url": "https://x/a.jpg", "namespace": { "name": "mapper" } }]"#;
        let projects: Vec<ProjectDto> = serde_json::from_str(json).unwrap();
        assert_eq!(projects[0].id, 42);
        assert_eq!(projects[0].namespace.as_ref().unwrap().name, "mapper");
    }

    #[test]
    fn test_progress_fraction() {
        let unknown = DownloadProgress {
            bytes_total: 0,
            bytes_downloaded: 10,
        };
        assert_eq!(unknown.fraction(), None);
        let half = DownloadProgress {
            bytes_total: 10,
            bytes_downloaded: 5,
        };
        assert_eq!(half.fraction(), Some(0.5));
    }
}
