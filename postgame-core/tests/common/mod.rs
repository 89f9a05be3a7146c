//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use postgame_core::acquisition::{
    DiscoveredContentEntry, DownloadProgress, ProgressCallback, Release, RemoteCatalog, SearchPage,
};
use postgame_core::catalog::ScenarioRecord;
use postgame_core::host::HostCommands;
use postgame_core::AcquisitionError;

/// Host that records every command line it is asked to run
#[derive(Default)]
pub struct RecordingHost {
    lines: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl HostCommands for RecordingHost {
    fn execute(&self, command_line: &str) {
        self.lines.lock().unwrap().push(command_line.to_string());
    }
}

/// In-process remote catalog
///
/// Searches and downloads can be held open by a gate until the test
/// releases them.
#[derive(Default)]
pub struct MockRemote {
    pages: Mutex<HashMap<String, SearchPage>>,
    search_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    archives: Mutex<HashMap<String, Vec<u8>>>,
    download_gate: Mutex<Option<Arc<Semaphore>>>,
    previews: Mutex<HashMap<String, Vec<u8>>>,
    preview_requests: Mutex<usize>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, query: &str, entries: Vec<DiscoveredContentEntry>) -> Self {
        self.pages.lock().unwrap().insert(
            query.to_string(),
            SearchPage {
                entries,
                page: 1,
                total_pages: 1,
            },
        );
        self
    }

    pub fn with_archive(self, url: &str, bytes: Vec<u8>) -> Self {
        self.archives.lock().unwrap().insert(url.to_string(), bytes);
        self
    }

    pub fn with_preview(self, url: &str, bytes: &[u8]) -> Self {
        self.previews.lock().unwrap().insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Hold searches for `query` until the returned gate gets a permit
    pub fn gate_search(&self, query: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.search_gates
            .lock()
            .unwrap()
            .insert(query.to_string(), gate.clone());
        gate
    }

    /// Hold every download until the returned gate gets permits
    pub fn gate_downloads(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.download_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn preview_requests(&self) -> usize {
        *self.preview_requests.lock().unwrap()
    }
}

#[async_trait]
impl RemoteCatalog for MockRemote {
    async fn search(&self, query: &str, _page: u32) -> Result<SearchPage, AcquisitionError> {
        let gate = self.search_gates.lock().unwrap().get(query).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        self.pages
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .ok_or_else(|| AcquisitionError::Network {
                message: format!("no results configured for {query:?}"),
            })
    }

    async fn download(
        &self,
        release: &Release,
        progress: ProgressCallback<'_>,
    ) -> Result<Vec<u8>, AcquisitionError> {
        let gate = self.download_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let bytes = self
            .archives
            .lock()
            .unwrap()
            .get(&release.download_url)
            .cloned()
            .ok_or_else(|| AcquisitionError::NotFound(release.download_url.clone()))?;

        progress(DownloadProgress {
            bytes_total: bytes.len() as u64,
            bytes_downloaded: bytes.len() as u64,
        });
        Ok(bytes)
    }

    async fn fetch_preview(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        *self.preview_requests.lock().unwrap() += 1;
        self.previews
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AcquisitionError::NotFound(url.to_string()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub fn entry(remote_id: &str, title: &str, download_url: &str) -> DiscoveredContentEntry {
    DiscoveredContentEntry {
        remote_id: remote_id.to_string(),
        title: title.to_string(),
        author: "mapmaker".to_string(),
        description: format!("{title} description"),
        preview_url: None,
        preview_image: None,
        releases: vec![Release {
            version: "1.0".to_string(),
            download_url: download_url.to_string(),
            digest: None,
        }],
    }
}

/// Deflated zip with the given (name, contents) members, names unchecked
pub fn zip_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, contents) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }
    buffer.into_inner()
}

pub fn scenario(code: &str, name: &str, shots: u32) -> ScenarioRecord {
    let mut record = ScenarioRecord::new(code, name);
    record.shot_count = shots;
    record
}
