use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use buildtree_core::{NodeAction, PackageTree};
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::error::CatalogError;

pub const DEFAULT_DOWNLOAD_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub package: String,
    pub url: String,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded,
    /// A complete archive was already in the source directory.
    Present,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::Present => "present",
        }
    }
}

/// Streams one URL into a file.
pub trait ArchiveFetcher: Sync {
    fn fetch(&self, url: &str, out: &mut dyn Write) -> Result<u64, String>;
}

impl<F> ArchiveFetcher for F
where
    F: Fn(&str, &mut dyn Write) -> Result<u64, String> + Sync,
{
    fn fetch(&self, url: &str, out: &mut dyn Write) -> Result<u64, String> {
        self(url, out)
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CatalogError::Connection {
                url: String::new(),
                diagnostic: format!("failed to build http client: {err}"),
            })?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, url: &str, out: &mut dyn Write) -> Result<u64, String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| err.to_string())?;
        io::copy(&mut response, out).map_err(|err| err.to_string())
    }
}

/// Archives of every package marked for installation, fetched in batches of
/// at most `width` concurrent downloads. A batch always runs to completion;
/// the first failure stops the queue before the next batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadQueue {
    requests: Vec<DownloadRequest>,
    width: usize,
}

impl DownloadQueue {
    pub fn new(requests: Vec<DownloadRequest>) -> Self {
        Self {
            requests,
            width: DEFAULT_DOWNLOAD_WIDTH,
        }
    }

    /// One request per INSTALL node, pre-order. The URL is the repository's
    /// base URL followed by the archive file name.
    pub fn for_tree(tree: &PackageTree, source_dir: &Path) -> Result<Self, CatalogError> {
        let mut requests = Vec::new();
        for id in tree.all_nodes(tree.root()) {
            let node = tree.node(id);
            if node.action != NodeAction::Install {
                continue;
            }
            let archive_file_name = node.archive_file_name().ok_or_else(|| {
                CatalogError::MissingVersion {
                    package: node.name.clone(),
                }
            })?;
            let base_url = tree.base_url_for(&node.name).ok_or_else(|| {
                CatalogError::MissingRepository {
                    package: node.name.clone(),
                }
            })?;
            requests.push(DownloadRequest {
                package: node.name.clone(),
                url: format!("{base_url}{archive_file_name}"),
                destination: source_dir.join(&archive_file_name),
            });
        }
        Ok(Self::new(requests))
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn requests(&self) -> &[DownloadRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Run the queue. `on_complete` is called in request order once each
    /// batch has finished.
    pub fn run<F, C>(&self, fetcher: &F, mut on_complete: C) -> Result<(), CatalogError>
    where
        F: ArchiveFetcher,
        C: FnMut(&DownloadRequest, DownloadStatus),
    {
        for batch in self.requests.chunks(self.width) {
            let results = thread::scope(|scope| {
                let handles = batch
                    .iter()
                    .map(|request| scope.spawn(move || download_one(fetcher, request)))
                    .collect::<Vec<_>>();
                handles
                    .into_iter()
                    .zip(batch)
                    .map(|(handle, request)| {
                        handle.join().unwrap_or_else(|_| {
                            Err(download_error(request, "download worker panicked".to_string()))
                        })
                    })
                    .collect::<Vec<_>>()
            });

            let mut first_error = None;
            for (request, result) in batch.iter().zip(results) {
                match result {
                    Ok(status) => {
                        debug!(package = %request.package, status = status.as_str(), "archive ready");
                        on_complete(request, status);
                    }
                    Err(err) => {
                        warn!(package = %request.package, "{err}");
                        first_error.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }
        }
        info!(archives = self.requests.len(), "downloads completed");
        Ok(())
    }
}

fn download_one<F: ArchiveFetcher>(
    fetcher: &F,
    request: &DownloadRequest,
) -> Result<DownloadStatus, CatalogError> {
    if request.destination.is_file() {
        return Ok(DownloadStatus::Present);
    }
    if let Some(parent) = request.destination.parent() {
        fs::create_dir_all(parent).map_err(|err| download_error(request, err.to_string()))?;
    }

    let part_path = part_path(&request.destination);
    let result = write_part(fetcher, request, &part_path);
    if let Err(err) = result {
        let _ = fs::remove_file(&part_path);
        return Err(err);
    }

    fs::rename(&part_path, &request.destination).map_err(|err| {
        download_error(
            request,
            format!("failed to move {} into place: {err}", part_path.display()),
        )
    })?;
    Ok(DownloadStatus::Downloaded)
}

fn write_part<F: ArchiveFetcher>(
    fetcher: &F,
    request: &DownloadRequest,
    part_path: &Path,
) -> Result<(), CatalogError> {
    let file = File::create(part_path).map_err(|err| download_error(request, err.to_string()))?;
    let mut out = io::BufWriter::new(file);
    let bytes = fetcher
        .fetch(&request.url, &mut out)
        .map_err(|diagnostic| download_error(request, diagnostic))?;
    out.flush()
        .map_err(|err| download_error(request, err.to_string()))?;
    debug!(url = %request.url, bytes, "archive fetched");
    Ok(())
}

fn part_path(destination: &Path) -> PathBuf {
    destination.with_file_name(format!(
        "{}.part",
        destination
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("archive")
    ))
}

fn download_error(request: &DownloadRequest, diagnostic: String) -> CatalogError {
    CatalogError::Download {
        url: request.url.clone(),
        path: request.destination.clone(),
        diagnostic,
    }
}
