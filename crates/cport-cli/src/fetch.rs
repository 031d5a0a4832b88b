use crate::error::{CliError, Result};
use crate::utils::parser;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const RCSB_DOWNLOAD_URL: &str = "https://files.rcsb.org/download/";

#[derive(Debug, Clone, Copy)]
pub enum DownloadProgress {
    Started { total_size: Option<u64> },
    Downloading { downloaded: u64 },
    Finished,
}

fn structure_url(pdb_id: &str) -> String {
    format!("{}{}.pdb", RCSB_DOWNLOAD_URL, pdb_id.to_ascii_uppercase())
}

/// Downloads the structure `pdb_id` from RCSB into `dir` as `<id>.pdb` and returns the
/// normalized identifier together with the written path.
pub async fn download_structure(
    pdb_id: &str,
    dir: &Path,
    mut progress_callback: impl FnMut(DownloadProgress),
) -> Result<(String, PathBuf)> {
    let id = parser::parse_pdb_id(pdb_id).map_err(|e| CliError::Argument(e.to_string()))?;
    let url = structure_url(&id);
    let path = dir.join(format!("{}.pdb", id));

    tokio::fs::create_dir_all(dir).await?;
    info!("Downloading {} from {}", id, url);
    let client = reqwest::Client::new();
    let response = client.get(&url).send().await?.error_for_status()?;
    progress_callback(DownloadProgress::Started {
        total_size: response.content_length(),
    });

    let mut file = tokio::fs::File::create(&path).await?;
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = item?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress_callback(DownloadProgress::Downloading { downloaded });
    }
    file.flush().await?;
    progress_callback(DownloadProgress::Finished);

    debug!("Wrote {} bytes to {:?}", downloaded, &path);
    Ok((id, path))
}
