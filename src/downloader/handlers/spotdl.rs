use std::{path::Path, process::Stdio, time::Duration};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

use super::Handler;
use crate::{
    downloader::{DownloadOutcome, MediaSource, SessionContext},
    media::{Bitrate, MediaCategory},
    output::{sanitize_title, Layout},
    retry,
};

const ENGINE_BIN: &str = "spotdl";
const FALLBACK_COLLECTION: &str = "playlist";

#[derive(Debug, Deserialize)]
struct SavedSong {
    list_name: Option<String>,
}

/// Spotify downloads, delegated to the spotdl tool. The tool resolves track
/// metadata, finds a matching audio stream and re-encodes it.
#[derive(Debug)]
pub struct SpotdlHandler;

#[async_trait::async_trait]
impl Handler for SpotdlHandler {
    fn supports(&self, url: &Url) -> bool {
        matches!(MediaSource::classify(url), Some(MediaSource::Spotify))
    }

    #[tracing::instrument(skip(self, ctx, url), fields(url = ?url.as_str()))]
    async fn download(
        &self,
        ctx: &SessionContext<'_>,
        url: &Url,
    ) -> anyhow::Result<DownloadOutcome> {
        debug!("Downloading via spotdl");

        if let Err(e) = Self::ensure_engine().await {
            return Ok(DownloadOutcome::Failed {
                reason: format!("{e:#}"),
            });
        }

        let bitrate = ctx.prompter.bitrate()?;
        let mut dir = Layout::new(&ctx.config.download_dir).dir_for(MediaCategory::Spotify)?;

        if is_playlist_url(url) {
            let name = Self::resolve_playlist_name(url)
                .await
                .unwrap_or_else(|| FALLBACK_COLLECTION.to_string());
            dir = dir.join(sanitize_title(&name));
            std::fs::create_dir_all(&dir).with_context(|| {
                format!("failed to create download directory {}", dir.display())
            })?;
        }

        println!("\n📥 Downloading from Spotify at {}.", bitrate.engine_arg());
        println!("💾 Saving to: {}\n", dir.display());

        let attempts = ctx.config.retry.attempts;
        let mut attempt = 0u32;
        let result = retry::run(&ctx.config.retry, || {
            attempt += 1;
            Self::run_engine(url, &dir, bitrate, attempt, attempts)
        })
        .await;

        match result {
            Ok(()) => Ok(DownloadOutcome::Completed { dir }),
            Err(e) => Ok(DownloadOutcome::Failed {
                reason: format!("Download failed after {attempts} attempt(s): {e:#}"),
            }),
        }
    }
}

impl SpotdlHandler {
    /// Checks that the tool is callable; missing installs get one automatic
    /// pip install attempt before giving up.
    #[tracing::instrument]
    async fn ensure_engine() -> anyhow::Result<()> {
        if Self::engine_available().await {
            return Ok(());
        }

        println!("⚙️ spotdl not found. Trying to install it with pip...");
        let install = Command::new("python3")
            .args(["-m", "pip", "install", "spotdl"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
        if let Err(e) = install {
            warn!(?e, "Automatic spotdl install could not be started");
        }

        if Self::engine_available().await {
            println!("✅ spotdl installed.");
            Ok(())
        } else {
            anyhow::bail!(
                "spotdl is not installed and automatic installation failed; install it manually \
                 with `pip install spotdl`"
            )
        }
    }

    async fn engine_available() -> bool {
        Command::new(ENGINE_BIN)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_or(false, |status| status.success())
    }

    async fn resolve_playlist_name(url: &Url) -> Option<String> {
        match Self::query_playlist_metadata(url).await {
            Ok(name) => name,
            Err(e) => {
                warn!(?e, "Playlist metadata query failed, using a generic directory name");
                None
            }
        }
    }

    #[tracing::instrument(skip_all, fields(url = ?url.as_str()))]
    async fn query_playlist_metadata(url: &Url) -> anyhow::Result<Option<String>> {
        let save_file =
            std::env::temp_dir().join(format!("mediagrab-{}.spotdl", std::process::id()));

        let output = Command::new(ENGINE_BIN)
            .arg("save")
            .arg(url.as_str())
            .arg("--save-file")
            .arg(&save_file)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context("failed to launch spotdl")?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&save_file).await;
            anyhow::bail!("metadata query exited with {}", output.status);
        }

        let raw = tokio::fs::read_to_string(&save_file)
            .await
            .context("failed to read the metadata file")?;
        let _ = tokio::fs::remove_file(&save_file).await;

        playlist_name_from_metadata(&raw)
    }

    async fn run_engine(
        url: &Url,
        dir: &Path,
        bitrate: Bitrate,
        attempt: u32,
        attempts: u32,
    ) -> anyhow::Result<()> {
        debug!(attempt, "Invoking download tool");

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .expect("spinner template is valid"),
        );
        spinner.set_message(format!(
            "Attempt {attempt}/{attempts}: matching and downloading songs..."
        ));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let template = format!("{}/{{title}}.{{output-ext}}", dir.display());
        let output = Command::new(ENGINE_BIN)
            .arg("download")
            .arg(url.as_str())
            .args(["--output", &template])
            .args(["--bitrate", bitrate.engine_arg()])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context("failed to launch spotdl")?;

        spinner.finish_and_clear();

        if output.status.success() {
            return Ok(());
        }

        // spotdl reports most failures on stdout.
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            super::stderr_excerpt(&String::from_utf8_lossy(&output.stdout))
        } else {
            super::stderr_excerpt(&stderr)
        };

        if detail.is_empty() {
            anyhow::bail!("spotdl exited with {}", output.status);
        }
        anyhow::bail!("spotdl exited with {}: {detail}", output.status)
    }
}

fn is_playlist_url(url: &Url) -> bool {
    url.path_segments()
        .map_or(false, |mut segments| {
            segments.any(|segment| segment == "playlist" || segment == "album")
        })
}

fn playlist_name_from_metadata(raw: &str) -> anyhow::Result<Option<String>> {
    let songs: Vec<SavedSong> =
        serde_json::from_str(raw).context("metadata file is not valid JSON")?;

    Ok(songs.into_iter().find_map(|song| song.list_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn playlists_and_albums_get_their_own_directory() {
        assert!(is_playlist_url(&url("https://open.spotify.com/playlist/37i9dQ")));
        assert!(is_playlist_url(&url("https://open.spotify.com/album/4aawyA")));
        assert!(!is_playlist_url(&url("https://open.spotify.com/track/11dFgh")));
        assert!(!is_playlist_url(&url("https://open.spotify.com")));
    }

    #[test]
    fn playlist_name_comes_from_the_first_tagged_song() {
        let raw = r#"[
            {"name": "Song A", "list_name": null},
            {"name": "Song B", "list_name": "Road Trip"},
            {"name": "Song C", "list_name": "Road Trip"}
        ]"#;

        assert_eq!(
            playlist_name_from_metadata(raw).expect("metadata"),
            Some("Road Trip".to_string())
        );
    }

    #[test]
    fn missing_playlist_names_yield_none() {
        assert_eq!(playlist_name_from_metadata("[]").expect("metadata"), None);
        assert_eq!(
            playlist_name_from_metadata(r#"[{"name": "Song"}]"#).expect("metadata"),
            None
        );
    }

    #[test]
    fn malformed_metadata_is_an_error() {
        assert!(playlist_name_from_metadata("not json").is_err());
        assert!(playlist_name_from_metadata(r#"{"name": "not a list"}"#).is_err());
    }
}
