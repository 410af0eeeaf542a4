mod handlers;

use std::path::{Path, PathBuf};

use handlers::HANDLERS;
use tracing::info;
use url::Url;

use crate::{
    config::Config,
    media::{Bitrate, MediaFormat, Quality},
};

/// Supported media sources, classified by the registrable domain of the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource {
    YouTube,
    Instagram,
    Spotify,
}

impl MediaSource {
    pub fn classify(url: &Url) -> Option<Self> {
        match registrable_domain(url)? {
            "youtube.com" | "youtu.be" => Some(Self::YouTube),
            "instagram.com" => Some(Self::Instagram),
            "spotify.com" => Some(Self::Spotify),
            _ => None,
        }
    }
}

/// Get the registrable part of the URL's domain ("open.spotify.com" ->
/// "spotify.com").
fn registrable_domain(url: &Url) -> Option<&str> {
    let host = url.domain()?;
    addr::parse_domain_name(host).ok()?.root()
}

/// Answers the session needs from the user. Implemented by the terminal
/// prompts; tests substitute scripted values.
pub trait Prompter: Send + Sync {
    fn media_format(&self) -> anyhow::Result<MediaFormat>;
    fn quality(&self) -> anyhow::Result<Quality>;
    fn bitrate(&self) -> anyhow::Result<Bitrate>;
    fn confirm_new_copy(&self, existing: &Path) -> anyhow::Result<bool>;
}

pub struct SessionContext<'a> {
    pub config: &'a Config,
    pub prompter: &'a dyn Prompter,
}

/// Terminal state of one download invocation.
#[derive(Debug)]
pub enum DownloadOutcome {
    Completed { dir: PathBuf },
    Skipped,
    Failed { reason: String },
    Unsupported,
}

pub struct Downloader;
impl Downloader {
    pub async fn download(
        ctx: &SessionContext<'_>,
        url: &Url,
    ) -> Result<DownloadOutcome, anyhow::Error> {
        info!(url = ?url.as_str(), "Downloading media...");

        for provider in HANDLERS.iter() {
            if provider.supports(url) {
                return provider.download(ctx, url).await;
            }
        }

        Ok(DownloadOutcome::Unsupported)
    }
}
