use std::path::Path;

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use tracing::warn;
use url::Url;

use crate::{
    config::Config,
    downloader::{DownloadOutcome, Downloader, Prompter, SessionContext},
    media::{Bitrate, MediaFormat, Quality},
};

/// One interactive session: URL in, outcome report out. Handled failures
/// are printed, never propagated.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let prompter = TerminalPrompter::default();

    let raw: String = Input::with_theme(&prompter.theme)
        .with_prompt("Media URL")
        .interact_text()?;

    let Ok(url) = Url::parse(raw.trim()) else {
        println!("🚫 That does not look like a valid URL.");
        return Ok(());
    };

    let ctx = SessionContext {
        config,
        prompter: &prompter,
    };

    match Downloader::download(&ctx, &url).await {
        Ok(DownloadOutcome::Completed { dir }) => {
            println!("\n✅ Download complete! Saved in: {}\n", dir.display());
        }

        Ok(DownloadOutcome::Skipped) => println!("🚫 Skipped download."),

        Ok(DownloadOutcome::Failed { reason }) => println!("\n❌ {reason}\n"),

        Ok(DownloadOutcome::Unsupported) => {
            println!(
                "🚫 Unsupported source: only YouTube, Instagram and Spotify links are handled."
            );
        }

        Err(e) => {
            warn!(?e, "Download ended with an unexpected error");
            println!("\n❌ Something went wrong: {e:#}\n");
        }
    }

    Ok(())
}

#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Prompter for TerminalPrompter {
    fn media_format(&self) -> anyhow::Result<MediaFormat> {
        let raw: String = Input::with_theme(&self.theme)
            .with_prompt("Format (mp4/mp3/wav or 1/2/3)")
            .default("mp4".to_string())
            .interact_text()?;

        Ok(MediaFormat::parse(&raw).unwrap_or_else(|| {
            println!("⚠️ Invalid format {raw:?}. Defaulting to mp4.");
            MediaFormat::Mp4
        }))
    }

    fn quality(&self) -> anyhow::Result<Quality> {
        let raw: String = Input::with_theme(&self.theme)
            .with_prompt("Quality (best/720p/1080p)")
            .default("best".to_string())
            .interact_text()?;

        Ok(Quality::parse(&raw))
    }

    fn bitrate(&self) -> anyhow::Result<Bitrate> {
        let choice = Select::with_theme(&self.theme)
            .with_prompt("Audio quality")
            .items(&["high (320 kbps)", "low (128 kbps)"])
            .default(0)
            .interact()?;

        Ok(if choice == 0 { Bitrate::High } else { Bitrate::Low })
    }

    fn confirm_new_copy(&self, existing: &Path) -> anyhow::Result<bool> {
        let name = existing
            .file_name()
            .map_or_else(|| existing.display().to_string(), |n| n.to_string_lossy().into_owned());

        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(format!("⚠️ {name} already exists. Download again as a new copy?"))
            .default(false)
            .interact()?)
    }
}
