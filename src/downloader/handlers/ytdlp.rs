use std::{path::PathBuf, process::Stdio};

use anyhow::Context;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};
use tracing::{debug, trace, warn};
use url::Url;

use super::Handler;
use crate::{
    downloader::{DownloadOutcome, MediaSource, Prompter, SessionContext},
    media::{MediaFormat, Quality},
    output::{sanitize_title, Layout, OutputTarget},
    progress::{self, ProgressRenderer},
    retry,
};

const ENGINE_BIN: &str = "yt-dlp";
const FALLBACK_TITLE: &str = "video";
const MP4_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best";

#[derive(Debug, Deserialize)]
struct TitleProbe {
    title: Option<String>,
}

/// YouTube and Instagram downloads, delegated to the yt-dlp engine.
#[derive(Debug)]
pub struct YtDlpHandler;

#[async_trait::async_trait]
impl Handler for YtDlpHandler {
    fn supports(&self, url: &Url) -> bool {
        matches!(
            MediaSource::classify(url),
            Some(MediaSource::YouTube | MediaSource::Instagram)
        )
    }

    #[tracing::instrument(skip(self, ctx, url), fields(url = ?url.as_str()))]
    async fn download(
        &self,
        ctx: &SessionContext<'_>,
        url: &Url,
    ) -> anyhow::Result<DownloadOutcome> {
        debug!("Downloading via yt-dlp");

        let (format, quality) = match MediaSource::classify(url) {
            Some(MediaSource::Instagram) => {
                println!("📸 Instagram link detected, using mp4 at best quality.\n");
                (MediaFormat::Mp4, Quality::Best)
            }
            _ => (ctx.prompter.media_format()?, ctx.prompter.quality()?),
        };

        let dir = Layout::new(&ctx.config.download_dir).dir_for(format.category())?;

        let title = match Self::probe_title(url).await {
            Ok(title) => title,
            Err(e) => {
                warn!(?e, "Metadata probe failed, falling back to a generic title");
                FALLBACK_TITLE.to_string()
            }
        };
        let title = sanitize_title(&title);

        let Some(target) = prepare_target(ctx.prompter, dir, title, format)? else {
            return Ok(DownloadOutcome::Skipped);
        };

        println!("\n📥 Downloading: {}", target.title());
        println!("💾 Saving to: {}\n", target.dir().display());

        let attempts = ctx.config.retry.attempts;
        let mut attempt = 0u32;
        let result = retry::run(&ctx.config.retry, || {
            attempt += 1;
            Self::run_engine(url, &target, format, quality, attempt, attempts)
        })
        .await;

        match result {
            Ok(()) => Ok(DownloadOutcome::Completed {
                dir: target.dir().to_path_buf(),
            }),
            Err(e) => Ok(DownloadOutcome::Failed {
                reason: format!("Download failed after {attempts} attempt(s): {e:#}"),
            }),
        }
    }
}

impl YtDlpHandler {
    #[tracing::instrument(skip_all, fields(url = ?url.as_str()))]
    async fn probe_title(url: &Url) -> anyhow::Result<String> {
        trace!("Probing media title");

        let output = Command::new(ENGINE_BIN)
            .args(["--dump-json", "--skip-download", "--no-warnings"])
            .arg(url.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context("failed to launch yt-dlp (is it installed?)")?;

        if !output.status.success() {
            let detail = super::stderr_excerpt(&String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("metadata probe exited with {}: {detail}", output.status);
        }

        title_from_probe(&String::from_utf8_lossy(&output.stdout))
    }

    async fn run_engine(
        url: &Url,
        target: &OutputTarget,
        format: MediaFormat,
        quality: Quality,
        attempt: u32,
        attempts: u32,
    ) -> anyhow::Result<()> {
        debug!(attempt, "Invoking download engine");

        let mut cmd = Command::new(ENGINE_BIN);
        cmd.args(["--newline", "--quiet", "--progress", "--no-warnings"])
            .args(["--progress-template", progress::ENGINE_PROGRESS_TEMPLATE])
            .args(engine_format_args(format, quality))
            .arg("-o")
            .arg(target.engine_template())
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .context("failed to launch yt-dlp (is it installed?)")?;

        let stdout = child
            .stdout
            .take()
            .context("engine stdout was not captured")?;
        let mut stderr = child
            .stderr
            .take()
            .context("engine stderr was not captured")?;

        let render = async move {
            let mut renderer = ProgressRenderer::new(format!("Attempt {attempt}/{attempts}"));
            let mut lines = BufReader::new(stdout).lines();

            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = progress::parse_event(&line) {
                    renderer.observe(&event);
                }
            }

            renderer
        };
        let drain_stderr = async {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        };

        let (renderer, err_output) = tokio::join!(render, drain_stderr);
        let status = child.wait().await.context("failed to wait for yt-dlp")?;

        if status.success() {
            renderer.finish();
            return Ok(());
        }

        renderer.clear();
        let detail = super::stderr_excerpt(&err_output);
        if detail.is_empty() {
            anyhow::bail!("yt-dlp exited with {status}");
        }
        anyhow::bail!("yt-dlp exited with {status}: {detail}")
    }
}

/// Runs the duplicate guard. `None` means the user declined and the
/// operation should be abandoned without touching the engine.
fn prepare_target(
    prompter: &dyn Prompter,
    dir: PathBuf,
    title: String,
    format: MediaFormat,
) -> anyhow::Result<Option<OutputTarget>> {
    let mut target = OutputTarget::new(dir, title, format);

    let existing = target.final_path();
    if existing.exists() {
        if !prompter.confirm_new_copy(&existing)? {
            return Ok(None);
        }

        let fresh = target.promote_to_copy();
        let name = fresh
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("📁 New copy will be saved as: {name}");
    }

    Ok(Some(target))
}

fn engine_format_args(format: MediaFormat, quality: Quality) -> Vec<String> {
    match format {
        MediaFormat::Mp4 => {
            let selector = match quality {
                Quality::Best => MP4_SELECTOR.to_string(),
                Quality::MaxHeight(h) => format!(
                    "bestvideo[ext=mp4][height<={h}]+bestaudio[ext=m4a]/bestvideo[height<={h}]+bestaudio/best"
                ),
            };

            vec![
                "-f".to_string(),
                selector,
                "--merge-output-format".to_string(),
                "mp4".to_string(),
                "--postprocessor-args".to_string(),
                "ffmpeg:-c:v copy -c:a aac -movflags faststart".to_string(),
            ]
        }

        MediaFormat::Mp3 | MediaFormat::Wav => vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            format.ext().to_string(),
            "--audio-quality".to_string(),
            "192K".to_string(),
        ],
    }
}

fn title_from_probe(raw: &str) -> anyhow::Result<String> {
    let line = raw
        .lines()
        .find(|line| !line.trim().is_empty())
        .context("metadata probe returned no output")?;

    let probe: TitleProbe =
        serde_json::from_str(line).context("metadata probe returned malformed output")?;

    Ok(probe.title.unwrap_or_else(|| FALLBACK_TITLE.to_string()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::media::Bitrate;

    struct Scripted {
        allow_copy: bool,
    }

    impl Prompter for Scripted {
        fn media_format(&self) -> anyhow::Result<MediaFormat> {
            Ok(MediaFormat::Mp3)
        }

        fn quality(&self) -> anyhow::Result<Quality> {
            Ok(Quality::Best)
        }

        fn bitrate(&self) -> anyhow::Result<Bitrate> {
            Ok(Bitrate::High)
        }

        fn confirm_new_copy(&self, _existing: &Path) -> anyhow::Result<bool> {
            Ok(self.allow_copy)
        }
    }

    #[test]
    fn declined_duplicate_aborts_before_the_engine_runs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("clip.mp4"), b"x").expect("write");

        let target = prepare_target(
            &Scripted { allow_copy: false },
            tmp.path().to_path_buf(),
            "clip".to_string(),
            MediaFormat::Mp4,
        )
        .expect("guard");

        assert!(target.is_none());
    }

    #[test]
    fn accepted_duplicate_gets_a_numbered_copy() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("clip.mp4"), b"x").expect("write");
        std::fs::write(tmp.path().join("clip (2).mp4"), b"x").expect("write");

        let target = prepare_target(
            &Scripted { allow_copy: true },
            tmp.path().to_path_buf(),
            "clip".to_string(),
            MediaFormat::Mp4,
        )
        .expect("guard")
        .expect("target");

        assert_eq!(target.title(), "clip (3)");
        assert!(!target.final_path().exists());
    }

    #[test]
    fn fresh_targets_pass_through_untouched() {
        let tmp = tempfile::tempdir().expect("tempdir");

        let target = prepare_target(
            &Scripted { allow_copy: false },
            tmp.path().to_path_buf(),
            "clip".to_string(),
            MediaFormat::Mp4,
        )
        .expect("guard")
        .expect("target");

        assert_eq!(target.title(), "clip");
    }

    #[test]
    fn video_args_force_an_mp4_merge() {
        let args = engine_format_args(MediaFormat::Mp4, Quality::Best);

        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(args.iter().any(|a| a.contains("bestvideo[ext=mp4]")));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn video_args_apply_a_height_cap() {
        let args = engine_format_args(MediaFormat::Mp4, Quality::MaxHeight(720));

        assert!(args.iter().any(|a| a.contains("height<=720")));
    }

    #[test]
    fn audio_args_extract_and_reencode() {
        let args = engine_format_args(MediaFormat::Wav, Quality::Best);

        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"wav".to_string()));
        assert!(args.contains(&"bestaudio/best".to_string()));
    }

    #[test]
    fn title_probe_parses_the_first_json_line() {
        assert_eq!(
            title_from_probe("{\"title\": \"My Clip\", \"id\": \"abc\"}\n").expect("title"),
            "My Clip"
        );
        assert_eq!(title_from_probe("{\"id\": \"abc\"}").expect("title"), "video");
        assert!(title_from_probe("not json").is_err());
        assert!(title_from_probe("").is_err());
    }
}
