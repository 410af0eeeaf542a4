pub(super) mod spotdl;
pub(super) mod ytdlp;

use once_cell::sync::Lazy;
use url::Url;

use super::{DownloadOutcome, SessionContext};

pub static HANDLERS: Lazy<Vec<DownloadHandler>> = Lazy::new(|| {
    vec![
        DownloadHandler::new(ytdlp::YtDlpHandler),
        DownloadHandler::new(spotdl::SpotdlHandler),
    ]
});

#[derive(Debug)]
pub struct DownloadHandler {
    provider: Box<dyn Handler>,
}
impl DownloadHandler {
    fn new<T>(provider: T) -> Self
    where
        T: Handler + 'static,
    {
        Self {
            provider: Box::new(provider),
        }
    }

    pub fn supports(&self, url: &Url) -> bool {
        self.provider.supports(url)
    }

    pub async fn download(
        &self,
        ctx: &SessionContext<'_>,
        url: &Url,
    ) -> Result<DownloadOutcome, anyhow::Error> {
        self.provider.download(ctx, url).await
    }
}

#[async_trait::async_trait]
pub trait Handler: std::fmt::Debug + Send + Sync {
    fn supports(&self, url: &Url) -> bool;

    async fn download(
        &self,
        ctx: &SessionContext<'_>,
        url: &Url,
    ) -> anyhow::Result<DownloadOutcome>;
}

/// Condenses captured engine stderr into a short, single-line diagnostic.
pub(super) fn stderr_excerpt(raw: &str) -> String {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .take(3)
        .rev()
        .copied()
        .collect::<Vec<_>>()
        .join("; ")
}
