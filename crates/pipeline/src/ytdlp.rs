//! [`Fetcher`] backed by `yt-dlp`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ToolError;
use crate::subprocess::run_tool;
use crate::tools::Fetcher;

/// Prefer an mp4 container so the sampler never needs a remux.
const FORMAT_SELECTOR: &str = "best[ext=mp4]/best";

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn args(locator: &str, output_path: &Path) -> Vec<String> {
        vec![
            "-f".into(),
            FORMAT_SELECTOR.into(),
            "-o".into(),
            output_path.to_string_lossy().into_owned(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--".into(),
            locator.into(),
        ]
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        locator: &str,
        output_path: &Path,
        timeout: Duration,
    ) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::args(locator, output_path));
        run_tool(self.name(), &mut cmd, timeout).await?;
        Ok(())
    }
}
