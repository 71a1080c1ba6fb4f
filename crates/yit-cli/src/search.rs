//! Search through an external `yt-dlp` process.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use tracing::{debug, info, warn};
use yit_proto::store::Track;

/// Separator between title and URL in yt-dlp's `--print` output.
const FIELD_SEP: &str = "||||";

#[allow(async_fn_in_trait)]
pub trait SearchProvider {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Track>>;
}

pub struct YtDlpSearch {
    binary: Option<PathBuf>,
}

impl YtDlpSearch {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }
}

impl SearchProvider for YtDlpSearch {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Track>> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("yt-dlp not found (install it or set YT_DLP_PATH)"))?;

        let print_fmt = format!("%(title)s{}%(webpage_url)s", FIELD_SEP);
        let target = format!("ytsearch{}:{}", limit, query);
        info!("[search] {} --flat-playlist {}", binary.display(), target);

        let output = tokio::process::Command::new(binary)
            .args(["--print", &print_fmt, "--flat-playlist", &target])
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("running {}", binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("[search] yt-dlp exited {}: {}", output.status, stderr.trim());
            anyhow::bail!("yt-dlp exited {}: {}", output.status, stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tracks = parse_search_output(&stdout);
        debug!("[search] {} results for {:?}", tracks.len(), query);
        Ok(tracks)
    }
}

/// One `title||||url` pair per line; anything else is ignored.
pub fn parse_search_output(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .filter_map(|line| {
            let (title, url) = line.split_once(FIELD_SEP)?;
            let url = url.trim();
            (!url.is_empty()).then(|| Track::new(title.trim(), url))
        })
        .collect()
}
