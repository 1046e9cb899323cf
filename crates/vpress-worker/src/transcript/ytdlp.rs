//! Subtitle download through the yt-dlp binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use vpress_models::{watch_url, VideoId};

use super::normalize::{normalize_text, parse_vtt};
use super::{CaptionStrategy, Transcript};
use crate::error::{WorkerError, WorkerResult};

/// yt-dlp strategy. Subtitles are written into a temp dir that is removed
/// when the fetch returns.
pub struct YtDlpSubtitles {
    binary: String,
    timeout: Duration,
}

impl YtDlpSubtitles {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CaptionStrategy for YtDlpSubtitles {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> WorkerResult<Option<Transcript>> {
        let workdir = tempfile::tempdir()?;
        let output_template = workdir.path().join("%(id)s").to_string_lossy().into_owned();
        let url = watch_url(video_id);

        info!(video_id = %video_id, language, "Fetching subtitles using yt-dlp");

        let args = [
            "--write-auto-sub",
            "--write-sub",
            "--sub-lang",
            language,
            "--skip-download",
            "--sub-format",
            "vtt",
            "--output",
            output_template.as_str(),
            url.as_str(),
        ];

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| WorkerError::timeout(format!("yt-dlp exceeded {:?}", self.timeout)))?
        .map_err(|e| WorkerError::transcript_failed(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::transcript_failed(format!(
                "yt-dlp exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let Some(vtt_path) = find_subtitle_file(workdir.path(), language)? else {
            return Ok(None);
        };

        let content = tokio::fs::read_to_string(&vtt_path).await?;
        let text = normalize_text(&parse_vtt(&content));
        if text.is_empty() {
            warn!(video_id = %video_id, "yt-dlp subtitles were empty");
            return Ok(None);
        }

        Ok(Some(Transcript {
            text,
            language: subtitle_language(&vtt_path).unwrap_or_else(|| language.to_string()),
        }))
    }
}

/// First `.vtt` in `dir`, preferring files tagged with `language`.
fn find_subtitle_file(dir: &Path, language: &str) -> WorkerResult<Option<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("vtt"))
        .collect();

    let tag = format!(".{}", language);
    files.sort_by_key(|path| {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        (!name.contains(&tag), name)
    });

    Ok(files.into_iter().next())
}

/// Language tag from a `{id}.{lang}.vtt` file name.
fn subtitle_language(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (_, lang) = stem.rsplit_once('.')?;
    (!lang.is_empty()).then(|| lang.to_string())
}
