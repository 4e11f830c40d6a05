//! Extractor implementation backed by the `yt-dlp` command line.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    is_locator, ExtractedMedia, Extractor, SearchHit,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

const WATCH_URL_PREFIX: &str = "https://youtube.com/watch?v=";

/// Runs `yt-dlp` as a child process per request.
///
/// Downloads are transcoded to `audio_format` by yt-dlp's ffmpeg post
/// processor and written as `<output_dir>/<restricted title>.<audio_format>`.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: PathBuf,
    audio_format: String,
    audio_quality: String,
    extra_args: Vec<String>,
}

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Use a specific yt-dlp binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_audio_format(mut self, format: impl Into<String>, quality: impl Into<String>) -> Self {
        self.audio_format = format.into();
        self.audio_quality = quality.into();
        self
    }

    /// Extra arguments passed before the target, e.g. `--cookies <file>`.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run yt-dlp with `args` and return stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["--no-warnings", "--no-progress"])
            .args(&self.extra_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BridgeError::NotAvailable(format!(
                    "{} is not installed or not on PATH",
                    self.program.display()
                )),
                _ => BridgeError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no error output");
            return Err(BridgeError::OperationFailed(format!(
                "yt-dlp exited with {}: {}",
                output.status, reason
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| BridgeError::OperationFailed("yt-dlp printed invalid UTF-8".to_string()))
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        // A locator is looked up directly and reports its own metadata.
        let target = if is_locator(query) {
            query.trim().to_string()
        } else {
            format!("ytsearch1:{query}")
        };
        let stdout = self
            .run(&["--flat-playlist", "--no-playlist", "--dump-single-json", &target])
            .await?;
        parse_search(&stdout)
    }

    #[instrument(skip(self))]
    async fn expand_playlist(&self, locator: &str) -> Result<Vec<String>> {
        let stdout = self
            .run(&["--flat-playlist", "--dump-single-json", "--yes-playlist", locator])
            .await?;
        let locators = parse_playlist(&stdout)?;
        debug!(count = locators.len(), "playlist expanded");
        Ok(locators)
    }

    #[instrument(skip(self, output_dir))]
    async fn download(&self, locator: &str, output_dir: &Path) -> Result<ExtractedMedia> {
        let template = output_dir.join("%(title)s.%(ext)s");
        let template = template.to_string_lossy();
        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--no-simulate",
                "--format",
                "bestaudio/best",
                "--extract-audio",
                "--audio-format",
                &self.audio_format,
                "--audio-quality",
                &self.audio_quality,
                "--restrict-filenames",
                "--output",
                &template,
                locator,
            ])
            .await?;
        parse_download(&stdout, locator, &self.audio_format)
    }
}

// ============================================================================
// Output parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(rename = "_filename", default)]
    filename: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<Option<FlatEntry>>,
}

/// Either a search/playlist result with `entries`, or a single video.
#[derive(Debug, Deserialize)]
struct SearchDocument {
    #[serde(default)]
    entries: Option<Vec<Option<FlatEntry>>>,
    #[serde(flatten)]
    video: FlatEntry,
    #[serde(default)]
    webpage_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl FlatEntry {
    fn locator(&self) -> Option<String> {
        match (&self.id, &self.url) {
            (Some(id), _) if !id.is_empty() => Some(format!("{WATCH_URL_PREFIX}{id}")),
            (_, Some(url)) if url.starts_with("http") => Some(url.clone()),
            _ => None,
        }
    }
}

fn parse_json<'a, T: Deserialize<'a>>(stdout: &'a str, what: &str) -> Result<T> {
    serde_json::from_str(stdout.trim())
        .map_err(|e| BridgeError::OperationFailed(format!("unreadable yt-dlp {what} output: {e}")))
}

fn seconds(duration: Option<f64>) -> u64 {
    duration
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| secs as u64)
        .unwrap_or(0)
}

fn search_hit(entry: FlatEntry, locator: Option<String>) -> Option<SearchHit> {
    let locator = locator.or_else(|| entry.locator())?;
    Some(SearchHit {
        locator,
        title: entry.title.unwrap_or_else(|| "Unknown Title".to_string()),
        duration_seconds: seconds(entry.duration),
    })
}

fn parse_search(stdout: &str) -> Result<Option<SearchHit>> {
    let document: SearchDocument = parse_json(stdout, "search")?;
    match document.entries {
        Some(entries) => Ok(entries
            .into_iter()
            .flatten()
            .find_map(|entry| search_hit(entry, None))),
        None => Ok(search_hit(document.video, document.webpage_url)),
    }
}

fn parse_playlist(stdout: &str) -> Result<Vec<String>> {
    let playlist: FlatPlaylist = parse_json(stdout, "playlist")?;
    Ok(playlist
        .entries
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.locator())
        .collect())
}

fn parse_download(stdout: &str, locator: &str, audio_format: &str) -> Result<ExtractedMedia> {
    // One JSON document per line; a single video prints one.
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with('{'))
        .ok_or_else(|| BridgeError::OperationFailed("yt-dlp printed no metadata".to_string()))?;
    let info: VideoInfo = parse_json(line, "download")?;

    let filename = info.filename.ok_or_else(|| {
        BridgeError::OperationFailed("yt-dlp did not report an output file".to_string())
    })?;
    let file_path = Path::new(&filename).with_extension(audio_format);

    if info.title.is_none() {
        warn!(locator, "yt-dlp reported no title");
    }

    Ok(ExtractedMedia {
        title: info.title.unwrap_or_else(|| "Unknown Title".to_string()),
        canonical_locator: info.webpage_url.unwrap_or_else(|| locator.to_string()),
        file_path,
        duration_seconds: seconds(info.duration),
        thumbnail: info.thumbnail.filter(|thumb| !thumb.is_empty()),
    })
}
