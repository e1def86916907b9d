use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{
    pin::Pin,
    process::Stdio,
    sync::LazyLock,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, BufReader, ReadBuf},
    process::{Child, ChildStdout},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    audio::{ByteStream, Resolver, StreamOptions, StreamSource},
    error::{PlayerError, Result},
};

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id pattern"));

/// Verifica si `text` es un link de video de YouTube que yt-dlp puede reproducir.
pub fn is_youtube_link(text: &str) -> bool {
    let Ok(url) = Url::parse(text.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut segments = url.path_segments().into_iter().flatten();

    let video_id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    };

    video_id.is_some_and(|id| VIDEO_ID.is_match(&id))
}

/// Entry printed by `yt-dlp --dump-json --flat-playlist`.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
}

impl YtDlpEntry {
    fn link(self) -> Option<String> {
        self.webpage_url
            .or(self.url)
            .filter(|link| is_youtube_link(link))
            .or_else(|| self.id.map(|id| format!("https://www.youtube.com/watch?v={}", id)))
    }
}

/// Busca texto libre con `ytsearch1:` usando yt-dlp.
pub struct YtDlpResolver {
    program: String,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn search(&self, text: &str) -> Result<Option<String>> {
        info!("🔍 Buscando en YouTube: {}", text);

        let search_query = format!("ytsearch1:{}", text);
        let output = Command::new(&self.program)
            .args([
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .output()
            .await
            .map_err(|e| {
                warn!("❌ No se pudo ejecutar yt-dlp: {}", e);
                PlayerError::ResolutionFailed(text.to_string())
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("❌ Búsqueda con yt-dlp fallida: {}", error.trim());
            return Err(PlayerError::ResolutionFailed(text.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let link = stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<YtDlpEntry>(line).ok())
            .find_map(YtDlpEntry::link);

        debug!("Búsqueda {:?} resuelta a {:?}", text, link);
        Ok(link)
    }
}

/// Reproduce audio leyendo la salida de yt-dlp.
pub struct YtDlpStreamSource {
    program: String,
}

impl YtDlpStreamSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args<'a>(link: &'a str, options: &StreamOptions, buffer: &'a str) -> Vec<&'a str> {
        let format = if options.audio_only { "bestaudio/best" } else { "best" };
        vec![
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            "-f",
            format,
            "--buffer-size",
            buffer,
            "-o",
            "-",
            link,
        ]
    }
}

#[async_trait]
impl StreamSource for YtDlpStreamSource {
    fn is_playable_link(&self, text: &str) -> bool {
        is_youtube_link(text)
    }

    async fn open(&self, link: &str, options: &StreamOptions) -> Result<ByteStream> {
        let open_failed = |reason: String| PlayerError::StreamOpenFailed {
            link: link.to_string(),
            reason,
        };

        let buffer = options.buffer_size_bytes.to_string();
        let mut child = tokio::process::Command::new(&self.program)
            .args(Self::args(link, options, &buffer))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| open_failed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| open_failed("yt-dlp stdout unavailable".to_string()))?;

        debug!("🎧 Stream de {} (buffer de {} bytes)", link, options.buffer_size_bytes);
        Ok(Box::new(ChildStream {
            _child: child,
            reader: BufReader::with_capacity(options.buffer_size_bytes, stdout),
        }))
    }
}

/// stdout de yt-dlp. Al soltarlo se mata el proceso.
struct ChildStream {
    _child: Child,
    reader: BufReader<ChildStdout>,
}

impl AsyncRead for ChildStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_youtube_url_detection() {
        assert!(is_youtube_link("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_link("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_link("https://music.youtube.com/watch?v=dQw4w9WgXcQ&list=x"));
        assert!(is_youtube_link("https://youtube.com/shorts/dQw4w9WgXcQ"));
        assert!(!is_youtube_link("https://example.com/video"));
        assert!(!is_youtube_link("https://www.youtube.com/watch?v=short"));
        assert!(!is_youtube_link("never gonna give you up"));
        assert!(!is_youtube_link("ftp://youtu.be/dQw4w9WgXcQ"));
    }

    #[test]
    fn search_entry_prefers_webpage_url() {
        let entry: YtDlpEntry = serde_json::from_str(
            r#"{"id":"dQw4w9WgXcQ","url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ","webpage_url":"https://youtu.be/dQw4w9WgXcQ"}"#,
        )
        .unwrap();
        assert_eq!(entry.link().as_deref(), Some("https://youtu.be/dQw4w9WgXcQ"));

        let bare: YtDlpEntry = serde_json::from_str(r#"{"id":"dQw4w9WgXcQ"}"#).unwrap();
        assert_eq!(
            bare.link().as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn stream_args_follow_options() {
        let options = StreamOptions::default();
        let args = YtDlpStreamSource::args("https://youtu.be/dQw4w9WgXcQ", &options, "262144");
        assert_eq!(
            args,
            vec![
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                "--buffer-size",
                "262144",
                "-o",
                "-",
                "https://youtu.be/dQw4w9WgXcQ",
            ]
        );

        let video = StreamOptions {
            audio_only: false,
            ..options
        };
        assert!(YtDlpStreamSource::args("x", &video, "1").contains(&"best"));
    }

    #[tokio::test]
    async fn missing_binary_reports_stream_open_failure() {
        let source = YtDlpStreamSource::new("/nonexistent/yt-dlp");
        let result = source
            .open("https://youtu.be/dQw4w9WgXcQ", &StreamOptions::default())
            .await;
        assert!(matches!(result, Err(PlayerError::StreamOpenFailed { .. })));
    }
}
