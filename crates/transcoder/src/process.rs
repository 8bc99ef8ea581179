use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{ChildStderr, Command},
    sync::broadcast,
};
use tracing::{debug, info, warn};

use crate::{EngineAssets, EngineError, EngineErrorKind, EngineEvent, TranscodingEngine};

const EVENT_CAPACITY: usize = 256;

/// Runs a native `ffmpeg` binary, using a private scratch directory as the
/// engine's virtual filesystem.
pub struct ProcessEngine {
    program: PathBuf,
    leading_args: Vec<OsString>,
    scratch: TempDir,
    events: broadcast::Sender<EngineEvent>,
    loaded: AtomicBool,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> std::io::Result<Self> {
        let scratch = tempfile::Builder::new().prefix("movconv-vfs-").tempdir()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            program: program.into(),
            leading_args: Vec::new(),
            scratch,
            events,
            loaded: AtomicBool::new(false),
        })
    }

    /// Arguments placed before every invocation, e.g. a wrapper script path.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .current_dir(self.scratch.path())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, EngineError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !plain {
            return Err(EngineError::new(
                EngineErrorKind::Other,
                format!("invalid virtual file name '{name}'"),
            ));
        }
        Ok(self.scratch.path().join(name))
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl TranscodingEngine for ProcessEngine {
    async fn load(&self, assets: &EngineAssets) -> Result<(), EngineError> {
        debug!(
            core_script = %assets.core_script,
            wasm_module = %assets.wasm_module,
            "native engine does not fetch browser assets"
        );

        let output = self
            .command()
            .arg("-version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                EngineError::new(
                    EngineErrorKind::AssetFetchFailed,
                    format!("failed to start '{}': {err}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            return Err(EngineError::new(
                EngineErrorKind::Other,
                format!(
                    "'{} -version' exited with {}",
                    self.program.display(),
                    output.status
                ),
            ));
        }

        let banner = String::from_utf8_lossy(&output.stdout);
        let version = banner.lines().next().unwrap_or_default().to_string();
        info!(program = %self.program.display(), %version, "transcoding engine loaded");
        self.emit(EngineEvent::Log(version));
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| io_error(&format!("failed to write virtual file '{name}'"), err))
    }

    async fn exec(&self, args: &[String]) -> Result<(), EngineError> {
        if !self.loaded.load(Ordering::SeqCst) {
            return Err(EngineError::new(
                EngineErrorKind::Other,
                "engine is not loaded",
            ));
        }

        debug!(args = ?args, "running engine command");
        let mut child = self
            .command()
            .args(["-hide_banner", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| io_error("failed to spawn engine process", err))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::new(EngineErrorKind::Io, "engine stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::new(EngineErrorKind::Io, "engine stderr unavailable"))?;

        let duration_us = Arc::new(AtomicU64::new(0));
        let stderr_task = tokio::spawn(pump_stderr(
            stderr,
            self.events.clone(),
            Arc::clone(&duration_us),
        ));

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| io_error("failed to read engine progress", err))?
        {
            match parse_progress_line(&line) {
                Some(ProgressLine::OutTime(out_us)) => {
                    let total = duration_us.load(Ordering::SeqCst);
                    if total > 0 {
                        let fraction = (out_us as f64 / total as f64).clamp(0.0, 1.0);
                        self.emit(EngineEvent::Progress(fraction));
                    }
                }
                Some(ProgressLine::End) => self.emit(EngineEvent::Progress(1.0)),
                None => {}
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|err| io_error("failed to wait for engine process", err))?;
        let last_line = match stderr_task.await {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "engine stderr reader stopped unexpectedly");
                None
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::new(
                EngineErrorKind::ExecutionFailed,
                format!(
                    "engine exited with {status}: {}",
                    last_line.unwrap_or_else(|| "no diagnostic output".into())
                ),
            ))
        }
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|err| io_error(&format!("failed to read virtual file '{name}'"), err))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|err| io_error(&format!("failed to delete virtual file '{name}'"), err))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

/// Forwards stderr as log events, records the input duration and returns the
/// last non-empty line for error reporting.
async fn pump_stderr(
    stderr: ChildStderr,
    events: broadcast::Sender<EngineEvent>,
    duration_us: Arc<AtomicU64>,
) -> Option<String> {
    let mut last = None;
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(total) = parse_duration_line(&line) {
                    duration_us.store(total, Ordering::SeqCst);
                }
                if !line.trim().is_empty() {
                    debug!(target: "engine", "{line}");
                    last = Some(line.clone());
                    let _ = events.send(EngineEvent::Log(line));
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "failed to read engine stderr");
                break;
            }
        }
    }
    last
}

fn io_error(context: &str, err: std::io::Error) -> EngineError {
    let kind = if err.kind() == std::io::ErrorKind::NotFound {
        EngineErrorKind::FileNotFound
    } else {
        EngineErrorKind::Io
    };
    EngineError::new(kind, format!("{context}: {err}"))
}

fn parse_timestamp(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// `  Duration: 00:01:02.50, start: ...` -> microseconds.
fn parse_duration_line(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.split(',').next()?;
    let seconds = parse_timestamp(stamp)?;
    Some((seconds * 1_000_000.0) as u64)
}

#[derive(Debug, PartialEq, Eq)]
enum ProgressLine {
    OutTime(u64),
    End,
}

fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" => value.parse().ok().map(ProgressLine::OutTime),
        "progress" if value == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_banner() {
        assert_eq!(
            parse_duration_line("  Duration: 00:01:02.50, start: 0.000000, bitrate: 1200 kb/s"),
            Some(62_500_000)
        );
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("Stream #0:0: Video: h264"), None);
    }

    #[test]
    fn parses_progress_keys() {
        assert_eq!(
            parse_progress_line("out_time_us=1500000"),
            Some(ProgressLine::OutTime(1_500_000))
        );
        assert_eq!(parse_progress_line("out_time_us=N/A"), None);
        assert_eq!(parse_progress_line("progress=end"), Some(ProgressLine::End));
        assert_eq!(parse_progress_line("progress=continue"), None);
        assert_eq!(parse_progress_line("frame=42"), None);
    }

    #[test]
    fn rejects_names_outside_scratch_dir() {
        let engine = ProcessEngine::new("ffmpeg").expect("engine");
        for name in ["", ".", "..", "../escape.mov", "nested/input.mov", "a\\b"] {
            let err = engine.resolve(name).expect_err("invalid name");
            assert_eq!(err.kind(), EngineErrorKind::Other, "{name}");
        }
        assert_eq!(
            engine.resolve("input.mov").expect("plain name"),
            engine.scratch_dir().join("input.mov")
        );
    }

    #[tokio::test]
    async fn exec_requires_load() {
        let engine = ProcessEngine::new("ffmpeg").expect("engine");
        let err = engine
            .exec(&["-version".to_string()])
            .await
            .expect_err("not loaded");
        assert_eq!(err.kind(), EngineErrorKind::Other);
    }

    #[tokio::test]
    async fn missing_virtual_file_maps_to_file_not_found() {
        let engine = ProcessEngine::new("ffmpeg").expect("engine");
        let err = engine.read_file("output.mp4").await.expect_err("missing");
        assert_eq!(err.kind(), EngineErrorKind::FileNotFound);
        let err = engine.delete_file("output.mp4").await.expect_err("missing");
        assert_eq!(err.kind(), EngineErrorKind::FileNotFound);
    }

    #[tokio::test]
    async fn missing_binary_fails_to_load() {
        let engine = ProcessEngine::new("definitely-not-an-ffmpeg-binary").expect("engine");
        let err = engine
            .load(&EngineAssets::default())
            .await
            .expect_err("no binary");
        assert_eq!(err.kind(), EngineErrorKind::AssetFetchFailed);
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;

        fn fake_ffmpeg(dir: &Path, reject_copy: bool) -> PathBuf {
            let script = format!(
                r#"if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1-fake"
  exit 0
fi
input=""
output=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  if [ "$arg" = "copy" ] && [ "{reject}" = "yes" ]; then
    echo "Could not find tag for codec in stream #0" >&2
    exit 1
  fi
  prev="$arg"
  output="$arg"
done
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 800 kb/s" >&2
echo "out_time_us=5000000"
echo "progress=continue"
echo "out_time_us=10000000"
echo "progress=end"
cp "$input" "$output"
"#,
                reject = if reject_copy { "yes" } else { "no" }
            );
            let path = dir.join("fake-ffmpeg.sh");
            std::fs::write(&path, script).expect("write script");
            path
        }

        fn engine_with(script: &Path) -> ProcessEngine {
            ProcessEngine::new("sh")
                .expect("engine")
                .with_leading_args([script.as_os_str().to_owned()])
        }

        #[tokio::test]
        async fn copies_through_virtual_files_and_reports_progress() {
            let dir = tempfile::tempdir().expect("tempdir");
            let engine = engine_with(&fake_ffmpeg(dir.path(), false));
            let mut events = engine.subscribe_events();

            engine.load(&EngineAssets::default()).await.expect("load");
            engine
                .write_file("input.mov", b"moov-bytes")
                .await
                .expect("write");
            engine
                .exec(&crate::args::stream_copy("input.mov", "output.mp4"))
                .await
                .expect("exec");
            let output = engine.read_file("output.mp4").await.expect("read");
            assert_eq!(output, b"moov-bytes");

            let mut saw_duration = false;
            let mut saw_done = false;
            while let Ok(event) = events.try_recv() {
                match event {
                    EngineEvent::Log(line) if line.contains("Duration") => saw_duration = true,
                    EngineEvent::Progress(p) if p >= 1.0 => saw_done = true,
                    _ => {}
                }
            }
            assert!(saw_duration, "stderr should be forwarded as log events");
            assert!(saw_done, "progress=end should report completion");

            engine.delete_file("input.mov").await.expect("delete input");
            engine.delete_file("output.mp4").await.expect("delete output");
            assert!(!engine.scratch_dir().join("input.mov").exists());
        }

        #[tokio::test]
        async fn non_zero_exit_is_an_execution_failure() {
            let dir = tempfile::tempdir().expect("tempdir");
            let engine = engine_with(&fake_ffmpeg(dir.path(), true));
            engine.load(&EngineAssets::default()).await.expect("load");
            engine
                .write_file("input.mov", b"moov-bytes")
                .await
                .expect("write");

            let err = engine
                .exec(&crate::args::stream_copy("input.mov", "output.mp4"))
                .await
                .expect_err("copy rejected");
            assert_eq!(err.kind(), EngineErrorKind::ExecutionFailed);
            assert!(err.message.contains("Could not find tag"));
        }
    }
}
