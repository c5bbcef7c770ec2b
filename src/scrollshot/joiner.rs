use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::Instant;

use crate::error::{Result, ScrollshotError};
use crate::settings::StitchSettings;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// One stitch job: every frame in `frames_dir`, composited into `output_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub frames_dir: PathBuf,
    pub output_path: PathBuf,
    pub settings: StitchSettings,
}

impl JoinRequest {
    /// Command line understood by the chat joiner, in the order it parses them.
    pub fn args(&self) -> Vec<OsString> {
        let s = &self.settings;
        let mut args: Vec<OsString> = vec![self.frames_dir.clone().into_os_string()];
        let flags: [(&str, String); 8] = [
            ("--n_rows_in_crop", s.rows_per_crop.to_string()),
            ("--n_cols_in_crop", s.cols_per_crop.to_string()),
            ("--denoising_factor", s.denoising_factor.to_string()),
            ("--match_score_threshold", s.match_score_threshold.to_string()),
            ("--left_crop_from", s.left_crop_from.to_string()),
            ("--right_crop_from", s.right_crop_from.to_string()),
            ("--left_crop_to", s.left_crop_to.to_string()),
            ("--right_crop_to", s.right_crop_to.to_string()),
        ];
        for (flag, value) in flags {
            args.push(flag.into());
            args.push(value.into());
        }
        args.push("-o".into());
        args.push(self.output_path.clone().into_os_string());
        args
    }
}

/// Turns a directory of overlapping frames into one tall image.
#[async_trait]
pub trait ImageJoiner: Send + Sync {
    async fn join(&self, request: &JoinRequest) -> Result<()>;
}

/// Runs the bundled `chatjoiner` executable as a child process.
#[derive(Debug, Clone)]
pub struct ChatJoiner {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl ChatJoiner {
    #[cfg(windows)]
    pub const EXECUTABLE: &'static str = "chatjoiner.exe";
    #[cfg(not(windows))]
    pub const EXECUTABLE: &'static str = "chatjoiner";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the job's own, e.g. a script path when `program`
    /// is an interpreter.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Finds the executable inside `dir`.
    pub fn locate(dir: &Path) -> Result<Self> {
        let program = dir.join(Self::EXECUTABLE);
        if !program.is_file() {
            log_warn!("invalid path to chatjoiner executable: {}", program.display());
            return Err(ScrollshotError::JoinerUnavailable(program));
        }
        Ok(Self::new(program))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ImageJoiner for ChatJoiner {
    async fn join(&self, request: &JoinRequest) -> Result<()> {
        request.settings.validate()?;

        let args = request.args();
        log_info!(
            "> {} {}",
            self.program.display(),
            self.leading_args
                .iter()
                .chain(args.iter())
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    ScrollshotError::JoinerUnavailable(self.program.clone())
                } else {
                    ScrollshotError::stitch_failed(format!("could not start joiner: {err}"))
                }
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, _, _) = tokio::join!(
            child.wait(),
            forward_lines(stdout, false),
            forward_lines(stderr, true)
        );
        let status = status?;

        log_info!("joiner exited with {status}");
        if !status.success() {
            return Err(ScrollshotError::stitch_failed(format!("joiner exited with {status}")));
        }

        log_info!(
            "saved result image {} in {:.2}s",
            request.output_path.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

/// Logs the child's output line by line until it closes the stream. Lines need
/// not be UTF-8; the pipe is drained to the end either way.
async fn forward_lines<R>(stream: Option<R>, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if is_stderr {
                    log_warn!("joiner stderr: {line}");
                } else {
                    log_info!("joiner: {line}");
                }
            }
            Err(err) => {
                log_warn!("stopped reading joiner output: {err}");
                break;
            }
        }
    }
}
