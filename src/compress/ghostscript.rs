// Lossy PDF rewriting via the Ghostscript CLI

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use super::{Compressor, pdf_settings};
use crate::config::request::CompressionProfile;
use crate::config::settings::CompressionSettings;
use crate::error::ResizeError;

/// How often a running tool is checked for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs Ghostscript's `pdfwrite` device over a document.
///
/// Every call works in its own scratch directory (random name, so concurrent
/// calls never share files) holding `input.pdf` and `output.pdf`. The
/// directory is removed when the call returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct GhostscriptCompressor {
    command: String,
    leading_args: Vec<String>,
    compatibility_level: String,
    timeout: Duration,
    temp_root: Option<PathBuf>,
}

impl GhostscriptCompressor {
    pub fn new(command: impl Into<String>) -> Self {
        Self::from_settings(&CompressionSettings {
            command: command.into(),
            ..CompressionSettings::default()
        })
    }

    pub fn from_settings(settings: &CompressionSettings) -> Self {
        Self {
            command: settings.command.clone(),
            leading_args: settings.args.clone(),
            compatibility_level: settings.compatibility_level.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            temp_root: settings.temp_dir.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    /// Full argument list for one invocation.
    pub fn build_args(&self, input: &Path, output: &Path, pdf_setting: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.leading_args.iter().map(OsString::from).collect();
        args.push("-sDEVICE=pdfwrite".into());
        args.push(format!("-dCompatibilityLevel={}", self.compatibility_level).into());
        args.push(format!("-dPDFSETTINGS={pdf_setting}").into());
        args.push("-dNOPAUSE".into());
        args.push("-dQUIET".into());
        args.push("-dBATCH".into());

        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(output);
        args.push(output_arg);
        args.push(input.into());
        args
    }

    fn scratch_dir(&self) -> crate::error::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdf_resize-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| {
            ResizeError::resource(format!("failed to create temporary directory: {e}"))
        })
    }

    fn compress_in(
        &self,
        scratch: &Path,
        pdf: &[u8],
        pdf_setting: &str,
    ) -> crate::error::Result<Vec<u8>> {
        let input = scratch.join("input.pdf");
        let output = scratch.join("output.pdf");

        std::fs::write(&input, pdf).map_err(|e| {
            ResizeError::resource(format!("failed to write temporary input: {e}"))
        })?;

        self.run(&self.build_args(&input, &output, pdf_setting))?;

        let bytes = std::fs::read(&output).map_err(|e| {
            ResizeError::compression(format!(
                "{} produced no readable output: {e}",
                self.command
            ))
        })?;
        if bytes.is_empty() {
            return Err(ResizeError::compression(format!(
                "{} produced an empty output file",
                self.command
            )));
        }

        // A truncated or garbled rewrite must not pass as a result
        lopdf::Document::load_mem(&bytes).map_err(|e| {
            ResizeError::compression(format!("{} produced an unreadable PDF: {e}", self.command))
        })?;

        Ok(bytes)
    }

    /// Runs the tool to completion or until the timeout elapses.
    fn run(&self, args: &[OsString]) -> crate::error::Result<()> {
        let mut child = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ResizeError::compression(format!("failed to execute {}: {e}", self.command))
            })?;

        // Drain stderr on a separate thread so a chatty tool cannot block on a full pipe
        let stderr_pipe = child.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });

        let Some(status) = wait_with_timeout(&mut child, self.timeout).map_err(|e| {
            ResizeError::compression(format!("failed to wait for {}: {e}", self.command))
        })?
        else {
            tracing::warn!(command = %self.command, timeout = ?self.timeout, "compression tool timed out");
            return Err(ResizeError::compression(format!(
                "{} timed out after {:?} and was terminated",
                self.command, self.timeout
            )));
        };

        let stderr = stderr_reader.join().unwrap_or_default();
        if status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&stderr);
        Err(ResizeError::compression(format!(
            "{} failed (exit code {}): {}",
            self.command,
            status
                .code()
                .map_or_else(|| "unknown".to_string(), |c| c.to_string()),
            stderr.trim()
        )))
    }
}

impl Compressor for GhostscriptCompressor {
    fn compress(&self, pdf: &[u8], profile: CompressionProfile) -> crate::error::Result<Vec<u8>> {
        let pdf_setting = pdf_settings(profile).ok_or_else(|| {
            ResizeError::invalid_input("compression profile 'none' does not invoke a tool")
        })?;

        let scratch = self.scratch_dir()?;
        tracing::debug!(
            command = %self.command,
            profile = %profile,
            scratch = %scratch.path().display(),
            "running compression tool"
        );

        let result = self.compress_in(scratch.path(), pdf, pdf_setting);

        // Dropping the TempDir also removes it; closing surfaces the error
        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "failed to remove compression scratch directory");
        }

        if let Ok(bytes) = &result {
            tracing::debug!(from = pdf.len(), to = bytes.len(), "document compressed");
        }
        result
    }
}

/// Process control needed to wait on a tool with a deadline.
trait ToolProcess {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> std::io::Result<()>;
    fn wait(&mut self) -> std::io::Result<ExitStatus>;
}

impl ToolProcess for Child {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Waits for `child`, killing it once `timeout` has elapsed.
///
/// Returns `None` when the child was killed. The child is also killed and
/// reaped when its status cannot be polled.
fn wait_with_timeout(
    child: &mut impl ToolProcess,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                terminate(child);
                return Err(e);
            }
        }
        if Instant::now() >= deadline {
            terminate(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &mut impl ToolProcess) {
    let _ = child.kill();
    let _ = child.wait();
}
