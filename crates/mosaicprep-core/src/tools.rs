//! Typed invocation of the external collaborators (point-source fitter,
//! mosaicker). Commands are explicit argument vectors with a captured exit
//! status, stdout/stderr, and a polled timeout; no shell strings are built
//! anywhere.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::config::ToolsConfig;
use crate::error::{PrepError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One external tool invocation.
#[derive(Clone, Debug)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

/// Captured result of a finished invocation.
#[derive(Clone, Debug)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion, killing the child if the timeout elapses.
    pub fn run(&self) -> Result<ToolOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PrepError::Tool {
                program: self.program.display().to_string(),
                message: format!("spawn failed: {}", e),
            })?;

        // Drain the pipes on threads so a chatty child cannot fill a pipe
        // and deadlock against the poll loop.
        let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
        let stdout_thread = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout_pipe.read_to_string(&mut buf);
            buf
        });
        let stderr_thread = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf);
            buf
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if let Some(timeout) = self.timeout {
                        if started.elapsed() > timeout {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(PrepError::Tool {
                                program: self.program.display().to_string(),
                                message: format!("timed out after {:?}", timeout),
                            });
                        }
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        Ok(ToolOutput {
            status: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

/// Command line for the external point-source fitter on one frame.
pub fn detector_command(
    cfg: &ToolsConfig,
    image: &Path,
    noise: &Path,
    mask: &Path,
    star_list: &Path,
    output_dir: &Path,
) -> ToolCommand {
    ToolCommand::new(&cfg.detector)
        .arg("-i")
        .path_arg(image)
        .arg("-s")
        .path_arg(noise)
        .arg("-d")
        .path_arg(mask)
        .arg("-u")
        .path_arg(star_list)
        .arg("-O")
        .path_arg(output_dir)
        .timeout(Duration::from_secs(cfg.timeout_s))
}

/// Command line for the external mosaicker over one channel's lists.
pub fn mosaic_command(
    cfg: &ToolsConfig,
    image_list: &Path,
    noise_list: &Path,
    mask_list: &Path,
    output_dir: &Path,
) -> ToolCommand {
    ToolCommand::new(&cfg.mosaicker)
        .arg("-I")
        .path_arg(image_list)
        .arg("-S")
        .path_arg(noise_list)
        .arg("-d")
        .path_arg(mask_list)
        .arg("-e")
        .arg(cfg.mosaic_edge_pixels.to_string())
        .arg("-O")
        .path_arg(output_dir)
        .timeout(Duration::from_secs(cfg.timeout_s))
}
