//! Isolated worker processes, one per page job.

use crate::models::PageJob;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one worker process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl WorkerOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short failure description: exit status plus the tail of stderr
    pub fn diagnostic(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let output = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        let tail: Vec<&str> = output.lines().rev().take(20).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        if tail.is_empty() {
            status
        } else {
            format!("{}: {}", status, tail.join("\n"))
        }
    }
}

/// Starts a worker that scrapes one page into `output_dir`.
/// Workers share nothing with the caller except that directory.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, job: &PageJob, output_dir: &Path) -> Result<WorkerOutput>;

    /// Tear down whatever `launch` left running for `job` after its future
    /// was dropped. Dropping only kills the direct child.
    async fn stop(&self, _job: &PageJob) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Spawn `command`, report the child's pid, and collect its output
async fn run(mut command: Command, on_spawn: impl FnOnce(Option<u32>) + Send) -> Result<WorkerOutput> {
    debug!("Spawning {:?}", command.as_std());
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let program = command.as_std().get_program().to_owned();
    let child = command
        .spawn()
        .with_context(|| format!("Failed to spawn {:?}", program))?;
    on_spawn(child.id());

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("Failed to wait for {:?}", program))?;

    Ok(WorkerOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs each page in a throwaway container of the worker image:
/// `docker run --rm --name {name} -v {output_dir}:/app/output {image} {base_url} {page}`
///
/// The container is not a child of this process, so an overdue worker is
/// removed by name with `docker rm -f`.
pub struct DockerLauncher {
    docker: String,
    image: String,
}

impl DockerLauncher {
    pub fn new(image: impl Into<String>) -> Self {
        Self::with_cli("docker", image)
    }

    /// Use another docker-compatible CLI, e.g. `podman`
    pub fn with_cli(docker: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            docker: docker.into(),
            image: image.into(),
        }
    }

    /// Unique per page and per orchestrator process
    fn container_name(&self, job: &PageJob) -> String {
        format!("rumah-scout-page-{}-{}", job.page, std::process::id())
    }

    fn command(&self, job: &PageJob, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.docker);
        command
            .arg("run")
            .arg("--rm")
            .arg("--name")
            .arg(self.container_name(job))
            .arg("-v")
            .arg(format!("{}:/app/output", output_dir.display()))
            .arg(&self.image)
            .arg(&job.base_url)
            .arg(job.page.to_string());
        command
    }
}

#[async_trait]
impl WorkerLauncher for DockerLauncher {
    async fn launch(&self, job: &PageJob, output_dir: &Path) -> Result<WorkerOutput> {
        // bind mounts need an absolute host path
        let output_dir = tokio::fs::canonicalize(output_dir)
            .await
            .with_context(|| format!("Failed to resolve {}", output_dir.display()))?;
        run(self.command(job, &output_dir), |_| {}).await
    }

    async fn stop(&self, job: &PageJob) -> Result<()> {
        let name = self.container_name(job);
        let status = Command::new(&self.docker)
            .arg("rm")
            .arg("-f")
            .arg(&name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to run {} rm", self.docker))?;
        if !status.success() {
            bail!("could not remove container {} ({})", name, status);
        }
        debug!("Removed container {}", name);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}

/// Runs each page as a child process of this binary:
/// `{program} {extra_args..} worker {base_url} {page} --output-dir {output_dir}`
///
/// Each worker leads its own process group so that its browser goes down
/// with it.
pub struct ProcessLauncher {
    program: PathBuf,
    extra_args: Vec<String>,
    /// Process group of each running worker, keyed by page
    groups: Mutex<HashMap<u32, u32>>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Launch workers through the currently running executable
    pub fn current_exe(extra_args: Vec<String>) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to locate the running executable")?;
        Ok(Self::new(program, extra_args))
    }

    fn command(&self, job: &PageJob, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.extra_args)
            .arg("worker")
            .arg(&job.base_url)
            .arg(job.page.to_string())
            .arg("--output-dir")
            .arg(output_dir);
        #[cfg(unix)]
        command.process_group(0);
        command
    }

    fn groups(&self) -> std::sync::MutexGuard<'_, HashMap<u32, u32>> {
        self.groups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// SIGKILL every process in group `pgid`
async fn kill_group(pgid: u32) -> Result<()> {
    let status = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{}", pgid))
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("Failed to run kill")?;
    if !status.success() {
        bail!("could not kill process group {} ({})", pgid, status);
    }
    Ok(())
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, job: &PageJob, output_dir: &Path) -> Result<WorkerOutput> {
        let page = job.page;
        let output = run(self.command(job, output_dir), |pid| {
            if let Some(pid) = pid {
                self.groups().insert(page, pid);
            }
        })
        .await;
        self.groups().remove(&page);
        output
    }

    async fn stop(&self, job: &PageJob) -> Result<()> {
        let pgid = self.groups().remove(&job.page);
        let Some(pgid) = pgid else {
            return Ok(());
        };
        kill_group(pgid).await?;
        debug!("Killed process group {} of page {}", pgid, job.page);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
