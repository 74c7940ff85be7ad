use crate::models::{PageJob, PageRange};
use crate::pipeline::launcher::WorkerLauncher;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Workers allowed to run at once; `None` launches every page immediately
    pub max_concurrency: Option<usize>,
    /// Dispatcher-side deadline per worker, on top of the worker's own render timeout
    pub worker_timeout: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: Some(4),
            worker_timeout: Some(Duration::from_secs(180)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkerFailure {
    pub page: u32,
    pub diagnostic: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: Vec<WorkerFailure>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fans a page range out to isolated workers through a bounded pool
pub struct Dispatcher<L> {
    launcher: Arc<L>,
    settings: DispatchSettings,
}

impl<L: WorkerLauncher + 'static> Dispatcher<L> {
    pub fn new(launcher: L, settings: DispatchSettings) -> Self {
        Self {
            launcher: Arc::new(launcher),
            settings,
        }
    }

    /// Run one worker per page of `range`, each writing into `output_dir`.
    ///
    /// A failing, crashing or overdue worker is recorded in the report and
    /// never affects its siblings. Nothing is retried.
    pub async fn dispatch(
        &self,
        base_url: &str,
        range: PageRange,
        output_dir: &Path,
    ) -> Result<DispatchReport, DispatchError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| DispatchError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let jobs = range.jobs(base_url);
        let slots = self
            .settings
            .max_concurrency
            .filter(|n| *n > 0)
            .unwrap_or(jobs.len())
            .max(1);
        let pool = Arc::new(Semaphore::new(slots));

        info!(
            "🚀 Launching {} {} workers ({} at a time), CSV files go to {}",
            jobs.len(),
            self.launcher.name(),
            slots,
            output_dir.display()
        );

        let mut workers = Vec::with_capacity(jobs.len());
        for job in jobs {
            let page = job.page;
            let pool = Arc::clone(&pool);
            let launcher = Arc::clone(&self.launcher);
            let output_dir = output_dir.to_path_buf();
            let deadline = self.settings.worker_timeout;

            let handle = tokio::spawn(async move {
                let _slot = pool
                    .acquire_owned()
                    .await
                    .map_err(|_| "worker pool closed".to_string())?;
                run_worker(launcher.as_ref(), &job, &output_dir, deadline).await
            });
            workers.push((page, handle));
        }

        info!("All workers queued. Waiting for them to complete...");

        let mut report = DispatchReport::default();
        for (page, handle) in workers {
            let outcome = handle
                .await
                .unwrap_or_else(|e| Err(format!("worker task aborted: {}", e)));
            match outcome {
                Ok(()) => {
                    info!("✅ Page {} finished", page);
                    report.succeeded += 1;
                }
                Err(diagnostic) => {
                    error!("❌ Worker for page {} failed: {}", page, diagnostic);
                    report.failed.push(WorkerFailure { page, diagnostic });
                }
            }
        }

        info!(
            "All scraping jobs finished: {} succeeded, {} failed",
            report.succeeded,
            report.failed.len()
        );
        Ok(report)
    }
}

/// Launch one worker and reduce its outcome to success or a diagnostic
async fn run_worker<L: WorkerLauncher>(
    launcher: &L,
    job: &PageJob,
    output_dir: &Path,
    deadline: Option<Duration>,
) -> Result<(), String> {
    debug!("Starting worker for page {}", job.page);

    let launched = launcher.launch(job, output_dir);
    let result = match deadline {
        Some(limit) => {
            let outcome = tokio::time::timeout(limit, launched).await;
            match outcome {
                Ok(result) => result,
                Err(_) => {
                    // the pool slot stays held until the worker is really gone
                    if let Err(e) = launcher.stop(job).await {
                        warn!("Could not stop overdue worker for page {}: {:#}", job.page, e);
                    }
                    return Err(format!("worker exceeded its {:?} deadline and was stopped", limit));
                }
            }
        }
        None => launched.await,
    };

    match result {
        Ok(output) if output.success() => Ok(()),
        Ok(output) => Err(output.diagnostic()),
        Err(e) => Err(format!("failed to launch worker: {:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::launcher::WorkerOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const BASE: &str = "https://www.rumah123.com/jual/depok/rumah/";

    /// Writes a marker file per page; pages listed in `failing` exit 1 and
    /// pages in `hanging` never finish
    #[derive(Default)]
    struct FakeLauncher {
        failing: Vec<u32>,
        hanging: Vec<u32>,
        delay: Duration,
        launched: Mutex<Vec<u32>>,
        stopped: Mutex<Vec<u32>>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl WorkerLauncher for FakeLauncher {
        async fn launch(&self, job: &PageJob, output_dir: &Path) -> anyhow::Result<WorkerOutput> {
            self.launched.lock().unwrap().push(job.page);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if self.hanging.contains(&job.page) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&job.page) {
                return Ok(WorkerOutput {
                    code: Some(1),
                    stdout: String::new(),
                    stderr: format!("Timeout Error on page {}", job.page),
                });
            }
            std::fs::write(output_dir.join(format!("page_{}.csv", job.page)), "price\n1\n")?;
            Ok(WorkerOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }

        async fn stop(&self, job: &PageJob) -> anyhow::Result<()> {
            self.stopped.lock().unwrap().push(job.page);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn unbounded() -> DispatchSettings {
        DispatchSettings {
            max_concurrency: None,
            worker_timeout: None,
        }
    }

    #[tokio::test]
    async fn one_launch_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(FakeLauncher::default(), unbounded());

        let report = dispatcher
            .dispatch(BASE, PageRange::new(1, 6), dir.path())
            .await
            .unwrap();

        let mut launched = dispatcher.launcher.launched.lock().unwrap().clone();
        launched.sort();
        assert_eq!(launched, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(report.succeeded, 6);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn failing_worker_does_not_affect_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher {
            failing: vec![3],
            ..FakeLauncher::default()
        };
        let dispatcher = Dispatcher::new(launcher, unbounded());

        let report = dispatcher
            .dispatch(BASE, PageRange::new(1, 4), dir.path())
            .await
            .unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].page, 3);
        assert!(report.failed[0].diagnostic.contains("Timeout Error on page 3"));
        for page in [1, 2, 4] {
            assert!(dir.path().join(format!("page_{}.csv", page)).exists());
        }
        assert!(!dir.path().join("page_3.csv").exists());
    }

    #[tokio::test]
    async fn pool_never_exceeds_its_cap() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher {
            delay: Duration::from_millis(20),
            ..FakeLauncher::default()
        };
        let settings = DispatchSettings {
            max_concurrency: Some(2),
            worker_timeout: None,
        };
        let dispatcher = Dispatcher::new(launcher, settings);

        let report = dispatcher
            .dispatch(BASE, PageRange::new(1, 8), dir.path())
            .await
            .unwrap();

        assert_eq!(report.succeeded, 8);
        assert!(dispatcher.launcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn overdue_worker_is_reported_and_siblings_finish() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher {
            hanging: vec![2],
            ..FakeLauncher::default()
        };
        let settings = DispatchSettings {
            max_concurrency: None,
            worker_timeout: Some(Duration::from_millis(100)),
        };
        let dispatcher = Dispatcher::new(launcher, settings);

        let report = dispatcher
            .dispatch(BASE, PageRange::new(1, 3), dir.path())
            .await
            .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].page, 2);
        assert!(report.failed[0].diagnostic.contains("deadline"));
        assert_eq!(*dispatcher.launcher.stopped.lock().unwrap(), vec![2]);
    }

    #[cfg(unix)]
    mod overdue_cleanup {
        use super::*;
        use crate::pipeline::launcher::{DockerLauncher, ProcessLauncher};
        use std::os::unix::fs::PermissionsExt;

        fn tight_deadline() -> DispatchSettings {
            DispatchSettings {
                max_concurrency: Some(1),
                worker_timeout: Some(Duration::from_millis(300)),
            }
        }

        /// Stands in for `docker`: `run` leaves background work behind the
        /// way a detached container would, `rm` ends it
        fn fake_docker(state: &Path) -> PathBuf {
            let script = format!(
                r#"#!/bin/sh
case "$1" in
  run)
    (sleep 1; touch "{state}/late.csv") &
    echo $! > "{state}/container.pid"
    wait
    ;;
  rm)
    echo "$3" > "{state}/removed"
    kill "$(cat "{state}/container.pid")"
    ;;
esac
"#,
                state = state.display()
            );
            let path = state.join("docker");
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn overdue_container_is_removed_before_its_slot_frees() {
            let state = tempfile::tempdir().unwrap();
            let output = tempfile::tempdir().unwrap();
            let docker = fake_docker(state.path());
            let launcher = DockerLauncher::with_cli(docker.display().to_string(), "rumah123-scraper");
            let dispatcher = Dispatcher::new(launcher, tight_deadline());

            let report = dispatcher
                .dispatch(BASE, PageRange::new(1, 1), output.path())
                .await
                .unwrap();
            assert_eq!(report.failed.len(), 1);

            let removed = std::fs::read_to_string(state.path().join("removed")).unwrap();
            assert_eq!(removed.trim(), format!("rumah-scout-page-1-{}", std::process::id()));

            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert!(!state.path().join("late.csv").exists());
        }

        #[tokio::test]
        async fn overdue_process_takes_its_whole_group_down() {
            let output = tempfile::tempdir().unwrap();
            // $5 is the --output-dir value appended after `worker <url> <page>`
            let launcher = ProcessLauncher::new(
                "/bin/sh",
                vec![
                    "-c".to_string(),
                    r#"(sleep 1; touch "$5/late.csv") & wait"#.to_string(),
                    "sh".to_string(),
                ],
            );
            let dispatcher = Dispatcher::new(launcher, tight_deadline());

            let report = dispatcher
                .dispatch(BASE, PageRange::new(1, 1), output.path())
                .await
                .unwrap();
            assert_eq!(report.failed.len(), 1);
            assert!(report.failed[0].diagnostic.contains("deadline"));

            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert!(!output.path().join("late.csv").exists());
        }
    }

    #[tokio::test]
    async fn creates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("output").join("depok");
        let dispatcher = Dispatcher::new(FakeLauncher::default(), DispatchSettings::default());

        dispatcher
            .dispatch(BASE, PageRange::new(1, 1), &nested)
            .await
            .unwrap();
        assert!(nested.join("page_1.csv").exists());

        // running again into the existing directory is fine
        dispatcher
            .dispatch(BASE, PageRange::new(1, 1), &nested)
            .await
            .unwrap();
    }
}
