//! Test matrix orchestration.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use testgrid_client::ExecutionService;
use testgrid_core::{EvaluatorRegistry, ProgressEvent, RunId, TaskDescriptor};

use crate::config::{AbortPolicy, LateEvents, RunnerConfig};
use crate::error::{JobError, RunnerError};
use crate::hooks::{ProgressSink, ResultHook};
use crate::job::Job;
use crate::scheduler::Scheduler;

/// Runs every browser × URL combination and aggregates the verdicts.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use testgrid_client::{HttpExecutionService, ServiceConfig};
/// use testgrid_runner::{RunnerConfig, TestRunner, TracingSink};
///
/// async fn run() -> Result<(), Box<dyn std::error::Error>> {
///     let service = HttpExecutionService::new(ServiceConfig::default())?;
///     let config = RunnerConfig::from_json(r#"{
///         "framework": "qunit",
///         "throttle": 2,
///         "browsers": [{"browserName": "chrome"}],
///         "urls": ["http://localhost:9999/test.html"]
///     }"#)?;
///
///     let passed = TestRunner::new(config, Arc::new(service))
///         .with_progress_sink(TracingSink)
///         .run_tests()
///         .await?;
///
///     println!("passed: {}", passed);
///     Ok(())
/// }
/// ```
pub struct TestRunner {
    config: Arc<RunnerConfig>,
    service: Arc<dyn ExecutionService>,
    evaluators: Arc<EvaluatorRegistry>,
    progress: Option<Arc<dyn ProgressSink>>,
    result_hook: Option<Arc<dyn ResultHook>>,
}

impl TestRunner {
    /// Create a runner using the built-in framework evaluators.
    pub fn new(config: RunnerConfig, service: Arc<dyn ExecutionService>) -> Self {
        Self {
            config: Arc::new(config),
            service,
            evaluators: Arc::new(EvaluatorRegistry::with_builtins()),
            progress: None,
            result_hook: None,
        }
    }

    /// Builder method to replace the evaluator registry.
    pub fn with_evaluators(mut self, evaluators: EvaluatorRegistry) -> Self {
        self.evaluators = Arc::new(evaluators);
        self
    }

    /// Builder method to receive progress events.
    pub fn with_progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    /// Builder method to post-process every completed job's result.
    pub fn with_result_hook(mut self, hook: impl ResultHook + 'static) -> Self {
        self.result_hook = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Every browser × URL combination this runner will execute.
    pub fn descriptors(&self) -> Vec<TaskDescriptor> {
        TaskDescriptor::matrix(&self.config.browsers, &self.config.urls)
    }

    /// Run the whole matrix.
    ///
    /// Resolves with `true` iff every job passed. The first fatal job error
    /// is returned as soon as it is observed, without waiting for the jobs
    /// still in flight. With [`AbortPolicy::Detach`] those keep running in
    /// the background and their results are dropped.
    pub async fn run_tests(&self) -> Result<bool, RunnerError> {
        let run_id = RunId::generate();
        let descriptors = self.descriptors();
        let total_jobs = descriptors.len();

        info!(
            run_id = %run_id,
            total_jobs,
            throttle = ?self.config.throttle,
            framework = %self.config.framework,
            "Starting test run"
        );

        let settled = Arc::new(AtomicBool::new(false));
        let ctx = Arc::new(TaskContext {
            config: self.config.clone(),
            service: self.service.clone(),
            evaluators: self.evaluators.clone(),
            progress: Progress {
                sink: self.progress.clone(),
                late_events: self.config.late_events,
                settled: settled.clone(),
            },
            result_hook: self.result_hook.clone(),
            cancel: CancellationToken::new(),
            total_jobs,
            started_jobs: AtomicUsize::new(0),
        });

        if total_jobs == 0 {
            warn!(run_id = %run_id, "No browser/URL combinations configured");
        }

        let scheduler = Scheduler::new(self.config.throttle);
        let run_task = scheduler.wrap({
            let ctx = ctx.clone();
            move |descriptor: TaskDescriptor| {
                let ctx = ctx.clone();
                async move { ctx.run_task(descriptor).await }
            }
        });

        let mut pending: FuturesUnordered<_> = descriptors.into_iter().map(run_task).collect();

        let mut passed = true;
        let outcome = loop {
            match pending.next().await {
                None => break Ok(passed),
                Some(Ok(Ok(verdict))) => passed &= verdict,
                Some(Ok(Err(e))) => break Err(e),
                Some(Err(join_error)) => break Err(RunnerError::TaskPanicked(join_error.to_string())),
            }
        };
        ctx.progress.settle();

        match outcome {
            Ok(passed) => {
                info!(run_id = %run_id, total_jobs, passed, "Test run completed");
                ctx.progress.emit_final(ProgressEvent::TestCompleted { passed });
                Ok(passed)
            }
            Err(e) => {
                let orphaned = pending.len();
                error!(run_id = %run_id, error = %e, orphaned, "Test run aborted");
                match self.config.on_abort {
                    AbortPolicy::Detach => {
                        debug!(orphaned, "Leaving in-flight jobs running in the background");
                    }
                    AbortPolicy::Cancel => ctx.cancel.cancel(),
                }
                Err(e)
            }
        }
    }
}

/// Progress emission for one run.
struct Progress {
    sink: Option<Arc<dyn ProgressSink>>,
    late_events: LateEvents,
    settled: Arc<AtomicBool>,
}

impl Progress {
    fn emit(&self, event: ProgressEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        if self.late_events == LateEvents::Suppress && self.settled.load(Ordering::SeqCst) {
            debug!(event = event.name(), "Dropping progress event after run settled");
            return;
        }
        sink.emit(&event);
    }

    fn emit_final(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(&event);
        }
    }

    fn settle(&self) {
        self.settled.store(true, Ordering::SeqCst);
    }
}

/// State shared by every job task of one run.
struct TaskContext {
    config: Arc<RunnerConfig>,
    service: Arc<dyn ExecutionService>,
    evaluators: Arc<EvaluatorRegistry>,
    progress: Progress,
    result_hook: Option<Arc<dyn ResultHook>>,
    cancel: CancellationToken,
    total_jobs: usize,
    started_jobs: AtomicUsize,
}

impl TaskContext {
    async fn run_task(&self, descriptor: TaskDescriptor) -> Result<bool, RunnerError> {
        let job = Job::new(
            self.config.clone(),
            descriptor.clone(),
            self.service.clone(),
            self.evaluators.clone(),
        )
        .with_cancellation(self.cancel.clone());

        self.drive(job).await.map_err(|source| RunnerError::Job {
            url: descriptor.url().to_string(),
            platform: descriptor.browser().clone(),
            source,
        })
    }

    async fn drive(&self, mut job: Job) -> Result<bool, JobError> {
        job.start().await?;
        let started_jobs = self.started_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.emit(ProgressEvent::JobStarted {
            total_jobs: self.total_jobs,
            started_jobs,
        });

        let result = job.get_result().await?;
        let mut passed = result.passed;

        if let Some(hook) = &self.result_hook {
            if let Some(verdict) = hook.on_result(result.clone()).await.map_err(JobError::Hook)? {
                debug!(
                    url = %result.url,
                    evaluated = passed,
                    overridden = verdict,
                    "Result hook overrode verdict"
                );
                passed = verdict;
            }
        }

        self.progress.emit(ProgressEvent::JobCompleted {
            url: result.url,
            platform: result.platform,
            passed,
            tunnel_id: job.tunnel_id().map(str::to_string),
        });

        Ok(passed)
    }
}
