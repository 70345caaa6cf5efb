//! Bounded-concurrency fan-out/fan-in over page jobs.
//!
//! [`PageJobScheduler::run`] drives one round of jobs (all transcriptions,
//! or all translations) through at most `max_workers` concurrent units of
//! work and returns a [`ResultSet`] whose position `i` belongs to job `i`.
//!
//! ## Ordering
//!
//! Remote latency varies per page, so under concurrency jobs finish in any
//! order. Each in-flight future carries its batch position and the result is
//! dropped into that slot on arrival; arrival order is never observable in
//! the output.
//!
//! ## Failure containment
//!
//! A unit of work that returns `Err` or panics yields a failed
//! [`JobResult`] with text `"<Label> error: <message>"`. The error stops at
//! this boundary: siblings keep running and the caller never sees an `Err`.
//!
//! ## Sequential mode
//!
//! `max_workers == 1` is the same code path with a pool of one. Jobs then
//! run strictly in submission order with an optional fixed pause between
//! consecutive requests.

use crate::config::PipelineConfig;
use crate::output::{Job, JobKind, JobResult, ResultSet, ResultSlots};
use crate::progress::{ProgressCallback, ProgressHandle};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Executes a batch of independent jobs with bounded concurrency.
#[derive(Clone)]
pub struct PageJobScheduler {
    max_workers: usize,
    request_pause: Duration,
    progress: Option<ProgressHandle>,
}

impl fmt::Debug for PageJobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageJobScheduler")
            .field("max_workers", &self.max_workers)
            .field("request_pause", &self.request_pause)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn ProgressCallback>"))
            .finish()
    }
}

impl PageJobScheduler {
    /// A scheduler running at most `max_workers` jobs at once (minimum 1).
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            request_pause: Duration::ZERO,
            progress: None,
        }
    }

    /// Scheduler settings taken from a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_workers)
            .with_request_pause(config.request_pause)
            .with_progress(config.progress.clone())
    }

    /// Pause inserted between consecutive jobs in sequential mode.
    pub fn with_request_pause(mut self, pause: Duration) -> Self {
        self.request_pause = pause;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressHandle>) -> Self {
        self.progress = progress;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of jobs that will be in flight at once for a batch of `jobs`.
    pub fn pool_size(&self, jobs: usize) -> usize {
        self.max_workers.min(jobs).max(1)
    }

    /// Run every job to completion and collect the results by position.
    ///
    /// `work` is the per-job unit of work, typically a call into a
    /// [`crate::pipeline::llm::Transcriber`] or
    /// [`crate::pipeline::llm::Translator`]. The returned set has exactly
    /// `jobs.len()` entries and `result[i].index == jobs[i].index`.
    pub async fn run<P, F, Fut, E>(&self, jobs: Vec<Job<P>>, work: F) -> ResultSet
    where
        F: Fn(Job<P>) -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: fmt::Display,
    {
        let total = jobs.len();
        let Some(kind) = jobs.first().map(|j| j.kind) else {
            debug!("Scheduler received an empty batch");
            return ResultSet::default();
        };

        let indices: Vec<usize> = jobs.iter().map(|j| j.index).collect();
        let workers = self.pool_size(total);
        let pause = if self.max_workers == 1 {
            self.request_pause
        } else {
            Duration::ZERO
        };
        let progress: Option<&dyn ProgressCallback> = self.progress.as_deref();

        info!(
            "{} round: {} jobs, {} workers{}",
            kind,
            total,
            workers,
            if workers == 1 { " (sequential)" } else { "" }
        );
        if let Some(cb) = progress {
            cb.on_round_start(kind, total);
        }

        let start = Instant::now();
        let completed = AtomicUsize::new(0);
        let completed = &completed;
        let work = &work;

        let mut finished = stream::iter(jobs.into_iter().enumerate())
            .map(|(position, job)| async move {
                if position > 0 && !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }

                let index = job.index;
                let job_kind = job.kind;
                if let Some(cb) = progress {
                    cb.on_job_started(job_kind, index, total);
                }

                let job_start = Instant::now();
                let outcome = AssertUnwindSafe(async move { work(job).await })
                    .catch_unwind()
                    .await;

                let result = match outcome {
                    Ok(Ok(text)) => JobResult::ok(index, text),
                    Ok(Err(e)) => {
                        warn!("{} job for page {} failed: {}", job_kind, index + 1, e);
                        JobResult::failed(job_kind, index, e)
                    }
                    Err(panic) => {
                        let msg = panic_message(panic.as_ref());
                        warn!("{} job for page {} panicked: {}", job_kind, index + 1, msg);
                        JobResult::failed(job_kind, index, format!("worker panicked: {msg}"))
                    }
                };
                debug!(
                    "{} job for page {} finished in {:?}",
                    job_kind,
                    index + 1,
                    job_start.elapsed()
                );

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(cb) = progress {
                    cb.on_job_finished(job_kind, &result, done, total);
                }
                (position, result)
            })
            .buffer_unordered(workers);

        let mut slots = ResultSlots::new(kind, total);
        while let Some((position, result)) = finished.next().await {
            if !slots.fill(position, result) {
                warn!("Discarding duplicate result for batch position {}", position);
            }
        }
        let results = slots.freeze(&indices);

        let succeeded = results.succeeded();
        info!(
            "{} round complete: {}/{} ok in {:?}",
            kind,
            succeeded,
            total,
            start.elapsed()
        );
        if let Some(cb) = progress {
            cb.on_round_complete(kind, total, succeeded);
        }
        results
    }
}

impl Default for PageJobScheduler {
    fn default() -> Self {
        Self::new(PipelineConfig::default().max_workers)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageDelimiter;
    use crate::output::JobStatus;
    use std::sync::{Arc, Mutex};

    fn text_jobs(n: usize) -> Vec<Job<String>> {
        (0..n)
            .map(|i| Job::new(i, JobKind::Translate, format!("page {i}")))
            .collect()
    }

    /// Deterministic per-job delay in 0..=12 ms.
    fn jitter(i: usize) -> Duration {
        Duration::from_millis(((i * 7919 + 13) % 13) as u64)
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_set() {
        let scheduler = PageJobScheduler::new(3);
        let set = scheduler
            .run(text_jobs(0), |job| async move { Ok::<_, String>(job.payload) })
            .await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn results_keep_submission_order_under_jitter_and_failures() {
        for workers in 1..=5 {
            for n in [1usize, 2, 7, 16] {
                let scheduler = PageJobScheduler::new(workers);
                let set = scheduler
                    .run(text_jobs(n), |job| async move {
                        tokio::time::sleep(jitter(job.index)).await;
                        if job.index % 3 == 1 {
                            Err(format!("forced failure {}", job.index))
                        } else {
                            Ok(job.payload.to_uppercase())
                        }
                    })
                    .await;

                assert_eq!(set.len(), n, "workers={workers} n={n}");
                for (i, r) in set.iter().enumerate() {
                    assert_eq!(r.index, i);
                    if i % 3 == 1 {
                        assert_eq!(r.status, JobStatus::Failed);
                        assert_eq!(r.text, format!("Translation error: forced failure {i}"));
                    } else {
                        assert_eq!(r.text, format!("PAGE {i}"));
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn reverse_completion_still_reads_out_ascending() {
        let n = 5;
        let finish_order = Arc::new(Mutex::new(Vec::new()));
        let scheduler = PageJobScheduler::new(n);
        let order = Arc::clone(&finish_order);
        let set = scheduler
            .run(text_jobs(n), move |job| {
                let order = Arc::clone(&order);
                async move {
                    let delay = (n - job.index) as u64 * 15;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    order.lock().unwrap().push(job.index);
                    Ok::<_, String>(job.payload)
                }
            })
            .await;

        assert_eq!(*finish_order.lock().unwrap(), vec![4, 3, 2, 1, 0]);
        let indices: Vec<usize> = set.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(set.get(0).unwrap().text, "page 0");
    }

    #[tokio::test]
    async fn one_failing_job_does_not_affect_siblings() {
        let scheduler = PageJobScheduler::new(3);
        let set = scheduler
            .run(text_jobs(6), |job| async move {
                if job.index == 2 {
                    Err("always fails")
                } else {
                    Ok(job.payload)
                }
            })
            .await;

        assert_eq!(set.failed(), 1);
        assert_eq!(set.get(2).unwrap().status, JobStatus::Failed);
        for j in [0, 1, 3, 4, 5] {
            let r = set.get(j).unwrap();
            assert_eq!(r.status, JobStatus::Ok);
            assert_eq!(r.text, format!("page {j}"));
        }
    }

    #[tokio::test]
    async fn panicking_job_becomes_failed_result() {
        let scheduler = PageJobScheduler::new(2);
        let set = scheduler
            .run(text_jobs(3), |job| async move {
                if job.index == 1 {
                    panic!("decoder exploded");
                }
                Ok::<_, String>(job.payload)
            })
            .await;

        let r = set.get(1).unwrap();
        assert_eq!(r.status, JobStatus::Failed);
        assert!(r.text.contains("decoder exploded"), "got: {}", r.text);
        assert!(set.get(0).unwrap().is_ok());
        assert!(set.get(2).unwrap().is_ok());
    }

    #[tokio::test]
    async fn in_flight_jobs_never_exceed_worker_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let scheduler = PageJobScheduler::new(3);
        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let set = scheduler
            .run(text_jobs(10), move |job| {
                let (f, p) = (Arc::clone(&f), Arc::clone(&p));
                async move {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(job.payload)
                }
            })
            .await;

        assert_eq!(set.len(), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn sequential_mode_runs_in_order_with_pause() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let scheduler =
            PageJobScheduler::new(1).with_request_pause(Duration::from_millis(20));
        let s = Arc::clone(&started);
        let begin = Instant::now();
        let set = scheduler
            .run(text_jobs(4), move |job| {
                let s = Arc::clone(&s);
                async move {
                    s.lock().unwrap().push(job.index);
                    tokio::time::sleep(jitter(3 - job.index)).await;
                    Ok::<_, String>(job.payload)
                }
            })
            .await;

        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3]);
        assert!(begin.elapsed() >= Duration::from_millis(60));
        assert_eq!(set.len(), 4);
    }

    struct Recorder {
        completed: Mutex<Vec<usize>>,
        summary: Mutex<Option<(usize, usize)>>,
    }

    impl ProgressCallback for Recorder {
        fn on_job_finished(&self, _k: JobKind, _r: &JobResult, completed: usize, _total: usize) {
            self.completed.lock().unwrap().push(completed);
        }

        fn on_round_complete(&self, _k: JobKind, total: usize, succeeded: usize) {
            *self.summary.lock().unwrap() = Some((total, succeeded));
        }
    }

    #[tokio::test]
    async fn progress_counts_are_monotonic() {
        let recorder = Arc::new(Recorder {
            completed: Mutex::new(Vec::new()),
            summary: Mutex::new(None),
        });
        let scheduler = PageJobScheduler::new(4)
            .with_progress(Some(recorder.clone() as ProgressHandle));
        scheduler
            .run(text_jobs(8), |job| async move {
                tokio::time::sleep(jitter(job.index)).await;
                if job.index == 7 {
                    Err("nope")
                } else {
                    Ok(job.payload)
                }
            })
            .await;

        assert_eq!(*recorder.completed.lock().unwrap(), (1..=8).collect::<Vec<_>>());
        assert_eq!(*recorder.summary.lock().unwrap(), Some((8, 7)));
    }

    #[tokio::test]
    async fn repeated_runs_assemble_identically() {
        let scheduler = PageJobScheduler::new(3);
        let work = |job: Job<String>| async move {
            tokio::time::sleep(jitter(job.index)).await;
            Ok::<_, String>(format!("text of {}", job.payload))
        };
        let first = scheduler.run(text_jobs(9), work).await;
        let second = scheduler.run(text_jobs(9), work).await;
        assert_eq!(
            first.assemble(&PageDelimiter::PageHeader),
            second.assemble(&PageDelimiter::PageHeader)
        );
    }

    #[tokio::test]
    async fn sparse_indices_are_carried_through() {
        let jobs = vec![
            Job::new(4, JobKind::Translate, "e".to_string()),
            Job::new(1, JobKind::Translate, "b".to_string()),
        ];
        let set = PageJobScheduler::new(2)
            .run(jobs, |job| async move { Ok::<_, String>(job.payload) })
            .await;
        assert_eq!(set.get(0).unwrap().index, 4);
        assert_eq!(set.get(1).unwrap().index, 1);
    }

    #[test]
    fn pool_size_is_bounded_by_batch() {
        let s = PageJobScheduler::new(5);
        assert_eq!(s.pool_size(2), 2);
        assert_eq!(s.pool_size(10), 5);
        assert_eq!(s.pool_size(0), 1);
        assert_eq!(PageJobScheduler::new(0).max_workers(), 1);
    }
}
