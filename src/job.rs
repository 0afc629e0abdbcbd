use crate::activity::ActivitySource;
use crate::contributions::ContributionCounter;
use crate::heatmap::{Heatmap, Palette, WINDOW_DAYS};
use crate::{AppConfig, Result};
use chrono::{Duration, NaiveDate};
use std::fmt;
use std::path::PathBuf;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of push events in the window.
    pub total_contributions: u64,
    /// Number of days with at least one push event.
    pub active_days: usize,
    /// Where the heatmap was written.
    pub output: PathBuf,
}

/// Result of a single run of the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The heatmap was written.
    Success(RunSummary),
    /// The host could not be reached or rejected the credentials. Nothing was written.
    Skip(String),
    /// Fetching or rendering failed.
    Fatal(String),
}

impl RunOutcome {
    /// The process exit code for this outcome. Skipping is not a failure, so that scheduled
    /// pipelines do not report a transient outage as a broken build.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Success(_) | RunOutcome::Skip(_) => 0,
            RunOutcome::Fatal(_) => 1,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunOutcome::Success(summary) => write!(
                f,
                "wrote {} with {} contributions",
                summary.output.display(),
                summary.total_contributions
            ),
            RunOutcome::Skip(reason) => write!(f, "skipped: {reason}"),
            RunOutcome::Fatal(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Settings the job needs from the application configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub output_path: PathBuf,
    pub palette: Palette,
}

impl From<&AppConfig> for JobConfig {
    fn from(config: &AppConfig) -> Self {
        JobConfig {
            output_path: config.output_path.clone(),
            palette: config.palette.clone(),
        }
    }
}

/// Fetches activity from a source and renders it into a heatmap file.
pub struct Job<S> {
    config: JobConfig,
    source: S,
}

impl<S> Job<S>
where
    S: ActivitySource,
{
    pub fn new(config: JobConfig, source: S) -> Job<S> {
        Job { config, source }
    }

    /// Runs probe, fetch, aggregation and rendering for the window ending at `today`.
    pub async fn run(&self, today: NaiveDate) -> RunOutcome {
        if let Err(err) = self.source.probe().await {
            if err.is_unavailable() {
                log::warn!("activity source not available, skipping update: {err}");
                return RunOutcome::Skip(err.to_string());
            }

            log::error!("failed to probe activity source: {err}");
            return RunOutcome::Fatal(err.to_string());
        }

        match self.update(today).await {
            Ok(summary) => RunOutcome::Success(summary),
            Err(err) => {
                log::error!("an unexpected error occurred: {err}");
                RunOutcome::Fatal(err.to_string())
            }
        }
    }

    async fn update(&self, today: NaiveDate) -> Result<RunSummary> {
        let since = today - Duration::days(WINDOW_DAYS);

        log::info!("fetching contribution data since {since}");
        let events = self.source.fetch_push_events(since).await?;
        let counter = ContributionCounter::from_events(events);

        let total_contributions = counter.total();
        log::info!("found {total_contributions} contributions in the last year");

        if total_contributions == 0 {
            log::info!("no contributions found, the generated graph will be empty");
        }

        log::info!("generating SVG heatmap");
        let heatmap = Heatmap::render(&counter, today, self.config.palette.clone());
        heatmap.save(&self.config.output_path)?;

        log::info!("successfully generated {}", self.config.output_path.display());

        Ok(RunSummary {
            total_contributions,
            active_days: counter.len(),
            output: self.config.output_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::gitlab::ClientError;
    use crate::activity::{ContributionEvent, StaticActivitySource};
    use crate::Error;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn push(y: i32, m: u32, d: u32, h: u32) -> ContributionEvent {
        ContributionEvent::push(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    fn job_config(dir: &tempfile::TempDir) -> JobConfig {
        JobConfig {
            output_path: dir.path().join("gitlab-graph.svg"),
            palette: Palette::dark(),
        }
    }

    // A fake `ActivitySource` that fails in a configurable way and counts fetches.
    struct Failing {
        probe: fn() -> Error,
        fetch: Option<fn() -> Error>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ActivitySource for Failing {
        async fn probe(&self) -> Result<()> {
            Err((self.probe)())
        }

        async fn fetch_push_events(&self, _since: NaiveDate) -> Result<Vec<ContributionEvent>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.fetch {
                Some(err) => Err(err()),
                None => Ok(vec![]),
            }
        }
    }

    #[tokio::test]
    async fn writes_heatmap() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticActivitySource::new([
            push(2024, 3, 1, 9),
            push(2024, 3, 1, 10),
            push(2024, 3, 1, 17),
            push(2024, 5, 20, 8),
            // Outside of the window.
            push(2023, 1, 1, 8),
        ]);

        let job = Job::new(job_config(&dir), source);
        let outcome = job.run(date(2024, 6, 1)).await;

        assert_eq!(
            outcome,
            RunOutcome::Success(RunSummary {
                total_contributions: 4,
                active_days: 2,
                output: dir.path().join("gitlab-graph.svg"),
            })
        );
        assert_eq!(outcome.exit_code(), 0);

        let svg = fs::read_to_string(dir.path().join("gitlab-graph.svg")).unwrap();
        assert!(svg.contains(r##"fill="#006d32" data-date="2024-03-01" data-count="3""##));
        assert!(svg.contains(r##"fill="#0e4429" data-date="2024-05-20" data-count="1""##));
    }

    #[tokio::test]
    async fn empty_activity_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new(
            job_config(&dir),
            StaticActivitySource::new(Vec::<ContributionEvent>::new()),
        );

        let outcome = job.run(date(2024, 6, 1)).await;

        match &outcome {
            RunOutcome::Success(summary) => {
                assert_eq!(summary.total_contributions, 0);
                assert_eq!(summary.active_days, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let svg = fs::read_to_string(dir.path().join("gitlab-graph.svg")).unwrap();
        assert!(svg.contains("<rect "));
        assert_eq!(svg.matches(r##"fill="#161b22""##).count(), svg.matches("<rect ").count());
    }

    #[tokio::test]
    async fn unavailable_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(Failing {
            probe: || Error::Client(ClientError::Unauthorized(StatusCode::UNAUTHORIZED)),
            fetch: None,
            fetches: AtomicUsize::new(0),
        });

        let job = Job::new(job_config(&dir), source.clone());
        let outcome = job.run(date(2024, 6, 1)).await;

        assert!(matches!(outcome, RunOutcome::Skip(_)));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("gitlab-graph.svg").exists());
    }

    #[tokio::test]
    async fn other_probe_errors_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = Failing {
            probe: || Error::MissingSetting("HOST_URL"),
            fetch: None,
            fetches: AtomicUsize::new(0),
        };

        let outcome = Job::new(job_config(&dir), source).run(date(2024, 6, 1)).await;

        assert!(matches!(outcome, RunOutcome::Fatal(_)));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn fetch_errors_are_fatal() {
        // A healthy probe followed by a broken fetch, even one that looks like an outage.
        struct BrokenFetch;

        #[async_trait]
        impl ActivitySource for BrokenFetch {
            async fn probe(&self) -> Result<()> {
                Ok(())
            }

            async fn fetch_push_events(&self, _since: NaiveDate) -> Result<Vec<ContributionEvent>> {
                Err(Error::Client(ClientError::Unauthorized(StatusCode::FORBIDDEN)))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let outcome = Job::new(job_config(&dir), BrokenFetch).run(date(2024, 6, 1)).await;

        assert_eq!(
            outcome,
            RunOutcome::Fatal("GitLab client error: authentication failed with status 403 Forbidden".into())
        );
        assert_eq!(outcome.exit_code(), 1);
        assert!(!dir.path().join("gitlab-graph.svg").exists());
    }

    #[tokio::test]
    async fn unwritable_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = JobConfig {
            output_path: dir.path().join("missing").join("gitlab-graph.svg"),
            palette: Palette::dark(),
        };

        let outcome = Job::new(config, StaticActivitySource::new([push(2024, 3, 1, 9)]))
            .run(date(2024, 6, 1))
            .await;

        assert!(matches!(outcome, RunOutcome::Fatal(_)));
    }

    #[tokio::test]
    async fn requests_trailing_year() {
        struct Recorder(std::sync::Mutex<Option<NaiveDate>>);

        #[async_trait]
        impl ActivitySource for Recorder {
            async fn probe(&self) -> Result<()> {
                Ok(())
            }

            async fn fetch_push_events(&self, since: NaiveDate) -> Result<Vec<ContributionEvent>> {
                *self.0.lock().unwrap() = Some(since);
                Ok(vec![])
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(Recorder(Default::default()));
        Job::new(job_config(&dir), source.clone())
            .run(date(2024, 6, 1))
            .await;

        assert_eq!(*source.0.lock().unwrap(), Some(date(2023, 6, 2)));
    }
}
