use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::aggregate::Aggregator;
use crate::config::{Credentials, ResolvedConfig};
use crate::dispatch::{CancelToken, Dispatcher};
use crate::domain::{ArtifactMode, DispatchMode, IdRange, ProfileId, RankRecord};
use crate::error::{FetchError, RankscanError};
use crate::extract::{Extraction, HtmlRankExtractor, RankExtractor};
use crate::fetch::{ProfileFetcher, ProfileHttpClient};
use crate::persist::{CsvArtifact, Persister};
use crate::progress::{ProgressCounter, ProgressEvent, ProgressSink};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub range: IdRange,
    pub concurrency: usize,
    pub flush_every: usize,
    pub dispatch: DispatchMode,
    pub mode: ArtifactMode,
}

impl From<&ResolvedConfig> for RunOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            range: config.range,
            concurrency: config.concurrency,
            flush_every: config.flush_every,
            dispatch: config.dispatch,
            mode: config.mode,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub range: String,
    pub dispatch: DispatchMode,
    pub mode: ArtifactMode,
    pub processed: u64,
    pub ranked: u64,
    pub label_absent: u64,
    pub value_absent: u64,
    pub invalid_rank: u64,
    pub not_ok: u64,
    pub failed: u64,
    pub flushes: u64,
    pub cancelled: bool,
    pub elapsed_ms: u64,
    pub output: String,
}

#[derive(Debug, Default)]
struct RunStats {
    processed: AtomicU64,
    label_absent: AtomicU64,
    value_absent: AtomicU64,
    invalid_rank: AtomicU64,
    not_ok: AtomicU64,
    failed: AtomicU64,
    flushes: AtomicU64,
}

impl RunStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared by every task of one run.
struct RunContext<'a> {
    options: &'a RunOptions,
    sink: &'a dyn ProgressSink,
    cancel: CancelToken,
    aggregator: Aggregator,
    counter: ProgressCounter,
    stats: RunStats,
    fatal: Mutex<Option<RankscanError>>,
}

impl RunContext<'_> {
    fn fail(&self, err: RankscanError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            tracing::error!(error = %err, "stopping run");
            *fatal = Some(err);
        }
        self.cancel.cancel();
    }

    fn take_fatal(&self) -> Option<RankscanError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[derive(Debug)]
pub struct App<F: ProfileFetcher, E: RankExtractor, P: Persister> {
    fetcher: F,
    extractor: E,
    persister: P,
}

/// The production pipeline: HTTP fetcher, HTML extractor, CSV artifact.
pub type Scraper = App<ProfileHttpClient, HtmlRankExtractor, CsvArtifact>;

impl Scraper {
    /// Builds every component from `config`. The artifact on disk is not
    /// touched here.
    pub fn from_config(
        config: &ResolvedConfig,
        credentials: &Credentials,
    ) -> Result<Self, RankscanError> {
        let fetcher = ProfileHttpClient::new(
            config.base_url.clone(),
            credentials,
            Duration::from_secs(config.timeout_secs),
        )?;
        let extractor = HtmlRankExtractor::new(&config.extraction)?;
        Ok(Self::new(fetcher, extractor, CsvArtifact::new(config.output.clone())))
    }
}

impl<F: ProfileFetcher, E: RankExtractor, P: Persister> App<F, E, P> {
    pub fn new(fetcher: F, extractor: E, persister: P) -> Self {
        Self {
            fetcher,
            extractor,
            persister,
        }
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// Fetches and ranks every id in `options.range`. Per-profile failures are
    /// logged and skipped; only artifact write failures end the run early.
    pub fn run(
        &self,
        options: &RunOptions,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunSummary, RankscanError> {
        if options.flush_every == 0 {
            return Err(RankscanError::InvalidConfig(
                "flush_every must be at least 1".to_string(),
            ));
        }
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();

        // A fatal error stops dispatch without cancelling the caller's token.
        let stop = cancel.child();
        let ctx = RunContext {
            options,
            sink,
            cancel: stop.clone(),
            aggregator: Aggregator::new(),
            counter: ProgressCounter::new(),
            stats: RunStats::default(),
            fatal: Mutex::new(None),
        };

        tracing::info!(
            range = %options.range,
            concurrency = options.concurrency,
            flush_every = options.flush_every,
            dispatch = %options.dispatch,
            mode = %options.mode,
            output = %self.persister.location(),
            "scrape started"
        );
        sink.event(ProgressEvent::Started {
            range: options.range,
        });

        let dispatcher = Dispatcher::new(options.concurrency, options.dispatch);
        let report = dispatcher.run(options.range, &stop, |id| self.process(&ctx, id));

        if let Some(err) = ctx.take_fatal() {
            return Err(err);
        }

        if options.mode == ArtifactMode::Sorted {
            let written = ctx.aggregator.sort_and_flush(&self.persister)?;
            RunStats::bump(&ctx.stats.flushes);
            sink.event(ProgressEvent::Flushed { records: written });
        }

        let elapsed = start.elapsed();
        sink.event(ProgressEvent::Finished { elapsed });

        let summary = RunSummary {
            started_at,
            range: options.range.to_string(),
            dispatch: options.dispatch,
            mode: options.mode,
            processed: ctx.stats.processed.load(Ordering::Relaxed),
            ranked: ctx.counter.total(),
            label_absent: ctx.stats.label_absent.load(Ordering::Relaxed),
            value_absent: ctx.stats.value_absent.load(Ordering::Relaxed),
            invalid_rank: ctx.stats.invalid_rank.load(Ordering::Relaxed),
            not_ok: ctx.stats.not_ok.load(Ordering::Relaxed),
            failed: ctx.stats.failed.load(Ordering::Relaxed),
            flushes: ctx.stats.flushes.load(Ordering::Relaxed),
            cancelled: report.cancelled,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            output: self.persister.location(),
        };
        tracing::info!(
            processed = summary.processed,
            ranked = summary.ranked,
            failed = summary.failed,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed_ms,
            "scrape finished"
        );
        Ok(summary)
    }

    fn process(&self, ctx: &RunContext<'_>, id: ProfileId) {
        RunStats::bump(&ctx.stats.processed);
        let Some(rank) = self.rank_for(ctx, id) else {
            return;
        };
        let record = RankRecord::new(self.fetcher.reference(id), rank);

        let held = match ctx.options.mode {
            ArtifactMode::Sorted => ctx.aggregator.insert(record),
            ArtifactMode::Append => {
                match ctx.aggregator.insert_and_append(record, &self.persister) {
                    Ok(held) => held,
                    Err(err) => {
                        ctx.fail(err);
                        return;
                    }
                }
            }
        };
        let total = ctx.counter.record();

        if ctx.options.mode == ArtifactMode::Sorted && held % ctx.options.flush_every == 0 {
            match ctx.aggregator.sort_and_flush(&self.persister) {
                Ok(written) => {
                    RunStats::bump(&ctx.stats.flushes);
                    ctx.sink.event(ProgressEvent::Flushed { records: written });
                }
                Err(err) => {
                    ctx.fail(err);
                    return;
                }
            }
        }
        ctx.sink.event(ProgressEvent::Ranked { total });
    }

    fn rank_for(&self, ctx: &RunContext<'_>, id: ProfileId) -> Option<i64> {
        tracing::debug!(%id, "fetching profile");
        let document = match self.fetcher.fetch(id) {
            Ok(document) => document,
            Err(FetchError::Status { status }) => {
                tracing::trace!(%id, status, "profile skipped");
                RunStats::bump(&ctx.stats.not_ok);
                return None;
            }
            Err(err) => {
                tracing::warn!(%id, error = %err, "error fetching profile");
                RunStats::bump(&ctx.stats.failed);
                return None;
            }
        };

        match self.extractor.extract(&document) {
            Extraction::Rank(rank) => Some(rank),
            Extraction::LabelAbsent => {
                tracing::debug!(%id, "no rank label on profile");
                RunStats::bump(&ctx.stats.label_absent);
                None
            }
            Extraction::ValueAbsent => {
                tracing::debug!(%id, "rank label has no value");
                RunStats::bump(&ctx.stats.value_absent);
                None
            }
            Extraction::InvalidRank(raw) => {
                tracing::warn!(%id, rank = %raw, "skipping profile due to invalid rank");
                RunStats::bump(&ctx.stats.invalid_rank);
                None
            }
        }
    }
}
