//! Harvest coordinator - main pipeline orchestration logic
//!
//! This module drives one harvest run through its phases:
//! - Discovering the listing pages from the root page's pagination control
//! - Walking every listing page and collecting detail links
//! - Processing detail links on a bounded worker pool
//! - Draining in-flight work and recording the run's outcome
//!
//! Only discovery can fail a run. After that, every detail link ends in
//! exactly one [`RecordOutcome`] and the run always reaches `Done`.

use crate::config::{validate, Config, SiteProfile};
use crate::crawler::{AssetStore, Fetcher, IdempotentSink};
use crate::extract::{discover_pages, extract_detail_links, extract_record};
use crate::output::{AssetOutcome, RecordOutcome, RunSummary};
use crate::state::RunPhase;
use crate::storage::{open_shared_store, RecordStore, RunStatus, SharedStore, StorageError};
use crate::HarvestError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, MutexGuard};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a worker needs to turn one detail URL into a stored record
struct WorkerContext {
    fetcher: Fetcher,
    profile: SiteProfile,
    sink: IdempotentSink,
    assets: AssetStore,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    phase: RunPhase,
    store: SharedStore,
    context: Arc<WorkerContext>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Validates the configuration, opens (or creates) the database and the
    /// image directory, and builds the shared fetcher. Nothing is fetched
    /// until [`Coordinator::run`].
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash of the configuration file, recorded with the run
    /// * `cancel` - Token that stops new work from being handed out
    pub fn new(
        config: Config,
        config_hash: String,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        validate(&config)?;

        let store = open_shared_store(Path::new(&config.output.database_path))?;
        let fetcher = Fetcher::new(&config.fetcher)?;
        let assets = AssetStore::new(&config.output.image_dir)?;
        let sink = IdempotentSink::new(Arc::clone(&store), config.pipeline.persist_attempts);

        let context = WorkerContext {
            fetcher,
            profile: config.selectors.clone(),
            sink,
            assets,
        };

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            phase: RunPhase::Idle,
            store,
            context: Arc::new(context),
            cancel,
        })
    }

    /// Current phase of the run
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Handle to the store this coordinator writes to
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Moves to the next phase, rejecting anything the state machine forbids
    pub fn transition(&mut self, to: RunPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!("Phase {} -> {}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Runs the pipeline to completion
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run reached `Done` (possibly cancelled, possibly
    ///   with per-record failures counted in the summary)
    /// * `Err(HarvestError)` - Pagination discovery failed; the run is `Failed`
    ///   and nothing was persisted
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let root = Url::parse(&self.config.source.root_url)?;
        let run_id = self.lock_store()?.create_run(root.as_str(), &self.config_hash)?;
        tracing::info!("Starting harvest run {} from {}", run_id, root);

        let mut summary = RunSummary::default();

        // ===== Discovering =====
        self.transition(RunPhase::Discovering)?;
        let discovery = discover_pages(&self.context.fetcher, &root, &self.context.profile);
        let discovered = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = discovery => Some(result),
        };

        let mut pages = match discovered {
            Some(Ok(pages)) => Some(pages),
            Some(Err(e)) => {
                tracing::error!("Pagination discovery failed: {}", e);
                self.transition(RunPhase::Failed)?;
                if let Err(storage_err) = self
                    .lock_store()
                    .and_then(|mut store| store.finish_run(run_id, RunStatus::Failed, &summary))
                {
                    tracing::error!("Could not record failed run {}: {}", run_id, storage_err);
                }
                return Err(e);
            }
            None => None,
        };

        // ===== Listing pages =====
        let mut links: Vec<Url> = Vec::new();
        if let Some(pages) = pages.as_mut() {
            if let Some(limit) = self.config.source.page_limit {
                if pages.len() > limit {
                    tracing::info!(
                        "Limiting harvest to the first {} of {} pages",
                        limit,
                        pages.len()
                    );
                }
                pages.truncate(limit);
            }
            summary.pages = pages.len() as u64;

            self.transition(RunPhase::ListingPages)?;
            let mut seen: HashSet<Url> = HashSet::new();

            for (index, page) in pages.iter().enumerate() {
                let fetched = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    result = self.context.fetcher.fetch(page.as_str()) => Some(result),
                };

                let body = match fetched {
                    None => break,
                    Some(Ok(body)) => body,
                    Some(Err(e)) => {
                        summary.listing_failures += 1;
                        tracing::warn!("Listing page {} unavailable: {}", page, e);
                        continue;
                    }
                };

                match extract_detail_links(&body, page, &self.context.profile) {
                    Ok(found) => {
                        let before = links.len();
                        for link in found {
                            if seen.insert(link.clone()) {
                                links.push(link);
                            }
                        }
                        tracing::info!(
                            "Listing page {}/{}: {} new detail links",
                            index + 1,
                            pages.len(),
                            links.len() - before
                        );
                    }
                    Err(e) => {
                        summary.listing_failures += 1;
                        tracing::warn!("Listing page {} unreadable: {}", page, e);
                    }
                }
            }
            summary.detail_links = links.len() as u64;
        }

        // ===== Extracting records =====
        let mut tasks: JoinSet<(Url, RecordOutcome)> = JoinSet::new();
        if !self.cancel.is_cancelled() && self.phase == RunPhase::ListingPages {
            self.transition(RunPhase::ExtractingRecords)?;
            let semaphore = Arc::new(Semaphore::new(self.config.pipeline.workers));
            tracing::info!(
                "Processing {} detail pages with {} workers",
                links.len(),
                self.config.pipeline.workers
            );

            for link in links {
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let context = Arc::clone(&self.context);
                tasks.spawn(async move {
                    let outcome = process_detail(&context, &link).await;
                    drop(permit);
                    (link, outcome)
                });
            }
        }

        if self.cancel.is_cancelled() {
            summary.cancelled = true;
            tracing::warn!("Cancellation requested, draining in-flight work");
        }

        // ===== Draining =====
        self.transition(RunPhase::Draining)?;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((link, outcome)) => summary.record(link.as_str(), &outcome),
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!("Worker task failed: {}", e);
                }
            }
        }

        // ===== Done =====
        self.transition(RunPhase::Done)?;
        let status = if summary.cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.lock_store()?.finish_run(run_id, status, &summary)?;

        summary.log();
        Ok(summary)
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, dyn RecordStore + 'static>, StorageError> {
        self.store.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

/// Takes one detail URL to its final outcome
///
/// The record is persisted before its image is fetched, so an image failure
/// never costs the record.
async fn process_detail(context: &WorkerContext, url: &Url) -> RecordOutcome {
    let body = match context.fetcher.fetch(url.as_str()).await {
        Ok(body) => body,
        Err(e) => {
            return RecordOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    let record = match extract_record(&body, url, &context.profile) {
        Ok(record) => record,
        Err(e) => {
            return RecordOutcome::Skipped {
                reason: e.to_string(),
            }
        }
    };

    let persisted = match context.sink.upsert(&record).await {
        Ok(persisted) => persisted,
        Err(e) => {
            return RecordOutcome::Failed {
                reason: format!("upsert of '{}' failed: {}", record.name, e),
            }
        }
    };

    let asset = match context.assets.fetch_asset(&context.fetcher, &persisted).await {
        Ok(outcome) => outcome,
        Err(e) => AssetOutcome::Failed(e.to_string()),
    };

    tracing::info!("#{} {} ({})", persisted.rank, persisted.name, persisted.rating);
    RecordOutcome::Persisted {
        id: persisted.id,
        asset,
    }
}

/// Runs a complete harvest
///
/// This is the main entry point for the pipeline. It builds a
/// [`Coordinator`] and drives it to completion.
///
/// # Example
///
/// ```no_run
/// use reel_harvest::config::load_config_with_hash;
/// use reel_harvest::crawler::run_harvest;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = run_harvest(config, hash, CancellationToken::new()).await?;
/// println!("{} records persisted", summary.persisted);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    config_hash: String,
    cancel: CancellationToken,
) -> Result<RunSummary, HarvestError> {
    let mut coordinator = Coordinator::new(config, config_hash, cancel)?;
    coordinator.run().await
}
