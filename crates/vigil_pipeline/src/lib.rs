//! The run orchestrator: ingestion, dedup, enrichment, scoring, export,
//! publication, and state commit, in that order.
//!
//! Collaborators (feed transport, signal lookups, publisher, notifiers,
//! geo context) are injected so the whole pipeline runs offline in tests.

use std::collections::BTreeSet;

use dedup_state::StateStore;
use feed_ingest::{FeedAggregator, FeedFetch, SignalSource};
use ioc_extract::{IocExtractor, IpContextSource};
use publisher::{retry_with_backoff, PublishError, PublishRequest, Publisher};
use stix_export::{misp, ExportStore};
use thiserror::Error;
use threat_analysis::{map_techniques, ActorMatrix, RiskEngine};
use tracing::info;
use vigil_core::{IndicatorKind, VigilConfig};

pub mod report;

pub use report::ReportBuilder;

/// How many network indicators get a geo/ISP context lookup per run.
const ENRICHMENT_CAP: usize = 3;

pub const REPORT_TITLE: &str = "Daily Cyber Threat Intelligence Report";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("publish failed, dedup state not committed: {0}")]
    Publish(#[from] PublishError),
    #[error(transparent)]
    State(#[from] dedup_state::StateError),
    #[error(transparent)]
    Export(#[from] stix_export::ExportError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Terminal state of one run. A no-op cycle is operationally distinct from
/// both success and failure and must never be conflated with either.
#[derive(Debug)]
pub enum Outcome {
    Published {
        url: String,
        items: usize,
        risk_score: f64,
    },
    NoNewIntel,
}

pub struct Pipeline<'a, F: FeedFetch> {
    config: &'a VigilConfig,
    aggregator: &'a FeedAggregator<F>,
    signals: &'a dyn SignalSource,
    publisher: &'a dyn Publisher,
    notifiers: &'a [&'a dyn publisher::Notifier],
    geo: Option<&'a dyn IpContextSource>,
}

impl<'a, F: FeedFetch> Pipeline<'a, F> {
    pub fn new(
        config: &'a VigilConfig,
        aggregator: &'a FeedAggregator<F>,
        signals: &'a dyn SignalSource,
        publish: &'a dyn Publisher,
        notifiers: &'a [&'a dyn publisher::Notifier],
        geo: Option<&'a dyn IpContextSource>,
    ) -> Self {
        Self {
            config,
            aggregator,
            signals,
            publisher: publish,
            notifiers,
            geo,
        }
    }

    /// Execute one full batch run.
    ///
    /// Dedup state is committed strictly after a confirmed publish: a
    /// fatal publish leaves the state untouched so this run's items are
    /// reprocessed next time rather than silently lost.
    pub fn run(&self) -> Result<Outcome> {
        let store = StateStore::new(&self.config.state_file, self.config.max_state_size);
        let mut state = store.load();
        let export = ExportStore::new(&self.config.export_dir, self.config.manifest_max_entries);

        let items = self
            .aggregator
            .collect(&self.config.sources, self.config.max_per_feed);
        let fresh: Vec<_> = store
            .filter_new(&state, &items)
            .into_iter()
            .cloned()
            .collect();

        if fresh.is_empty() {
            // Manifest still refreshes so downstream dashboards stay
            // consistent across idle cycles.
            export.update_manifest()?;
            info!("no new intelligence, nothing to publish");
            return Ok(Outcome::NoNewIntel);
        }
        info!(count = fresh.len(), "new intelligence items admitted");

        let corpus = fresh
            .iter()
            .map(|i| format!("{} {}", i.title, i.summary))
            .collect::<Vec<_>>()
            .join("\n");
        let headline = fresh[0].title.clone();

        let extractor = IocExtractor::new();
        let indicators = extractor.extract(&corpus);
        let actor = ActorMatrix::new().correlate(&corpus, &indicators);
        let techniques = map_techniques(&corpus);

        let cve_ids: BTreeSet<String> = indicators
            .values(IndicatorKind::Cve)
            .map(|vs| vs.iter().cloned().collect())
            .unwrap_or_default();
        let signals = self.signals.lookup(&cve_ids);

        let risk = RiskEngine::with_thresholds(self.config.risk_thresholds).score(
            &headline,
            &corpus,
            &indicators,
            &techniques,
            &signals,
        );
        info!(score = risk.score, label = risk.label.as_str(), "risk assessed");

        let bundle = stix_export::build_bundle(REPORT_TITLE, &indicators, &risk, &techniques);
        let bundle_path = export.persist(&bundle)?;
        info!(path = %bundle_path.display(), "bundle exported");
        misp::persist_event(
            export.export_dir(),
            &misp::build_event(REPORT_TITLE, &indicators),
        )?;
        export.update_manifest()?;

        let enrichment = self.enrich(&indicators);
        let body = ReportBuilder::standard().build(&report::ReportContext {
            items: &fresh,
            indicators: &indicators,
            actor: &actor,
            techniques: &techniques,
            risk: &risk,
            vector: ioc_extract::categorize(&indicators),
            enrichment: &enrichment,
        });

        let request = PublishRequest {
            title: REPORT_TITLE.to_string(),
            content: body,
            labels: vec![
                "Threat Intelligence".to_string(),
                "Daily Report".to_string(),
                risk.label.as_str().to_string(),
            ],
            is_draft: false,
        };

        let post = retry_with_backoff(
            || self.publisher.publish(&request),
            self.config.publish_retry_max,
            self.config.publish_retry_delay,
            PublishError::is_retryable,
        )?;

        // Publish confirmed: only now do the items become "processed".
        store.commit(&mut state, fresh.iter().map(|i| i.id.clone()))?;

        for notifier in self.notifiers {
            // Collaborator failures are logged inside and never undo the
            // publish or the commit.
            notifier.notify(&headline, risk.score, &post.url);
        }

        Ok(Outcome::Published {
            url: post.url,
            items: fresh.len(),
            risk_score: risk.score,
        })
    }

    fn enrich(
        &self,
        indicators: &vigil_core::IndicatorSet,
    ) -> Vec<(String, ioc_extract::EnrichmentRecord)> {
        let Some(geo) = self.geo else {
            return Vec::new();
        };
        indicators
            .values(IndicatorKind::Ipv4)
            .map(|ips| {
                ips.iter()
                    .take(ENRICHMENT_CAP)
                    .map(|ip| (ip.clone(), geo.lookup(ip)))
                    .collect()
            })
            .unwrap_or_default()
    }
}
