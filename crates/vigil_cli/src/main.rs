use std::process::ExitCode;

use clap::{Parser, Subcommand};
use feed_ingest::{FeedAggregator, FeedSignalSource, HttpFeedFetcher};
use ioc_extract::{HttpIpContextSource, IocExtractor};
use publisher::{HttpPublisher, Notifier, SocialBroadcaster, WebhookNotifier};
use tracing::{error, info};
use vigil_core::VigilConfig;
use vigil_pipeline::{Outcome, Pipeline};

/// Exit status for a completed run that found nothing new. Documented as a
/// non-error outcome, distinct from both success (0) and failure (1).
const EXIT_NO_NEW_INTEL: u8 = 2;

#[derive(Parser)]
#[command(name = "vigil", about = "Threat intelligence ingestion and publication pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one full pipeline run.
    Run,
    /// Rebuild the export manifest without ingesting.
    Manifest,
    /// Offline preflight: sample extraction and bundle validation.
    Diagnose,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = VigilConfig::from_env();

    let result = match cli.command {
        Commands::Run => cmd_run(&config),
        Commands::Manifest => cmd_manifest(&config),
        Commands::Diagnose => cmd_diagnose(),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::from(1)
        }
    }
}

fn cmd_run(config: &VigilConfig) -> anyhow::Result<ExitCode> {
    let fetcher = HttpFeedFetcher::new(config.http_timeout)?;
    let aggregator = FeedAggregator::new(fetcher);
    let signals = FeedSignalSource::new(
        HttpFeedFetcher::new(config.http_timeout)?,
        config.kev_url.clone(),
        config.epss_url.clone(),
        config.nvd_url.clone(),
    );
    let publish = HttpPublisher::new(
        config.publish_endpoint.clone(),
        config.publish_token.clone(),
        config.http_timeout,
    )?;

    let webhook = WebhookNotifier::new(
        config.alert_webhooks.clone(),
        config.risk_thresholds,
        config.http_timeout,
    );
    let social = SocialBroadcaster::new(
        config.social_endpoint.clone(),
        config.social_token.clone(),
        config.risk_thresholds,
        config.http_timeout,
    );
    let mut notifiers: Vec<&dyn Notifier> = Vec::new();
    if let Some(ref n) = webhook {
        notifiers.push(n);
    }
    if let Some(ref n) = social {
        notifiers.push(n);
    }

    let geo = HttpIpContextSource::new(config.geo_endpoint.clone(), config.http_timeout);

    let pipeline = Pipeline::new(
        config,
        &aggregator,
        &signals,
        &publish,
        &notifiers,
        geo.as_ref().map(|g| g as &dyn ioc_extract::IpContextSource),
    );

    match pipeline.run()? {
        Outcome::Published {
            url,
            items,
            risk_score,
        } => {
            info!(url = %url, items, risk_score, "daily threat report published");
            Ok(ExitCode::SUCCESS)
        }
        Outcome::NoNewIntel => {
            info!("no new intelligence this cycle");
            Ok(ExitCode::from(EXIT_NO_NEW_INTEL))
        }
    }
}

fn cmd_manifest(config: &VigilConfig) -> anyhow::Result<ExitCode> {
    let store = stix_export::ExportStore::new(&config.export_dir, config.manifest_max_entries);
    let manifest = store.update_manifest()?;
    info!(
        entries = manifest.files.len(),
        total_nodes = manifest.total_nodes,
        "manifest rebuilt"
    );
    Ok(ExitCode::SUCCESS)
}

/// Pre-flight check: run the extraction and export stages against a
/// fixed sample, entirely offline.
fn cmd_diagnose() -> anyhow::Result<ExitCode> {
    let sample = "Emerging threat from 8.8.8.8 and C2 server at 1.1.1.1. \
                  Malware hash: 44d88612fea8a8f36de82e1278abb02f";

    let indicators = IocExtractor::new().extract(sample);
    info!(count = indicators.len(), "sample extraction complete");
    if indicators.is_empty() {
        anyhow::bail!("sample extraction produced no indicators");
    }

    let risk = threat_analysis::RiskEngine::new().score(
        "Diagnostic Test",
        sample,
        &indicators,
        &[],
        &threat_analysis::ExternalSignals::default(),
    );
    let bundle = stix_export::build_bundle("Diagnostic Test", &indicators, &risk, &[]);
    let report = bundle
        .report()
        .ok_or_else(|| anyhow::anyhow!("bundle missing report object"))?;
    if report.object_refs.len() != bundle.objects.len() - 1 {
        anyhow::bail!("bundle object_refs do not cover all objects");
    }

    info!(objects = bundle.objects.len(), "diagnostic bundle valid");
    Ok(ExitCode::SUCCESS)
}
