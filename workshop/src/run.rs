use crate::config::Config;
use bundle::archive::Assembler;
use bundle::notify::recipient_report;
use bundle::templates::{RenderedPage, render_templates};
use provisioner::definitions::{load_flag_specs, load_segment_specs};
use provisioner::{ApiError, HttpPlatform, Pipeline, PipelineReport, Platform, RunContext};
use std::path::{Path, PathBuf};

const SEGMENTS_FILE: &str = "segments";

pub struct RunSummary {
    pub context: RunContext,
    pub report: PipelineReport,
    pub pages: Vec<RenderedPage>,
    pub archive: Option<PathBuf>,
    pub recipients: String,
}

/// Provisions the tenant against the configured endpoints, then bundles the pages.
pub async fn run(config: &Config, dir: &Path, out_dir: &Path) -> Result<RunSummary, ApiError> {
    let platform = HttpPlatform::new(
        config.endpoints.clone(),
        &config.account_identifier,
        &config.org_identifier,
        &config.api_key,
    )?;

    Ok(run_with_platform(config, &platform, dir, out_dir).await)
}

pub async fn run_with_platform(
    config: &Config,
    platform: &dyn Platform,
    dir: &Path,
    out_dir: &Path,
) -> RunSummary {
    tracing::info!(
        account = %config.account_identifier,
        org = %config.org_identifier,
        emails = config.emails.len(),
        "starting workshop provisioning"
    );

    let flags = load_flag_specs(dir).unwrap_or_else(|e| {
        tracing::error!(error = %e, "could not load flag definitions");
        Vec::new()
    });
    let segments = load_segment_specs(&dir.join(SEGMENTS_FILE)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "could not load segment definitions");
        Vec::new()
    });
    tracing::info!(flags = flags.len(), segments = segments.len(), "loaded definitions");

    let mut context = RunContext::new(
        &config.account_identifier,
        &config.org_identifier,
        &config.api_key,
    );
    let report = Pipeline::new(platform)
        .run(&mut context, &segments, &flags)
        .await;

    let flag_names: Vec<&str> = flags.iter().map(|f| f.name.as_str()).collect();
    let pages = render_templates(dir, &flag_names, context.client_api_key());

    let assembler = Assembler::new(dir);
    let manifest = assembler.build_manifest(&pages);
    let archive = match assembler.write_archive(&manifest, out_dir, &config.org_identifier) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::error!(error = %e, "could not write archive");
            None
        }
    };

    let recipients = recipient_report(&config.emails);
    tracing::info!(recipients = %recipients, "send the archive to these recipients");

    RunSummary {
        context,
        report,
        pages,
        archive,
        recipients,
    }
}
