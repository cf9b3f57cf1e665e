//! The fixed-order provisioning chain.
//!
//! Every step after the project depends on an identifier produced by an earlier
//! one, so the steps run strictly one after the other. A step that cannot run
//! because an identifier is missing is recorded as degraded and the chain
//! moves on.
use crate::client::{ApiError, Platform, ProjectSpec, find_by_name};
use crate::context::RunContext;
use crate::definitions::{FlagSpec, SegmentSpec};
use crate::step::{Degraded, StepOutcome, execute, existing};

pub const PROJECT_IDENTIFIER: &str = "FMEWorkshop";
pub const WORKSPACE_NAME: &str = "FME-Workshop";
pub const ENVIRONMENT_NAME: &str = "stage";
pub const TRAFFIC_TYPE: &str = "user";
const PROJECT_COLOR: &str = "skyblue";
const PROJECT_DESCRIPTION: &str = "FME Workshop";
const FLAG_DESCRIPTION: &str = "created for Split Workshop";

/// Outcome of every operation the pipeline attempted, in order.
#[derive(Debug, Default)]
pub struct PipelineReport {
    steps: Vec<(String, StepOutcome)>,
}

impl PipelineReport {
    fn record(&mut self, step: &str, outcome: StepOutcome) -> Option<String> {
        let id = outcome.id().map(String::from);
        self.steps.push((step.to_string(), outcome));
        id
    }

    pub fn steps(&self) -> &[(String, StepOutcome)] {
        &self.steps
    }

    /// The latest outcome recorded for `step`.
    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .rev()
            .find(|(name, _)| name == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn degraded(&self) -> impl Iterator<Item = &(String, StepOutcome)> {
        self.steps
            .iter()
            .filter(|(_, outcome)| outcome.is_degraded())
    }
}

pub struct Pipeline<'a> {
    platform: &'a dyn Platform,
}

impl<'a> Pipeline<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        Pipeline { platform }
    }

    /// Attempts every step exactly once. Never fails: problems end up in the report.
    pub async fn run(
        &self,
        ctx: &mut RunContext,
        segments: &[SegmentSpec],
        flags: &[FlagSpec],
    ) -> PipelineReport {
        let mut report = PipelineReport::default();

        self.provision_workspace(ctx, &mut report).await;
        self.resolve_traffic_type(ctx, &mut report).await;
        self.provision_environment(ctx, &mut report).await;
        self.create_client_api_key(ctx, &mut report).await;
        self.create_segments(ctx, segments, &mut report).await;
        self.create_flags(ctx, flags, &mut report).await;

        for (step, outcome) in report.degraded() {
            tracing::warn!(step = %step, outcome = ?outcome, "step did not complete");
        }
        let degraded = report.degraded().count();
        tracing::info!(
            steps = report.steps.len(),
            degraded,
            "provisioning finished"
        );

        report
    }

    async fn provision_workspace(&self, ctx: &mut RunContext, report: &mut PipelineReport) {
        let platform = self.platform;
        let project = &ProjectSpec {
            identifier: PROJECT_IDENTIFIER.into(),
            name: WORKSPACE_NAME.into(),
            color: PROJECT_COLOR.into(),
            description: PROJECT_DESCRIPTION.into(),
        };

        let outcome = execute(
            "project",
            || platform.create_project(project),
            || find_workspace(platform),
            ApiError::is_duplicate,
        )
        .await;

        // A new project shows up on the flag platform as a workspace with its own id.
        let outcome = match outcome {
            StepOutcome::Created(project_id) => match find_workspace(platform).await {
                Ok(Some(workspace_id)) => StepOutcome::Created(workspace_id),
                Ok(None) => {
                    tracing::warn!(
                        project_id = %project_id,
                        "no workspace mirrors the new project yet"
                    );
                    StepOutcome::Created(project_id)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not list workspaces");
                    StepOutcome::Created(project_id)
                }
            },
            other => other,
        };

        let workspace_id = report.record("project", outcome);
        ctx.set_workspace_id(workspace_id);
    }

    async fn resolve_traffic_type(&self, ctx: &mut RunContext, report: &mut PipelineReport) {
        let step = "traffic_type";
        let Some(workspace_id) = require(report, step, "workspace_id", ctx.workspace_id()) else {
            return;
        };

        let outcome = match self.platform.list_traffic_types(workspace_id).await {
            Ok(types) => match find_by_name(&types, TRAFFIC_TYPE) {
                Some(id) => {
                    tracing::info!(step, id = %id, "resolved traffic type");
                    StepOutcome::Adopted(id)
                }
                None => {
                    tracing::warn!(step, "workspace has no '{TRAFFIC_TYPE}' traffic type");
                    StepOutcome::Degraded(Degraded::NotFound)
                }
            },
            Err(e) => failed(step, e),
        };

        let traffic_type_id = report.record(step, outcome);
        ctx.set_traffic_type_id(traffic_type_id);
    }

    async fn provision_environment(&self, ctx: &mut RunContext, report: &mut PipelineReport) {
        let step = "environment";
        let platform = self.platform;
        let Some(workspace_id) = require(report, step, "workspace_id", ctx.workspace_id()) else {
            return;
        };

        let outcome = execute(
            step,
            || platform.create_environment(workspace_id, ENVIRONMENT_NAME),
            || find_environment(platform, workspace_id),
            ApiError::is_conflict,
        )
        .await;

        let environment_id = report.record(step, outcome);
        ctx.set_environment_id(environment_id);
    }

    async fn create_client_api_key(&self, ctx: &mut RunContext, report: &mut PipelineReport) {
        let step = "client_api_key";
        let Some(workspace_id) = require(report, step, "workspace_id", ctx.workspace_id()) else {
            return;
        };
        let Some(environment_id) = require(report, step, "environment_id", ctx.environment_id())
        else {
            return;
        };

        let outcome = match self
            .platform
            .create_client_api_key(workspace_id, environment_id)
            .await
        {
            Ok(key) => {
                tracing::info!(step, "created client-side API key");
                StepOutcome::Created(key)
            }
            Err(e) => {
                tracing::error!(
                    step,
                    message = %e.detail(),
                    error = ?e,
                    "could not create client-side API key"
                );
                StepOutcome::Degraded(Degraded::Failed(e.detail()))
            }
        };

        let key = report.record(step, outcome);
        ctx.set_client_api_key(key);
    }

    async fn create_segments(
        &self,
        ctx: &RunContext,
        segments: &[SegmentSpec],
        report: &mut PipelineReport,
    ) {
        let platform = self.platform;
        tracing::info!(count = segments.len(), "creating segments");

        for segment in segments {
            let name = segment.name.as_str();
            let description = segment.description.as_str();

            let step = format!("segment:{name}");
            let scope = require(report, &step, "workspace_id", ctx.workspace_id()).and_then(|ws| {
                require(report, &step, "traffic_type_id", ctx.traffic_type_id()).map(|tt| (ws, tt))
            });
            if let Some((workspace_id, traffic_type_id)) = scope {
                let outcome = execute(
                    &step,
                    || async move {
                        platform
                            .create_segment(workspace_id, traffic_type_id, name, description)
                            .await
                            .map(|()| name.to_string())
                    },
                    || existing(name),
                    ApiError::is_conflict,
                )
                .await;
                report.record(&step, outcome);
            }

            let Some(environment_id) = ctx.environment_id() else {
                require(
                    report,
                    &format!("segment_enable:{name}"),
                    "environment_id",
                    None,
                );
                require(
                    report,
                    &format!("segment_keys:{name}"),
                    "environment_id",
                    None,
                );
                continue;
            };

            let step = format!("segment_enable:{name}");
            let outcome = execute(
                &step,
                || async move {
                    platform
                        .enable_segment(environment_id, name)
                        .await
                        .map(|()| name.to_string())
                },
                || existing(name),
                ApiError::is_conflict,
            )
            .await;
            report.record(&step, outcome);

            let step = format!("segment_keys:{name}");
            let outcome = match platform
                .replace_segment_keys(environment_id, name, &segment.keys, description)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        step = %step,
                        keys = segment.keys.len(),
                        "replaced segment keys"
                    );
                    StepOutcome::Replaced(name.to_string())
                }
                Err(e) => failed(&step, e),
            };
            report.record(&step, outcome);
        }
    }

    async fn create_flags(
        &self,
        ctx: &RunContext,
        flags: &[FlagSpec],
        report: &mut PipelineReport,
    ) {
        let platform = self.platform;
        tracing::info!(count = flags.len(), "creating flags");

        for flag in flags {
            let name = flag.name.as_str();

            let step = format!("flag:{name}");
            let Some(workspace_id) = require(report, &step, "workspace_id", ctx.workspace_id())
            else {
                require(
                    report,
                    &format!("flag_definition:{name}"),
                    "workspace_id",
                    None,
                );
                continue;
            };

            let outcome = execute(
                &step,
                || async move {
                    platform
                        .create_flag(workspace_id, TRAFFIC_TYPE, name, FLAG_DESCRIPTION)
                        .await
                        .map(|()| name.to_string())
                },
                || existing(name),
                ApiError::is_conflict,
            )
            .await;
            report.record(&step, outcome);

            let step = format!("flag_definition:{name}");
            let Some(environment_id) =
                require(report, &step, "environment_id", ctx.environment_id())
            else {
                continue;
            };

            let outcome = self
                .push_definition(&step, workspace_id, environment_id, flag)
                .await;
            report.record(&step, outcome);
        }
    }

    /// Writes the flag's environment definition, overwriting whatever is there.
    async fn push_definition(
        &self,
        step: &str,
        workspace_id: &str,
        environment_id: &str,
        flag: &FlagSpec,
    ) -> StepOutcome {
        let name = flag.name.as_str();
        match self
            .platform
            .create_flag_definition(workspace_id, name, environment_id, &flag.definition)
            .await
        {
            Ok(()) => {
                tracing::info!(step, "created flag definition");
                StepOutcome::Created(name.to_string())
            }
            Err(e) if e.is_conflict() => {
                tracing::info!(step, "flag already has a definition, overwriting");
                match self
                    .platform
                    .update_flag_definition(workspace_id, name, environment_id, &flag.definition)
                    .await
                {
                    Ok(()) => StepOutcome::Replaced(name.to_string()),
                    Err(e) => failed(step, e),
                }
            }
            Err(e) => failed(step, e),
        }
    }
}

async fn find_workspace(platform: &dyn Platform) -> Result<Option<String>, ApiError> {
    let workspaces = platform.list_workspaces().await?;
    Ok(find_by_name(&workspaces, WORKSPACE_NAME))
}

async fn find_environment(
    platform: &dyn Platform,
    workspace_id: &str,
) -> Result<Option<String>, ApiError> {
    let environments = platform.list_environments(workspace_id).await?;
    Ok(find_by_name(&environments, ENVIRONMENT_NAME))
}

/// Passes `value` through, recording the step as skipped when it is missing.
fn require<'c>(
    report: &mut PipelineReport,
    step: &str,
    input: &'static str,
    value: Option<&'c str>,
) -> Option<&'c str> {
    if value.is_none() {
        tracing::warn!(step, input, "skipping, identifier was not resolved");
        report.record(step, StepOutcome::Degraded(Degraded::MissingInput(input)));
    }
    value
}

fn failed(step: &str, err: ApiError) -> StepOutcome {
    tracing::error!(step, error = %err, "step failed");
    StepOutcome::Degraded(Degraded::Failed(err.to_string()))
}
