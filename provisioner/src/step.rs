//! Uniform runner for one remote create-or-adopt operation.
//!
//! A step never fails the run: creation that succeeds yields `Created`, a
//! conflict is recovered through the step's lookup and yields `Adopted`, and
//! everything else is logged and turned into a `Degraded` outcome.
use std::fmt::Display;

#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// The object was created by this run.
    Created(String),
    /// The object already existed and its identifier was recovered.
    Adopted(String),
    /// An unconditional overwrite was applied.
    Replaced(String),
    Degraded(Degraded),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Degraded {
    /// The object was reported as existing but the lookup found no match.
    NotFound,
    /// The remote call failed for a reason other than a conflict.
    Failed(String),
    /// An identifier this step depends on was never populated.
    MissingInput(&'static str),
}

impl StepOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            StepOutcome::Created(id) | StepOutcome::Adopted(id) | StepOutcome::Replaced(id) => {
                Some(id)
            }
            StepOutcome::Degraded(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StepOutcome::Degraded(_))
    }
}

/// Runs `create`; on a conflict (as decided by `is_conflict`) runs `lookup` once
/// to recover the existing identifier.
pub async fn execute<E, C, CFut, L, LFut, P>(
    step: &str,
    create: C,
    lookup: L,
    is_conflict: P,
) -> StepOutcome
where
    E: Display,
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<String, E>>,
    L: FnOnce() -> LFut,
    LFut: Future<Output = Result<Option<String>, E>>,
    P: Fn(&E) -> bool,
{
    let err = match create().await {
        Ok(id) => {
            tracing::info!(step, id = %id, "created");
            return StepOutcome::Created(id);
        }
        Err(err) => err,
    };

    if !is_conflict(&err) {
        tracing::error!(step, error = %err, "step failed");
        return StepOutcome::Degraded(Degraded::Failed(err.to_string()));
    }

    tracing::info!(step, "already exists, looking it up");
    match lookup().await {
        Ok(Some(id)) => {
            tracing::info!(step, id = %id, "adopted existing");
            StepOutcome::Adopted(id)
        }
        Ok(None) => {
            tracing::warn!(step, "reported as existing but not found by lookup");
            StepOutcome::Degraded(Degraded::NotFound)
        }
        Err(err) => {
            tracing::error!(step, error = %err, "lookup failed");
            StepOutcome::Degraded(Degraded::Failed(err.to_string()))
        }
    }
}

/// Lookup for objects addressed by name: when the create conflicts, the name is the identifier.
pub fn existing<E>(name: &str) -> std::future::Ready<Result<Option<String>, E>> {
    std::future::ready(Ok(Some(name.to_string())))
}
