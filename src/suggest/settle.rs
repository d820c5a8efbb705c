//! Settle-all aggregation of the three analysis branches.
//!
//! Each branch reaches a terminal outcome on its own. A failed branch leaves its
//! field empty; only a failure of every branch turns into an error.

use super::{Generated, SuggestError, Suggestions};
use crate::project::{ProjectFile, ProjectStructure};
use crate::suggest::llm::Usage;
use serde::Serialize;
use std::fmt;
use tokio::task::JoinError;

/// The three independent analysis requests derived from one source blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Components,
    Styles,
    Project,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Components, Branch::Styles, Branch::Project];

    pub fn label(&self) -> &'static str {
        match self {
            Branch::Components => "component suggestions",
            Branch::Styles => "style suggestions",
            Branch::Project => "project structure",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub(crate) type Outcome<T> = anyhow::Result<Generated<T>>;

/// Terminal outcome of every branch, success or failure.
pub(crate) struct BranchOutcomes {
    pub components: Outcome<String>,
    pub styles: Outcome<Vec<String>>,
    pub project: Outcome<Vec<ProjectFile>>,
}

/// Fold a spawned branch's join result into its outcome. A branch that panicked
/// or was cancelled counts as a failed branch, nothing more.
pub(crate) fn settle_branch<T>(branch: Branch, joined: Result<Outcome<T>, JoinError>) -> Outcome<T> {
    match joined {
        Ok(outcome) => outcome,
        Err(err) => Err(anyhow::anyhow!(
            "{} task did not complete: {}",
            branch,
            describe_join_error(&err)
        )),
    }
}

pub(crate) fn describe_join_error(err: &JoinError) -> String {
    if err.is_cancelled() {
        return "task was cancelled".to_string();
    }
    // JoinError's Display already carries the panic payload when it is a string.
    err.to_string()
}

pub(crate) fn aggregate(outcomes: BranchOutcomes) -> Result<Suggestions, SuggestError> {
    let mut degraded = Vec::new();
    let mut usage: Option<Usage> = None;

    let components = take(Branch::Components, outcomes.components, &mut degraded, &mut usage)
        .unwrap_or_default();
    let styles = take(Branch::Styles, outcomes.styles, &mut degraded, &mut usage)
        .map(|suggestions| suggestions.join("\n"))
        .unwrap_or_default();
    let project = take(Branch::Project, outcomes.project, &mut degraded, &mut usage)
        .map(ProjectStructure::new)
        .unwrap_or_default();

    if degraded.len() == Branch::ALL.len() {
        tracing::error!("every analysis branch failed");
        return Err(SuggestError::AllUpstreamFailed);
    }

    Ok(Suggestions {
        components,
        styles,
        project,
        degraded,
        usage,
    })
}

fn take<T>(
    branch: Branch,
    outcome: Outcome<T>,
    degraded: &mut Vec<Branch>,
    usage: &mut Option<Usage>,
) -> Option<T> {
    match outcome {
        Ok(generated) => {
            if let Some(branch_usage) = generated.usage {
                *usage = Some(match usage.take() {
                    Some(total) => total.merge(&branch_usage),
                    None => branch_usage,
                });
            }
            Some(generated.value)
        }
        Err(err) => {
            tracing::warn!(branch = %branch, "analysis branch failed: {:#}", err);
            degraded.push(branch);
            None
        }
    }
}
