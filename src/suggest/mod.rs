//! Suggestion engine for codelift
//!
//! `Suggester::analyze` fans one source blob out to three independent model calls
//! (components, reusable styles, project layout) and settles all of them before
//! answering. `Suggester::enhance` is the single-call variant that rewrites one file.

pub mod llm;
pub mod settle;

use crate::project::{ProjectFile, ProjectStructure};
use llm::parse::{
    parse_component_suggestions, parse_enhanced_code, parse_project_files,
    parse_style_suggestions,
};
use llm::prompts::{
    format_components_prompt, format_enhance_prompt, format_project_prompt,
    format_styles_prompt, COMPONENTS_SYSTEM, ENHANCE_SYSTEM, PROJECT_SYSTEM, STYLES_SYSTEM,
};
use llm::{GenerationRequest, Model, TextGenerator, Usage};
use serde::Serialize;
use settle::{aggregate, describe_join_error, settle_branch, Branch, BranchOutcomes};
use std::sync::Arc;
use thiserror::Error;

/// Failures surfaced to callers of `analyze` and `enhance`.
///
/// A partial upstream failure has no variant: it shows up as empty fields
/// and `Suggestions::degraded`, not as an error.
#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("Code input is empty.")]
    EmptyInput,
    #[error("Failed to get suggestions from AI.")]
    AllUpstreamFailed,
    #[error("An unexpected error occurred while analyzing the code: {0}")]
    Unexpected(String),
    /// Enhancement failure, message kept verbatim.
    #[error("{0}")]
    Upstream(String),
    #[error("No generated file at {0}")]
    UnknownFile(String),
}

impl SuggestError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            SuggestError::EmptyInput => "empty-input",
            SuggestError::AllUpstreamFailed => "all-upstream-failed",
            SuggestError::Unexpected(_) => "unexpected",
            SuggestError::Upstream(_) => "upstream",
            SuggestError::UnknownFile(_) => "unknown-file",
        }
    }
}

/// A validated, immutable analysis input shared by the three branches.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    source: Arc<str>,
}

impl AnalysisRequest {
    /// Rejects empty and whitespace-only input.
    pub fn new(source: &str) -> Result<Self, SuggestError> {
        if source.trim().is_empty() {
            return Err(SuggestError::EmptyInput);
        }
        Ok(Self {
            source: Arc::from(source),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A branch payload plus the token usage it cost.
#[derive(Debug, Clone)]
pub(crate) struct Generated<T> {
    pub value: T,
    pub usage: Option<Usage>,
}

/// Aggregated analysis result. Fields of failed branches are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suggestions {
    /// Markdown describing the suggested component split
    pub components: String,
    /// Style suggestions, newline-joined in the order received
    pub styles: String,
    pub project: ProjectStructure,
    /// Branches that failed, in branch order. Reasons are logged, not kept.
    pub degraded: Vec<Branch>,
    pub usage: Option<Usage>,
}

impl Suggestions {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Replacement body for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Enhancement {
    pub enhanced_code: String,
    pub usage: Option<Usage>,
}

/// Wire form of an analysis result: either the three fields or a single error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Success {
        components: String,
        styles: String,
        project: Vec<ProjectFile>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        degraded: Vec<Branch>,
    },
    Failure {
        error: String,
    },
}

impl From<Result<Suggestions, SuggestError>> for AnalysisResponse {
    fn from(result: Result<Suggestions, SuggestError>) -> Self {
        match result {
            Ok(s) => AnalysisResponse::Success {
                components: s.components,
                styles: s.styles,
                project: s.project.into_files(),
                degraded: s.degraded,
            },
            Err(err) => AnalysisResponse::Failure {
                error: err.to_string(),
            },
        }
    }
}

/// Wire form of an enhancement result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EnhancementResponse {
    Success {
        #[serde(rename = "enhancedCode")]
        enhanced_code: String,
    },
    Failure {
        error: String,
    },
}

impl From<Result<Enhancement, SuggestError>> for EnhancementResponse {
    fn from(result: Result<Enhancement, SuggestError>) -> Self {
        match result {
            Ok(e) => EnhancementResponse::Success {
                enhanced_code: e.enhanced_code,
            },
            Err(err) => EnhancementResponse::Failure {
                error: err.to_string(),
            },
        }
    }
}

/// Entry point for analysis and enhancement. Holds no per-call state.
#[derive(Clone)]
pub struct Suggester {
    generator: Arc<dyn TextGenerator>,
}

impl Suggester {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Analyze a legacy source blob.
    ///
    /// Empty input fails before any call is made. Otherwise exactly three model calls
    /// are issued concurrently and all of them are awaited; the result is partial
    /// unless every call failed. Branch tasks are detached, so dropping this future
    /// does not cancel calls already in flight.
    pub async fn analyze(&self, source: &str) -> Result<Suggestions, SuggestError> {
        let request = AnalysisRequest::new(source)?;
        let generator = Arc::clone(&self.generator);

        match tokio::spawn(run_analysis(generator, request)).await {
            Ok(result) => result,
            Err(err) => {
                let detail = describe_join_error(&err);
                tracing::error!("analysis aborted: {}", detail);
                Err(SuggestError::Unexpected(detail))
            }
        }
    }

    /// Rewrite one file according to a free-text instruction.
    ///
    /// The instruction is passed through as-is, empty or not. The caller decides
    /// which project file the result replaces.
    pub async fn enhance(
        &self,
        file_content: &str,
        instruction: &str,
    ) -> Result<Enhancement, SuggestError> {
        let generator = Arc::clone(&self.generator);
        let request = GenerationRequest::new(
            ENHANCE_SYSTEM,
            format_enhance_prompt(file_content, instruction),
            Model::Smart,
        );

        let call = tokio::spawn(async move {
            let response = generator.generate(request).await?;
            let enhanced_code = parse_enhanced_code(&response.content)?;
            Ok::<_, anyhow::Error>(Enhancement {
                enhanced_code,
                usage: response.usage,
            })
        });

        match call.await {
            Ok(Ok(enhancement)) => Ok(enhancement),
            Ok(Err(err)) => {
                tracing::warn!("enhancement failed: {:#}", err);
                Err(SuggestError::Upstream(err.to_string()))
            }
            Err(err) => Err(SuggestError::Unexpected(describe_join_error(&err))),
        }
    }

    /// Enhance the generated file at `path` and swap the result into `project`.
    ///
    /// On failure the project is left untouched.
    pub async fn enhance_file(
        &self,
        project: &mut ProjectStructure,
        path: &str,
        instruction: &str,
    ) -> Result<Enhancement, SuggestError> {
        let current = project
            .get(path)
            .map(|file| file.content.clone())
            .ok_or_else(|| SuggestError::UnknownFile(path.to_string()))?;

        let enhancement = self.enhance(&current, instruction).await?;
        project.replace_content(path, enhancement.enhanced_code.clone());
        Ok(enhancement)
    }
}

async fn run_analysis(
    generator: Arc<dyn TextGenerator>,
    request: AnalysisRequest,
) -> Result<Suggestions, SuggestError> {
    tracing::debug!(bytes = request.source().len(), "dispatching analysis branches");

    let components = tokio::spawn(suggest_components(
        Arc::clone(&generator),
        request.clone(),
    ));
    let styles = tokio::spawn(suggest_styles(Arc::clone(&generator), request.clone()));
    let project = tokio::spawn(generate_project(generator, request));

    let (components, styles, project) = tokio::join!(components, styles, project);

    aggregate(BranchOutcomes {
        components: settle_branch(Branch::Components, components),
        styles: settle_branch(Branch::Styles, styles),
        project: settle_branch(Branch::Project, project),
    })
}

async fn suggest_components(
    generator: Arc<dyn TextGenerator>,
    request: AnalysisRequest,
) -> settle::Outcome<String> {
    let response = generator
        .generate(GenerationRequest::new(
            COMPONENTS_SYSTEM,
            format_components_prompt(request.source()),
            Model::Speed,
        ))
        .await?;
    Ok(Generated {
        value: parse_component_suggestions(&response.content)?,
        usage: response.usage,
    })
}

async fn suggest_styles(
    generator: Arc<dyn TextGenerator>,
    request: AnalysisRequest,
) -> settle::Outcome<Vec<String>> {
    let response = generator
        .generate(GenerationRequest::new(
            STYLES_SYSTEM,
            format_styles_prompt(request.source()),
            Model::Speed,
        ))
        .await?;
    Ok(Generated {
        value: parse_style_suggestions(&response.content)?,
        usage: response.usage,
    })
}

async fn generate_project(
    generator: Arc<dyn TextGenerator>,
    request: AnalysisRequest,
) -> settle::Outcome<Vec<ProjectFile>> {
    let response = generator
        .generate(GenerationRequest::new(
            PROJECT_SYSTEM,
            format_project_prompt(request.source()),
            Model::Smart,
        ))
        .await?;
    Ok(Generated {
        value: parse_project_files(&response.content)?,
        usage: response.usage,
    })
}
