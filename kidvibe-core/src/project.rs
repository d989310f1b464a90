//! Project-creation controller.
//!
//! Holds the current [`AnalysisResult`] for one authenticated [`Session`] and
//! runs at most one of analyze / create at a time.

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::api::{read_detail, ApiClient, ANALYZE_PATH, PROJECTS_PATH};
use crate::inflight::OpSlot;
use crate::models::{AnalysisResult, CreateProjectRequest, Project, ProjectDraft};
use crate::session::Session;

/// Used when a failed create carries no `detail`.
pub const UNKNOWN_ERROR: &str = "未知错误";
/// Confirmation shown after a successful create.
pub const CREATED_MESSAGE: &str = "项目创建成功！";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectState {
    Idle,
    Analyzing,
    Creating,
}

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Another operation is running: {0:?}")]
    Busy(ProjectState),

    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ProjectError {
    /// True for failures of the request itself, as opposed to local
    /// validation or a concurrent operation.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            ProjectError::Api { .. } | ProjectError::Http(_) | ProjectError::Decode(_)
        )
    }
}

/// Result of [`ProjectController::analyze_or_fallback`].
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// Produced by the analyze endpoint.
    Analyzed(AnalysisResult),
    /// The canned analysis, substituted because the request failed.
    Fallback {
        analysis: AnalysisResult,
        error: ProjectError,
    },
}

impl AnalysisOutcome {
    pub fn analysis(&self) -> &AnalysisResult {
        match self {
            AnalysisOutcome::Analyzed(a) => a,
            AnalysisOutcome::Fallback { analysis, .. } => analysis,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AnalysisOutcome::Fallback { .. })
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    description: &'a str,
}

pub struct ProjectController {
    api: ApiClient,
    session: Session,
    analysis: Mutex<Option<AnalysisResult>>,
    state: OpSlot<ProjectState>,
}

impl ProjectController {
    pub fn new(api: ApiClient, session: Session) -> Self {
        Self {
            api,
            session,
            analysis: Mutex::new(None),
            state: OpSlot::new(ProjectState::Idle),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> ProjectState {
        self.state.current()
    }

    pub fn analysis(&self) -> Option<AnalysisResult> {
        self.analysis.lock().clone()
    }

    pub fn set_analysis(&self, analysis: Option<AnalysisResult>) {
        *self.analysis.lock() = analysis;
    }

    /// Ask the backend to analyze a description. On success the result
    /// replaces the stored analysis; on failure the stored analysis is untouched.
    pub async fn analyze(&self, description: &str) -> Result<AnalysisResult, ProjectError> {
        if description.trim().is_empty() {
            return Err(ProjectError::MissingField("description"));
        }
        let _guard = self
            .state
            .try_begin(ProjectState::Analyzing)
            .map_err(ProjectError::Busy)?;

        let result = self.request_analysis(description).await?;
        self.set_analysis(Some(result.clone()));
        Ok(result)
    }

    /// Like [`analyze`](Self::analyze), but a failed request yields the canned
    /// analysis, stored and returned as [`AnalysisOutcome::Fallback`].
    pub async fn analyze_or_fallback(
        &self,
        description: &str,
    ) -> Result<AnalysisOutcome, ProjectError> {
        match self.analyze(description).await {
            Ok(a) => Ok(AnalysisOutcome::Analyzed(a)),
            Err(error) if error.is_request_failure() => {
                tracing::warn!(error = %error, "analysis failed, substituting canned analysis");
                let analysis = AnalysisResult::canned();
                self.set_analysis(Some(analysis.clone()));
                Ok(AnalysisOutcome::Fallback { analysis, error })
            }
            Err(error) => Err(error),
        }
    }

    async fn request_analysis(&self, description: &str) -> Result<AnalysisResult, ProjectError> {
        let response = self
            .api
            .post_json(
                ANALYZE_PATH,
                &AnalyzeRequest { description },
                Some(self.session.bearer()),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = read_detail(response)
                .await
                .unwrap_or_else(|| status.to_string());
            return Err(ProjectError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ProjectError::Decode(e.to_string()))
    }

    /// Submit a new project with the current analysis' tech stack (or `{}`).
    ///
    /// Returns the server's JSON on success. Local state is not changed.
    pub async fn create_project(
        &self,
        name: &str,
        description: &str,
    ) -> Result<serde_json::Value, ProjectError> {
        if name.trim().is_empty() {
            return Err(ProjectError::MissingField("name"));
        }
        if description.trim().is_empty() {
            return Err(ProjectError::MissingField("description"));
        }
        let _guard = self
            .state
            .try_begin(ProjectState::Creating)
            .map_err(ProjectError::Busy)?;

        let draft = ProjectDraft::new(name, description);
        let analysis = self.analysis();
        let body = CreateProjectRequest::from_draft(&draft, analysis.as_ref());

        let response = self
            .api
            .post_json(PROJECTS_PATH, &body, Some(self.session.bearer()))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = read_detail(response)
                .await
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            tracing::warn!(status = status.as_u16(), %detail, "project creation rejected");
            return Err(ProjectError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let created = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);
        tracing::info!(name, "project created");
        Ok(created)
    }

    /// Projects owned by the session's user.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ProjectError> {
        let response = self
            .api
            .get(PROJECTS_PATH, Some(self.session.bearer()))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = read_detail(response)
                .await
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            return Err(ProjectError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ProjectError::Decode(e.to_string()))
    }
}
