use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status sent with every newly created project.
pub const PLANNING_STATUS: &str = "planning";

/// AI analysis of a project description. Always replaced wholesale.
///
/// Any JSON object decodes: missing fields come back empty and stack entries
/// keep whatever JSON the server sent, so the backend's degraded reply
/// (`error` plus a partial stack) is kept rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub tech_stack: BTreeMap<String, serde_json::Value>,
    pub features: Vec<String>,
    pub complexity: String,
    pub estimated_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// The fixed analysis shown when the analyze call fails.
    pub fn canned() -> Self {
        let tech_stack = [
            ("frontend", "nextjs"),
            ("backend", "fastapi"),
            ("database", "sqlite"),
            ("styling", "tailwind"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
        .collect();

        Self {
            tech_stack,
            features: vec![
                "用户认证".to_string(),
                "数据管理".to_string(),
                "响应式设计".to_string(),
            ],
            complexity: "中等".to_string(),
            estimated_time: "2-3周".to_string(),
            error: None,
        }
    }
}

/// Transient create-project form state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
}

impl ProjectDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Body of `POST /api/v1/projects/`.
#[derive(Debug, Serialize)]
pub struct CreateProjectRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub tech_stack: BTreeMap<String, serde_json::Value>,
    pub status: &'a str,
}

impl<'a> CreateProjectRequest<'a> {
    pub fn from_draft(draft: &'a ProjectDraft, analysis: Option<&AnalysisResult>) -> Self {
        Self {
            name: &draft.name,
            description: &draft.description,
            tech_stack: analysis.map(|a| a.tech_stack.clone()).unwrap_or_default(),
            status: PLANNING_STATUS,
        }
    }
}

/// A project record as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tech_stack: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canned_analysis_is_deterministic() {
        assert_eq!(AnalysisResult::canned(), AnalysisResult::canned());
        let canned = AnalysisResult::canned();
        assert_eq!(canned.tech_stack["frontend"], "nextjs");
        assert_eq!(canned.tech_stack.len(), 4);
        assert_eq!(canned.features.len(), 3);
        assert_eq!(canned.estimated_time, "2-3周");
    }

    #[test]
    fn create_request_without_analysis_sends_empty_stack() {
        let draft = ProjectDraft::new("Todo", "A todo app");
        let body = serde_json::to_value(CreateProjectRequest::from_draft(&draft, None)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "Todo",
                "description": "A todo app",
                "tech_stack": {},
                "status": "planning"
            })
        );
    }

    #[test]
    fn create_request_carries_analysis_stack() {
        let draft = ProjectDraft::new("Todo", "A todo app");
        let analysis = AnalysisResult::canned();
        let body =
            serde_json::to_value(CreateProjectRequest::from_draft(&draft, Some(&analysis))).unwrap();
        assert_eq!(body["tech_stack"]["database"], "sqlite");
    }

    #[test]
    fn degraded_backend_reply_decodes() {
        let analysis: AnalysisResult = serde_json::from_str(
            r#"{"error":"需求分析失败：quota","tech_stack":{"frontend":"nextjs","backend":"fastapi"},"features":[],"complexity":"未知"}"#,
        )
        .unwrap();
        assert_eq!(analysis.tech_stack.len(), 2);
        assert_eq!(analysis.complexity, "未知");
        assert_eq!(analysis.estimated_time, "");
        assert_eq!(analysis.error.as_deref(), Some("需求分析失败：quota"));
    }

    #[test]
    fn non_string_stack_entries_are_kept() {
        let analysis: AnalysisResult =
            serde_json::from_str(r#"{"tech_stack":{"frontend":["react","vite"]}}"#).unwrap();
        let draft = ProjectDraft::new("Todo", "A todo app");
        let body =
            serde_json::to_value(CreateProjectRequest::from_draft(&draft, Some(&analysis))).unwrap();
        assert_eq!(body["tech_stack"], serde_json::json!({ "frontend": ["react", "vite"] }));
    }

    #[test]
    fn project_decodes_with_sparse_fields() {
        let p: Project = serde_json::from_str(r#"{"id": 7, "name": "Game"}"#).unwrap();
        assert_eq!(p.id, 7);
        assert!(p.description.is_none());
    }
}
