pub mod message;
pub mod project;

pub use message::{ChatMessage, Role, TurnFailure};
pub use project::{AnalysisResult, CreateProjectRequest, Project, ProjectDraft, PLANNING_STATUS};
