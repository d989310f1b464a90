pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod diagnostics;
pub mod error;
mod inflight;
pub mod models;
pub mod project;
pub mod session;

use std::sync::Arc;

pub use api::ApiClient;
pub use auth::{AuthError, LoginController};
pub use chat::{ChatController, ChatError, ChatState};
pub use config::KidvibeConfig;
pub use diagnostics::{DiagnosticsController, DiagnosticsError};
pub use error::KidvibeError;
pub use models::{AnalysisResult, ChatMessage, Project, ProjectDraft, Role, TurnFailure};
pub use project::{AnalysisOutcome, ProjectController, ProjectError, ProjectState};
pub use session::{
    FileStorage, MemoryStorage, Session, SessionError, SessionHolder, SessionStorage,
};

/// Build the API client and the file-backed session holder from config.
pub fn bootstrap(
    config: &KidvibeConfig,
) -> Result<(ApiClient, Arc<SessionHolder<FileStorage>>), KidvibeError> {
    let api = ApiClient::new(&config.api)?;
    let dir = config
        .session
        .resolve_storage_dir()
        .ok_or(SessionError::NoStorageDir)?;
    Ok((api, Arc::new(SessionHolder::new(FileStorage::new(dir)))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_uses_configured_storage_dir() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let mut config = KidvibeConfig::default();
        config.api.base_url = "http://127.0.0.1:9/".to_string();
        config.session.storage_dir = Some(tmp.path().to_path_buf());

        let (api, sessions) = bootstrap(&config).unwrap();
        assert_eq!(api.base_url(), "http://127.0.0.1:9");
        assert_eq!(sessions.storage().dir(), tmp.path());
        assert!(sessions.current_session().is_none());
    }
}
