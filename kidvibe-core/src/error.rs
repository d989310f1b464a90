use thiserror::Error;

use crate::auth::AuthError;
use crate::chat::ChatError;
use crate::diagnostics::DiagnosticsError;
use crate::project::ProjectError;
use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum KidvibeError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Login error: {0}")]
    Auth(#[from] AuthError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    #[error("Diagnostics error: {0}")]
    Diagnostics(#[from] DiagnosticsError),
}
