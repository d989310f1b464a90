//! kidvibe: command-line client for the KidVibe API
//!
//! Each subcommand stands in for one screen of the web client.
//!
//! # Subcommands
//! - `login --email <e> --password <p>`: log in and store the session
//! - `logout` / `whoami`: manage the stored session
//! - `chat [MESSAGE]`: talk to the AI assistant
//! - `project analyze|create|list`: create-project screen (login required)
//! - `diag health|chat|login|cors`: raw diagnostic probes

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kidvibe_core::auth::{DEFAULT_EMAIL, DEFAULT_PASSWORD};
use kidvibe_core::diagnostics::DEFAULT_CORS_ORIGIN;
use kidvibe_core::project::CREATED_MESSAGE;
use kidvibe_core::{
    AnalysisOutcome, AnalysisResult, ApiClient, ChatController, ChatMessage,
    DiagnosticsController, FileStorage, KidvibeConfig, LoginController, Project,
    ProjectController, Role, Session, SessionError, SessionHolder,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "kidvibe", version, about = "KidVibe AI app builder client")]
struct Cli {
    /// KidVibe API base URL (overrides the config file)
    #[arg(long, env = "KIDVIBE_API_URL")]
    server: Option<String>,

    /// Optional TOML config file
    #[arg(short, long, env = "KIDVIBE_CONFIG", default_value = "kidvibe.toml")]
    config: String,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long, env = "KIDVIBE_EMAIL")]
        email: String,

        #[arg(long, env = "KIDVIBE_PASSWORD")]
        password: String,
    },

    /// Clear the stored session
    Logout,

    /// Show the stored session
    Whoami {
        #[arg(long)]
        json: bool,
    },

    /// Chat with the AI assistant (interactive when no message is given)
    Chat {
        message: Option<String>,

        /// Print the transcript as JSON when done
        #[arg(long)]
        json: bool,
    },

    /// Project creation (requires login)
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Diagnostic probes
    #[command(subcommand)]
    Diag(DiagCommand),
}

#[derive(Debug, Subcommand)]
enum ProjectCommand {
    /// Analyze a project description
    Analyze {
        description: String,

        /// Report analysis failures instead of showing the default analysis
        #[arg(long)]
        strict: bool,

        #[arg(long)]
        json: bool,
    },

    /// Create a project
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: String,

        /// Analyze the description first and submit the suggested tech stack
        #[arg(long)]
        analyze: bool,

        /// With --analyze: abort if the analysis fails
        #[arg(long)]
        strict: bool,
    },

    /// List your projects
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DiagCommand {
    /// GET /health
    Health,

    /// Send a raw chat request and print the response body
    Chat { message: String },

    /// Try logging in without storing the session
    Login {
        #[arg(long, default_value = DEFAULT_EMAIL)]
        email: String,

        #[arg(long, default_value = DEFAULT_PASSWORD)]
        password: String,
    },

    /// CORS preflight against the login endpoint
    Cors {
        #[arg(long, default_value = DEFAULT_CORS_ORIGIN)]
        origin: String,
    },
}

// ============================================================================
// Rendering
// ============================================================================

fn render_turn(message: &ChatMessage) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let time = message.timestamp.format("%H:%M:%S");
    if message.is_failure() {
        format!("[{}] {} (!): {}", time, who, message.content)
    } else {
        format!("[{}] {}: {}", time, who, message.content)
    }
}

fn render_analysis(analysis: &AnalysisResult) -> String {
    let mut out = String::from("推荐技术栈\n");
    for (layer, tech) in &analysis.tech_stack {
        let tech = tech.as_str().map(str::to_string).unwrap_or_else(|| tech.to_string());
        out.push_str(&format!("  {:<10} {}\n", layer, tech));
    }
    out.push_str("功能特性\n");
    for feature in &analysis.features {
        out.push_str(&format!("  • {}\n", feature));
    }
    out.push_str(&format!("复杂度:   {}\n", analysis.complexity));
    out.push_str(&format!("预计时间: {}", analysis.estimated_time));
    out
}

fn render_project(project: &Project) -> String {
    format!(
        "#{:<4} {:<24} {:<10} {}",
        project.id,
        project.name,
        project.status.as_deref().unwrap_or("-"),
        project.description.as_deref().unwrap_or("")
    )
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

struct App {
    config: KidvibeConfig,
    api: ApiClient,
    sessions: Arc<SessionHolder<FileStorage>>,
}

impl App {
    /// The session for a protected screen; without one the user is sent to login.
    fn require_session(&self) -> anyhow::Result<Session> {
        match self.sessions.require_session() {
            Ok(s) => Ok(s),
            Err(SessionError::NotLoggedIn) => {
                anyhow::bail!("not logged in, run `kidvibe login` first")
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn do_login(app: &App, email: &str, password: &str) -> anyhow::Result<()> {
    let auth = LoginController::new(app.api.clone(), app.sessions.clone());
    let session = auth.login(email, password).await?;
    println!(
        "Logged in as {}",
        session.email.as_deref().unwrap_or(email)
    );
    Ok(())
}

fn do_whoami(app: &App, json: bool) -> anyhow::Result<()> {
    match app.sessions.current_session() {
        Some(session) if json => print_json(&serde_json::json!({
            "logged_in": true,
            "email": session.email,
        })),
        Some(session) => {
            println!(
                "Logged in as {}",
                session.email.as_deref().unwrap_or("<unknown user>")
            );
            Ok(())
        }
        None if json => print_json(&serde_json::json!({ "logged_in": false })),
        None => {
            println!("Not logged in");
            Ok(())
        }
    }
}

async fn do_chat(app: &App, message: Option<String>, json: bool) -> anyhow::Result<()> {
    let chat = ChatController::new(app.api.clone());

    match message {
        Some(message) => {
            chat.send_message(&message).await?;
            if !json {
                for turn in chat.messages() {
                    println!("{}", render_turn(&turn));
                }
            }
        }
        None => {
            eprintln!("KidVibe AI 助手: type a message, /quit to exit");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line == "/quit" || line == "/exit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                let reply = chat.send_message(line).await?;
                if !json {
                    println!("{}", render_turn(&reply));
                }
            }
        }
    }

    if json {
        print_json(&chat.messages())?;
    }
    Ok(())
}

async fn analyze(
    app: &App,
    projects: &ProjectController,
    description: &str,
    strict: bool,
) -> anyhow::Result<AnalysisResult> {
    if strict || !app.config.project.fallback_on_analyze_error {
        return Ok(projects.analyze(description).await?);
    }
    match projects.analyze_or_fallback(description).await? {
        AnalysisOutcome::Analyzed(a) => {
            if let Some(error) = &a.error {
                eprintln!("warning: the server reported a degraded analysis: {}", error);
            }
            Ok(a)
        }
        AnalysisOutcome::Fallback { analysis, error } => {
            eprintln!("warning: analysis failed ({}); showing the default analysis", error);
            Ok(analysis)
        }
    }
}

async fn do_project(app: &App, command: ProjectCommand) -> anyhow::Result<()> {
    let session = app.require_session()?;
    let projects = ProjectController::new(app.api.clone(), session);

    match command {
        ProjectCommand::Analyze {
            description,
            strict,
            json,
        } => {
            let analysis = analyze(app, &projects, &description, strict).await?;
            if json {
                print_json(&analysis)
            } else {
                println!("{}", render_analysis(&analysis));
                Ok(())
            }
        }
        ProjectCommand::Create {
            name,
            description,
            analyze: with_analysis,
            strict,
        } => {
            if with_analysis {
                let analysis = analyze(app, &projects, &description, strict).await?;
                println!("{}\n", render_analysis(&analysis));
            }
            projects
                .create_project(&name, &description)
                .await
                .context("项目创建失败")?;
            println!("{}", CREATED_MESSAGE);
            Ok(())
        }
        ProjectCommand::List { json } => {
            let list = projects.list_projects().await?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                eprintln!("No projects yet");
            }
            for project in &list {
                println!("{}", render_project(project));
            }
            Ok(())
        }
    }
}

async fn do_diag(app: &App, command: DiagCommand) -> anyhow::Result<()> {
    let diag = DiagnosticsController::new(app.api.clone());
    let result = match command {
        DiagCommand::Health => diag.health().await,
        DiagCommand::Chat { message } => diag.test_chat(&message).await?,
        DiagCommand::Login { email, password } => diag.test_login(&email, &password).await,
        DiagCommand::Cors { origin } => diag.test_cors(&origin).await,
    };
    println!("{}", result);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = KidvibeConfig::load(Some(cli.config.as_str()))
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    if let Some(server) = cli.server {
        config.api.base_url = server;
    }

    let (api, sessions) = kidvibe_core::bootstrap(&config)?;
    tracing::debug!(base_url = api.base_url(), "client ready");
    let app = App {
        config,
        api,
        sessions,
    };

    match cli.command {
        Commands::Login { email, password } => do_login(&app, &email, &password).await,
        Commands::Logout => {
            app.sessions.logout()?;
            println!("Logged out");
            Ok(())
        }
        Commands::Whoami { json } => do_whoami(&app, json),
        Commands::Chat { message, json } => do_chat(&app, message, json).await,
        Commands::Project(command) => do_project(&app, command).await,
        Commands::Diag(command) => do_diag(&app, command).await,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("kidvibe: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use kidvibe_core::TurnFailure;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_project_create() {
        let cli = Cli::try_parse_from([
            "kidvibe",
            "project",
            "create",
            "--name",
            "Todo",
            "--description",
            "a todo app",
            "--analyze",
        ])
        .unwrap();
        match cli.command {
            Commands::Project(ProjectCommand::Create {
                name,
                analyze,
                strict,
                ..
            }) => {
                assert_eq!(name, "Todo");
                assert!(analyze);
                assert!(!strict);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_diag_login_defaults_to_admin_account() {
        let cli = Cli::try_parse_from(["kidvibe", "diag", "login"]).unwrap();
        match cli.command {
            Commands::Diag(DiagCommand::Login { email, password }) => {
                assert_eq!(email, DEFAULT_EMAIL);
                assert_eq!(password, DEFAULT_PASSWORD);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_render_turn_marks_failures() {
        let ok = render_turn(&ChatMessage::assistant("hi"));
        assert!(ok.ends_with("assistant: hi"));

        let failed = render_turn(&ChatMessage::failed("网络错误", TurnFailure::Network));
        assert!(failed.ends_with("assistant (!): 网络错误"));

        assert!(render_turn(&ChatMessage::user("q")).ends_with("you: q"));
    }

    #[test]
    fn test_render_analysis_lists_stack_and_features() {
        let text = render_analysis(&AnalysisResult::canned());
        assert!(text.contains("frontend"));
        assert!(text.contains("nextjs"));
        assert!(text.contains("• 用户认证"));
        assert!(text.ends_with("预计时间: 2-3周"));
        assert!(!text.contains("\"nextjs\""));
    }

    #[test]
    fn test_render_project_handles_missing_fields() {
        let project: Project = serde_json::from_str(r#"{"id": 3, "name": "Game"}"#).unwrap();
        let line = render_project(&project);
        assert!(line.starts_with("#3"));
        assert!(line.contains("Game"));
        assert!(line.contains(" - "));
    }
}
