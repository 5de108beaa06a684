//! helpdesk-cli: terminal frontend for the Helpdesk chat HTTP API
//!
//! # Subcommands
//! - `ask <session> <message>`      run one chat turn and print the reply
//! - `sessions [--json]`            list sessions, most recently updated first
//! - `show <session> [--json]`      print the full transcript of a session
//! - `status`                       show server health

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:3001";
const PREVIEW_CHARS: usize = 60;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "helpdesk-cli", version, about = "Helpdesk chat assistant CLI")]
struct Cli {
    /// Helpdesk HTTP server URL (overrides HELPDESK_HTTP_URL env var)
    #[arg(long, env = "HELPDESK_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a question within a session
    Ask {
        /// Session identifier; created on first use
        session: String,

        /// Question text
        message: String,
    },

    /// List sessions
    Sessions {
        /// Print the raw JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show a session transcript
    Show {
        session: String,

        /// Print the raw JSON detail
        #[arg(long)]
        json: bool,
    },

    /// Show Helpdesk server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub tokens_used: u64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: String,
    pub created_at: String,
    pub last_updated: String,
    pub preview: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub tokens_used: u64,
    pub created_at: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session_id: String,
    pub messages: Vec<MessageRow>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: String,
}

// ============================================================================
// Formatting
// ============================================================================

/// First line of `text`, capped at `max` characters with a trailing ellipsis.
pub fn truncate_preview(text: &str, max: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let mut out: String = line.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn format_session_row(row: &SessionRow) -> String {
    let preview = row
        .preview
        .as_deref()
        .map(|p| truncate_preview(p, PREVIEW_CHARS))
        .unwrap_or_else(|| "(no messages)".to_string());
    format!("{:<24} {}  {}", row.id, row.last_updated, preview)
}

pub fn format_message(msg: &MessageRow) -> String {
    let speaker = match msg.role.as_str() {
        "user" => "You",
        "assistant" => "Helpdesk",
        other => other,
    };
    if msg.tokens_used > 0 {
        format!("[{}] {} ({} tokens):\n{}", msg.created_at, speaker, msg.tokens_used, msg.content)
    } else {
        format!("[{}] {}:\n{}", msg.created_at, speaker, msg.content)
    }
}

pub fn format_transcript(detail: &SessionDetail) -> String {
    if detail.messages.is_empty() {
        return format!("Session {} has no messages.", detail.session_id);
    }
    let body: Vec<String> = detail.messages.iter().map(format_message).collect();
    format!("Session {}\n\n{}", detail.session_id, body.join("\n\n"))
}

/// Detail URL for one session. The id is pushed as a single path segment so
/// `/`, `?` and `#` are percent-encoded instead of reshaping the route.
pub fn session_url(server: &str, session: &str) -> anyhow::Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(server)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("server URL cannot be a base: {}", server))?
        .pop_if_empty()
        .extend(["api", "sessions", session]);
    Ok(url)
}

/// Pull `{error}` out of a failure body, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    // Covers a full upstream completion.
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?)
}

fn read_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::blocking::Response,
) -> anyhow::Result<T> {
    let status = resp.status();
    let text = resp.text()?;
    if !status.is_success() {
        anyhow::bail!("server returned {}: {}", status, error_message(&text));
    }
    Ok(serde_json::from_str(&text)?)
}

fn do_ask(server: &str, session: &str, message: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/chat", server);
    let body = serde_json::json!({ "sessionId": session, "message": message });
    let resp = client()?.post(&url).json(&body).send()?;
    let reply: ChatReply = read_json(resp)?;

    println!("{}", reply.reply);
    eprintln!("({} tokens)", reply.tokens_used);
    Ok(())
}

fn do_sessions(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/sessions", server);
    let rows: Vec<SessionRow> = read_json(client()?.get(&url).send()?)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        eprintln!("No sessions yet.");
        return Ok(());
    }
    for row in &rows {
        println!("{}", format_session_row(row));
    }
    Ok(())
}

fn do_show(server: &str, session: &str, json_output: bool) -> anyhow::Result<()> {
    let url = session_url(server, session)?;
    let detail: SessionDetail = read_json(client()?.get(url).send()?)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        println!("{}", format_transcript(&detail));
    }
    Ok(())
}

/// Show the server status by calling GET /api/health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/health", server);
    let resp = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?
        .get(&url)
        .send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Helpdesk server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("SQLite:          {}", body["sqlite"].as_str().unwrap_or("?"));
            println!("Checked at:      {}", body["timestamp"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("helpdesk-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("helpdesk-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Ask { session, message } => do_ask(&server, &session, &message),
        Commands::Sessions { json } => do_sessions(&server, json),
        Commands::Show { session, json } => do_show(&server, &session, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("helpdesk-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
