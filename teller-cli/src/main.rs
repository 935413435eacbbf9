//! teller-cli — command-line frontend for the Teller chat support service
//!
//! Talks to the Teller HTTP API. Every subcommand supports `--json` to print
//! the raw server response for scripting.
//!
//! # Subcommands
//! - `start <question> [--user <uuid> | --contact <text>]` — open a session
//! - `send <session> <text>`                               — send a message
//! - `transfer <session> <specialization> <reason>`        — move to another desk
//! - `end <session> [--rating 1..5] [--feedback <text>]`   — end a session
//! - `history <session>`                                   — print the transcript
//! - `agents [--tier retail|business|institutional]`       — list support desks
//! - `status`                                              — show server health

use clap::{Parser, Subcommand};
use serde_json::json;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8791";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "teller-cli",
    version,
    about = "Teller chat support — command-line client"
)]
struct Cli {
    /// Teller HTTP server URL (overrides TELLER_HTTP_URL env var)
    #[arg(long, env = "TELLER_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a chat session
    Start {
        /// Initial question (used to route you to the right desk)
        question: String,

        /// Authenticated user id
        #[arg(long)]
        user: Option<String>,

        /// Contact details for anonymous sessions (email or phone)
        #[arg(long)]
        contact: Option<String>,

        /// Request a specific desk instead of routing by question
        #[arg(long)]
        specialization: Option<String>,

        /// Queue for the next free agent instead of failing when all are busy
        #[arg(long)]
        queue: bool,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Send a message on an open session
    Send {
        /// Session id
        session: String,

        /// Message text
        text: String,

        /// Authenticated user id
        #[arg(long)]
        user: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Transfer the session to another desk
    Transfer {
        /// Session id
        session: String,

        /// Target specialization (storage name, e.g. loans_credit)
        specialization: String,

        /// Reason for the transfer
        reason: String,

        /// Authenticated user id
        #[arg(long)]
        user: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// End the session
    End {
        /// Session id
        session: String,

        /// Satisfaction rating, 1 to 5
        #[arg(long)]
        rating: Option<i32>,

        /// Free-text feedback
        #[arg(long)]
        feedback: Option<String>,

        /// Authenticated user id
        #[arg(long)]
        user: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Print the session transcript in chronological order
    History {
        /// Session id
        session: String,

        /// Authenticated user id
        #[arg(long)]
        user: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// List visible support desks and their load
    Agents {
        /// Account tier controlling which desks are visible
        #[arg(long)]
        tier: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show Teller server status
    Status,
}

// ============================================================================
// Request body builders (pure, unit-tested)
// ============================================================================

/// Build the POST /sessions body. An anonymous caller's contact text is
/// wrapped in the structured blob the server stores.
pub fn start_body(
    question: &str,
    user: Option<&str>,
    contact: Option<&str>,
    specialization: Option<&str>,
    queue: bool,
) -> serde_json::Value {
    json!({
        "question": question,
        "user_id": user,
        "contact": contact.map(|c| json!({"contact": c})),
        "specialization": specialization,
        "queue": queue,
    })
}

pub fn send_body(user: Option<&str>, text: &str) -> serde_json::Value {
    json!({ "user_id": user, "text": text })
}

pub fn transfer_body(user: Option<&str>, specialization: &str, reason: &str) -> serde_json::Value {
    json!({ "user_id": user, "specialization": specialization, "reason": reason })
}

pub fn end_body(
    user: Option<&str>,
    rating: Option<i32>,
    feedback: Option<&str>,
) -> serde_json::Value {
    json!({ "user_id": user, "rating": rating, "feedback": feedback })
}

// ============================================================================
// Output formatting (pure, unit-tested)
// ============================================================================

/// One transcript line: "[kind] body", e.g. "[agent] Hello, I'm ...".
pub fn format_message_line(message: &serde_json::Value) -> String {
    let kind = message["kind"].as_str().unwrap_or("?");
    let body = message["body"].as_str().unwrap_or("");
    format!("[{}] {}", kind, body)
}

/// One agents-table line: "name (specialization)  load/capacity  [busy]".
pub fn format_agent_line(agent: &serde_json::Value) -> String {
    let name = agent["name"].as_str().unwrap_or("?");
    let spec = agent["specialization"].as_str().unwrap_or("?");
    let current = agent["current_sessions"].as_i64().unwrap_or(0);
    let max = agent["max_concurrent_sessions"].as_i64().unwrap_or(0);
    let available = agent["available"].as_bool().unwrap_or(false);
    let mut line = format!("{} ({})  {}/{}", name, spec, current, max);
    if !available {
        line.push_str("  [busy]");
    }
    line
}

// ============================================================================
// HTTP client calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

/// POST a body and return the parsed response, exiting on transport errors.
/// Server-side errors are printed with their kind and also exit non-zero.
fn post_json(server: &str, path: &str, body: &serde_json::Value) -> serde_json::Value {
    let url = format!("{}{}", server, path);
    let resp = match client().and_then(|c| Ok(c.post(&url).json(body).send()?)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("teller-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let parsed: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let kind = parsed["error"].as_str().unwrap_or("error");
        let message = parsed["message"].as_str().unwrap_or("");
        eprintln!("teller-cli: {} ({}): {}", kind, status, message);
        std::process::exit(1);
    }
    parsed
}

fn get_json(server: &str, path: &str) -> serde_json::Value {
    let url = format!("{}{}", server, path);
    let resp = match client().and_then(|c| Ok(c.get(&url).send()?)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("teller-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let parsed: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let kind = parsed["error"].as_str().unwrap_or("error");
        let message = parsed["message"].as_str().unwrap_or("");
        eprintln!("teller-cli: {} ({}): {}", kind, status, message);
        std::process::exit(1);
    }
    parsed
}

fn print_messages(resp: &serde_json::Value) {
    if let Some(messages) = resp["messages"].as_array() {
        for m in messages {
            println!("{}", format_message_line(m));
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Start {
            question,
            user,
            contact,
            specialization,
            queue,
            json: raw,
        } => {
            let body = start_body(
                &question,
                user.as_deref(),
                contact.as_deref(),
                specialization.as_deref(),
                queue,
            );
            let resp = post_json(&server, "/sessions", &body);
            if raw {
                println!("{}", serde_json::to_string_pretty(&resp).unwrap_or_default());
            } else {
                println!("Session: {}", resp["session_id"].as_str().unwrap_or("?"));
                println!(
                    "Desk:    {} ({})",
                    resp["agent"].as_str().unwrap_or("?"),
                    resp["specialization"].as_str().unwrap_or("?")
                );
                println!("State:   {}", resp["state"].as_str().unwrap_or("?"));
                print_messages(&resp);
            }
        }

        Commands::Send {
            session,
            text,
            user,
            json: raw,
        } => {
            let body = send_body(user.as_deref(), &text);
            let path = format!("/sessions/{}/messages", session);
            let resp = post_json(&server, &path, &body);
            if raw {
                println!("{}", serde_json::to_string_pretty(&resp).unwrap_or_default());
            } else {
                println!(
                    "{}: {}",
                    resp["reply"]["agent"].as_str().unwrap_or("agent"),
                    resp["reply"]["text"].as_str().unwrap_or("")
                );
            }
        }

        Commands::Transfer {
            session,
            specialization,
            reason,
            user,
            json: raw,
        } => {
            let body = transfer_body(user.as_deref(), &specialization, &reason);
            let path = format!("/sessions/{}/transfer", session);
            let resp = post_json(&server, &path, &body);
            if raw {
                println!("{}", serde_json::to_string_pretty(&resp).unwrap_or_default());
            } else {
                println!(
                    "Transferred to {} (transfer #{})",
                    specialization,
                    resp["transfer_count"].as_i64().unwrap_or(0)
                );
            }
        }

        Commands::End {
            session,
            rating,
            feedback,
            user,
            json: raw,
        } => {
            let body = end_body(user.as_deref(), rating, feedback.as_deref());
            let path = format!("/sessions/{}/end", session);
            let resp = post_json(&server, &path, &body);
            if raw {
                println!("{}", serde_json::to_string_pretty(&resp).unwrap_or_default());
            } else {
                println!("Session ended at {}", resp["ended_at"].as_str().unwrap_or("?"));
            }
        }

        Commands::History {
            session,
            user,
            json: raw,
        } => {
            let mut path = format!("/sessions/{}/messages", session);
            if let Some(u) = user {
                path.push_str(&format!("?user_id={}", u));
            }
            let resp = get_json(&server, &path);
            if raw {
                println!("{}", serde_json::to_string_pretty(&resp).unwrap_or_default());
            } else {
                print_messages(&resp);
            }
        }

        Commands::Agents { tier, json: raw } => {
            let mut path = "/agents".to_string();
            if let Some(t) = tier {
                path.push_str(&format!("?tier={}", t));
            }
            let resp = get_json(&server, &path);
            if raw {
                println!("{}", serde_json::to_string_pretty(&resp).unwrap_or_default());
            } else if let Some(agents) = resp["agents"].as_array() {
                if agents.is_empty() {
                    println!("No agents registered yet.");
                }
                for a in agents {
                    println!("{}", format_agent_line(a));
                }
            }
        }

        Commands::Status => {
            let resp = get_json(&server, "/health");
            println!("Teller server: {}", resp["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", resp["version"].as_str().unwrap_or("?"));
            println!("PostgreSQL:    {}", resp["postgresql"].as_str().unwrap_or("?"));
            println!("Agents:        {}", resp["agents"].as_i64().unwrap_or(0));
            println!("Active chats:  {}", resp["active_sessions"].as_i64().unwrap_or(0));
            println!("Socket:        {}", resp["socket"].as_str().unwrap_or("?"));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_body_anonymous_wraps_contact() {
        let body = start_body("I need a loan", None, Some("me@example.com"), None, false);
        assert!(body["user_id"].is_null());
        assert_eq!(body["contact"]["contact"], "me@example.com");
        assert_eq!(body["question"], "I need a loan");
        assert_eq!(body["queue"], false);
    }

    #[test]
    fn test_start_body_authenticated_has_no_contact() {
        let body = start_body(
            "balance please",
            Some("7b5c24ab-1234-5678-9abc-def012345678"),
            None,
            Some("account_services"),
            true,
        );
        assert_eq!(body["user_id"], "7b5c24ab-1234-5678-9abc-def012345678");
        assert!(body["contact"].is_null());
        assert_eq!(body["specialization"], "account_services");
        assert_eq!(body["queue"], true);
    }

    #[test]
    fn test_end_body_optional_fields() {
        let body = end_body(None, Some(5), Some("great service"));
        assert_eq!(body["rating"], 5);
        assert_eq!(body["feedback"], "great service");

        let body = end_body(None, None, None);
        assert!(body["rating"].is_null());
        assert!(body["feedback"].is_null());
    }

    #[test]
    fn test_format_message_line() {
        let m = serde_json::json!({"kind": "agent", "body": "Hello there"});
        assert_eq!(format_message_line(&m), "[agent] Hello there");

        let empty = serde_json::json!({});
        assert_eq!(format_message_line(&empty), "[?] ");
    }

    #[test]
    fn test_format_agent_line_available() {
        let a = serde_json::json!({
            "name": "Treasury Desk",
            "specialization": "treasury",
            "current_sessions": 2,
            "max_concurrent_sessions": 10,
            "available": true,
        });
        assert_eq!(format_agent_line(&a), "Treasury Desk (treasury)  2/10");
    }

    #[test]
    fn test_format_agent_line_busy() {
        let a = serde_json::json!({
            "name": "Loans & Credit Desk",
            "specialization": "loans_credit",
            "current_sessions": 10,
            "max_concurrent_sessions": 10,
            "available": false,
        });
        assert_eq!(
            format_agent_line(&a),
            "Loans & Credit Desk (loans_credit)  10/10  [busy]"
        );
    }
}
