use std::io::{self, Write};

use clap::{Args, Subcommand};

use crate::error::AppResult;
use crate::session::{SessionConfig, SessionStore};

const NOT_SET: &str = "<not set>";

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Run the interactive configuration wizard.
    Init,
    /// Show the stored settings (token masked) and locked tickets.
    Show,
}

pub fn run(command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Init => run_init(),
        ConfigCommand::Show => run_show(),
    }
}

fn run_init() -> AppResult<()> {
    let mut store = SessionStore::load()?;
    let current = store.connection();

    println!("Configuring ticket-deck.");
    println!("Press Enter to keep the current value, '-' to clear it.");
    println!("A saved token is stored in plain text in the session file.");
    println!();

    let url = ask(
        "Jira base URL (e.g., https://company.atlassian.net)",
        Some(current.url.as_str()).filter(|value| !value.is_empty()),
        false,
    )?;
    let user = ask(
        "Jira user (email)",
        Some(current.user.as_str()).filter(|value| !value.is_empty()),
        false,
    )?;
    let token = ask("Jira API token", current.token.as_deref(), true)?;

    let connection = SessionConfig {
        url: url.apply(&current.url).unwrap_or_default(),
        user: user.apply(&current.user).unwrap_or_default(),
        token: token.apply(current.token.as_deref().unwrap_or_default()),
    };
    store.set_connection(&connection, connection.token.is_some());
    store.save()?;

    println!("\nConfiguration saved to {}", store.path().display());
    Ok(())
}

fn run_show() -> AppResult<()> {
    let store = SessionStore::load()?;
    let connection = store.connection();

    println!("Session file: {}", store.path().display());
    println!("Jira base URL: {}", or_not_set(&connection.url));
    println!("Jira user: {}", or_not_set(&connection.user));
    println!("Jira API token: {}", mask_secret(connection.token.as_deref()));

    let locked: Vec<String> = store.locked_keys().iter().map(ToString::to_string).collect();
    if locked.is_empty() {
        println!("Locked tickets: <none>");
    } else {
        println!("Locked tickets: {}", locked.join(", "));
    }

    Ok(())
}

/// Prints one wizard question and reads the answer from stdin.
fn ask(field: &str, current: Option<&str>, secret: bool) -> AppResult<Answer> {
    let mut stdout = io::stdout();
    match current {
        Some(value) => {
            let shown = if secret {
                mask_secret(Some(value))
            } else {
                value.to_string()
            };
            write!(stdout, "{field} [{shown}]: ")?;
        }
        None => write!(stdout, "{field} (Enter to skip): ")?,
    }
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(Answer::parse(&line))
}

fn or_not_set(value: &str) -> &str {
    if value.is_empty() { NOT_SET } else { value }
}

/// Shows the first and last three characters of long secrets.
fn mask_secret(value: Option<&str>) -> String {
    let Some(secret) = value.filter(|secret| !secret.is_empty()) else {
        return NOT_SET.to_string();
    };
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}***{tail}")
}

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Keep,
    Clear,
    Replace(String),
}

impl Answer {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Answer::Keep,
            "-" => Answer::Clear,
            value => Answer::Replace(value.to_string()),
        }
    }

    /// The value after answering, given the current one (empty when unset).
    fn apply(self, current: &str) -> Option<String> {
        match self {
            Answer::Keep => Some(current.to_string()).filter(|value| !value.is_empty()),
            Answer::Clear => None,
            Answer::Replace(value) => Some(value),
        }
    }
}
