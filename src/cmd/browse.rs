use std::io::{self, Write};
use std::sync::Arc;

use chrono::Local;
use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::warn;

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::domain::ticket::{Ticket, TicketKey};
use crate::error::{AppError, AppResult};
use crate::infra::browser::open_in_browser;
use crate::infra::jira::JiraClient;
use crate::session::{SessionConfig, SessionStore};
use crate::workflow::detail::{DetailMessage, LOADING, spawn_detail_fetch};
use crate::workflow::export::write_export;
use crate::workflow::identity::IdentityCache;
use crate::workflow::ticket_set::{DetailOutcome, PageOutcome, TicketSetManager};

#[derive(Args, Debug, Clone, Default)]
pub struct BrowseArgs {
    /// Jira base URL for this session.
    #[arg(long)]
    pub url: Option<String>,
    /// Jira user (email) for this session.
    #[arg(long)]
    pub user: Option<String>,
    /// Jira API token for this session.
    #[arg(long)]
    pub token: Option<String>,
    /// Store the API token in the session file on exit.
    #[arg(long, conflicts_with = "forget_token")]
    pub save_token: bool,
    /// Remove the API token from the session file on exit.
    #[arg(long)]
    pub forget_token: bool,
}

const HELP: &str = "\
Commands:
  latest | next            fetch the next page of newest tickets
  restart                  start over from the newest tickets (unlocked ones are dropped)
  search <keys>            show the tickets named in the text, e.g. 'search ABC-1, XYZ-22'
  list                     print the ticket list
  show <key|#>             load a ticket's description and comments
  lock <keys|#...>         lock or unlock tickets (locked tickets stay listed across sessions)
  open <keys|#...|all>     open tickets in the web browser
  export <keys|#...|all>   write the labels to a text file, one per line
  set url|user|token <v>   change the connection settings
  connect                  reconnect with the current settings
  help                     show this help
  quit                     save the session and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellCommand {
    Next,
    Restart,
    Search(String),
    List,
    Show(String),
    Lock(Vec<String>),
    Open(Vec<String>),
    Export(Vec<String>),
    Set(String, String),
    Connect,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ShellCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));
        let targets = || {
            rest.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .filter(|target| !target.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        };

        match verb.to_lowercase().as_str() {
            "" => ShellCommand::Empty,
            "latest" | "next" | "n" => ShellCommand::Next,
            "restart" => ShellCommand::Restart,
            "search" | "s" => ShellCommand::Search(rest.to_string()),
            "list" | "ls" => ShellCommand::List,
            "show" => ShellCommand::Show(rest.to_string()),
            "lock" => ShellCommand::Lock(targets()),
            "open" => ShellCommand::Open(targets()),
            "export" => ShellCommand::Export(targets()),
            "set" => {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .map(|(field, value)| (field, value.trim()))
                    .unwrap_or((rest, ""));
                ShellCommand::Set(field.to_lowercase(), value.to_string())
            }
            "connect" => ShellCommand::Connect,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => ShellCommand::Unknown(other.to_string()),
        }
    }
}

/// Maps shell arguments to ticket keys. Numbers are 1-based positions in the
/// displayed list, `all` selects everything, anything else is a label.
fn resolve_targets(labels: &[String], targets: &[String]) -> AppResult<Vec<TicketKey>> {
    let mut keys = Vec::new();
    for target in targets {
        if target.eq_ignore_ascii_case("all") {
            keys.extend(labels.iter().map(|label| TicketKey::from_label(label)));
        } else if let Ok(position) = target.parse::<usize>() {
            let label = position
                .checked_sub(1)
                .and_then(|index| labels.get(index))
                .ok_or_else(|| AppError::NotFound(format!("no ticket at position {position}")))?;
            keys.push(TicketKey::from_label(label));
        } else {
            keys.push(TicketKey::from_label(target));
        }
    }
    Ok(keys)
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub async fn run(config: AppConfig, args: BrowseArgs) -> AppResult<()> {
    let mut store = SessionStore::load_from(config.session_path.clone())?;
    let mut connection = store.connection();
    let mut save_token = connection.token.is_some();

    if let Some(url) = args.url {
        connection.url = url;
    }
    if let Some(user) = args.user {
        connection.user = user;
    }
    if let Some(token) = args.token {
        connection.token = Some(token).filter(|token| !token.is_empty());
    }
    if args.save_token {
        save_token = true;
    } else if args.forget_token {
        save_token = false;
    }

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut shell = BrowseShell::new(config, connection, store.locked_keys(), sender);
    println!("{HELP}");
    shell.print_list();

    let stdin = BufReader::new(tokio::io::stdin());
    let result = shell.run(stdin, &mut receiver).await;

    store.set_connection(&shell.connection, save_token);
    store.set_locked(shell.manager.locked_keys());
    match store.save() {
        Ok(()) => println!("Session saved to {}", store.path().display()),
        Err(err) => eprintln!("Error: failed to save session: {err}"),
    }
    result
}

struct BrowseShell {
    config: AppConfig,
    connection: SessionConfig,
    identities: IdentityCache,
    context: Option<AppContext>,
    manager: TicketSetManager,
    details: UnboundedSender<DetailMessage>,
}

impl BrowseShell {
    fn new(
        config: AppConfig,
        connection: SessionConfig,
        locked: impl IntoIterator<Item = TicketKey>,
        details: UnboundedSender<DetailMessage>,
    ) -> Self {
        Self {
            manager: TicketSetManager::new(config.page_size, locked),
            config,
            connection,
            identities: IdentityCache::new(),
            context: None,
            details,
        }
    }

    /// Reads commands until `quit` or end of input. Detail deliveries are
    /// applied here, between commands, so only this loop touches the set.
    /// A line that is not valid UTF-8 is reported and skipped.
    async fn run<R>(
        &mut self,
        input: R,
        receiver: &mut mpsc::UnboundedReceiver<DetailMessage>,
    ) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        print_prompt();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if self.handle(&line).await == Flow::Quit {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                            report(&AppError::Configuration(format!(
                                "ignored a line that is not valid text: {err}"
                            )));
                        }
                        Err(err) => return Err(err.into()),
                    }
                    print_prompt();
                }
                Some(message) = receiver.recv() => {
                    self.deliver(message);
                    print_prompt();
                }
            }
        }
        Ok(())
    }

    async fn handle(&mut self, line: &str) -> Flow {
        let outcome = match ShellCommand::parse(line) {
            ShellCommand::Empty => Ok(()),
            ShellCommand::Quit => return Flow::Quit,
            ShellCommand::Help => {
                println!("{HELP}");
                Ok(())
            }
            ShellCommand::List => {
                self.print_list();
                Ok(())
            }
            ShellCommand::Next => self.fetch_page().await,
            ShellCommand::Restart => {
                self.manager.restart_browse();
                self.fetch_page().await
            }
            ShellCommand::Search(text) => self.search(&text).await,
            ShellCommand::Show(target) => self.show(&target).await,
            ShellCommand::Lock(targets) => self.toggle_lock(&targets),
            ShellCommand::Open(targets) => self.open(&targets),
            ShellCommand::Export(targets) => self.export(&targets),
            ShellCommand::Set(field, value) => self.set(&field, value),
            ShellCommand::Connect => {
                self.context = None;
                self.ensure_connected().await.map(|_| {
                    println!(
                        "Connected to {} as {}.",
                        self.connection.url, self.connection.user
                    );
                })
            }
            ShellCommand::Unknown(verb) => {
                println!("Unknown command '{verb}'. Type 'help' for the command list.");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            report(&err);
        }
        Flow::Continue
    }

    async fn ensure_connected(&mut self) -> AppResult<AppContext> {
        if let Some(context) = &self.context {
            return Ok(context.clone());
        }
        let client = JiraClient::connect(&self.connection).await?;
        let context = AppContext::new(Arc::new(client), self.identities.clone());
        self.context = Some(context.clone());
        Ok(context)
    }

    async fn fetch_page(&mut self) -> AppResult<()> {
        let context = self.ensure_connected().await?;
        match self
            .manager
            .fetch_next_page(context.issue_tracker.as_ref())
            .await?
        {
            PageOutcome::Loaded { added, .. } => {
                self.print_list();
                println!(
                    "Added {added} ticket(s); the next page starts at {}.",
                    self.manager.page_cursor()
                );
            }
            PageOutcome::Exhausted => {
                self.print_list();
                println!("No more tickets available.");
            }
        }
        Ok(())
    }

    async fn search(&mut self, text: &str) -> AppResult<()> {
        if text.trim().is_empty() {
            println!("Please enter ticket number(s) to search.");
            return Ok(());
        }
        let context = self.ensure_connected().await?;
        let outcome = self
            .manager
            .search(context.issue_tracker.as_ref(), text)
            .await?;
        if outcome.found == 0 {
            println!("No tickets found matching the search criteria.");
        } else {
            self.print_list();
            println!(
                "Found {} ticket(s); {} listed.",
                outcome.found, outcome.shown
            );
        }
        Ok(())
    }

    async fn show(&mut self, target: &str) -> AppResult<()> {
        let target = target.trim();
        if target.is_empty() {
            return Err(AppError::Configuration(
                "name one ticket to show".to_string(),
            ));
        }
        let labels = self.manager.display_labels();
        let key = resolve_targets(&labels, &[target.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Configuration("name one ticket to show".to_string()))?;

        let context = self.ensure_connected().await?;
        let ticket = self.manager.select(&key)?;
        println!("{LOADING}");
        spawn_detail_fetch(context.details.clone(), ticket, self.details.clone());
        Ok(())
    }

    fn deliver(&mut self, message: DetailMessage) {
        match self.manager.apply_detail(message) {
            Some(DetailOutcome::Ready(view)) => println!("\n{view}"),
            Some(DetailOutcome::Failed(error)) => println!("Error: {error}"),
            None => {}
        }
    }

    fn toggle_lock(&mut self, targets: &[String]) -> AppResult<()> {
        let keys = self.selected_keys(targets, "lock/unlock")?;
        for (key, locked) in self.manager.toggle_lock(&keys) {
            println!("{key} {}", if locked { "locked" } else { "unlocked" });
        }
        self.print_list();
        Ok(())
    }

    fn open(&self, targets: &[String]) -> AppResult<()> {
        let keys = self.selected_keys(targets, "open")?;
        if self.connection.url.trim().is_empty() {
            return Err(AppError::Configuration(
                "Jira base URL not configured".to_string(),
            ));
        }
        for key in keys {
            let url = self
                .context
                .as_ref()
                .and_then(|context| context.issue_tracker.browse_url(&key))
                .unwrap_or_else(|| JiraClient::browse_link(&self.connection.url, key.as_str()));
            if let Err(err) = open_in_browser(&url) {
                report(&err);
            }
        }
        Ok(())
    }

    fn export(&self, targets: &[String]) -> AppResult<()> {
        let keys = self.selected_keys(targets, "export")?;
        let labels = self.manager.export_selection(&keys);
        let path = write_export(&self.config.export_dir, &labels, &Local::now())?;
        println!("Exported selected tickets to {}", path.display());
        Ok(())
    }

    fn set(&mut self, field: &str, value: String) -> AppResult<()> {
        match field {
            "url" => self.connection.url = value,
            "user" => self.connection.user = value,
            "token" => self.connection.token = Some(value).filter(|token| !token.is_empty()),
            other => {
                return Err(AppError::Configuration(format!(
                    "unknown setting '{other}', expected url, user or token"
                )));
            }
        }
        self.context = None;
        println!("Setting updated; the next remote command reconnects.");
        Ok(())
    }

    fn selected_keys(&self, targets: &[String], action: &str) -> AppResult<Vec<TicketKey>> {
        if targets.is_empty() {
            return Err(AppError::Configuration(format!(
                "Please select at least one ticket to {action}."
            )));
        }
        resolve_targets(&self.manager.display_labels(), targets)
    }

    fn print_list(&self) {
        if self.manager.tickets().is_empty() {
            println!("No tickets listed. Use 'latest' or 'search'.");
            return;
        }
        let selected = self.manager.selected();
        for (position, key) in self.manager.display_order().into_iter().enumerate() {
            let marker = if selected == Some(key) { '>' } else { ' ' };
            let summary = self
                .manager
                .get(key)
                .and_then(Ticket::detail)
                .map(|detail| detail.summary.as_str())
                .unwrap_or("");
            println!(
                "{marker}{:>3}. {:<14} {summary}",
                position + 1,
                self.manager.label_for(key)
            );
        }
    }
}

fn print_prompt() {
    print!("tdeck> ");
    if let Err(err) = io::stdout().flush() {
        warn!(error = %err, "failed to flush prompt");
    }
}

fn report(err: &AppError) {
    warn!(error = %err, "command failed");
    println!("Error: {err}");
}
