use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::config_file_path;
use crate::domain::ticket::TicketKey;
use crate::error::{AppError, AppResult};

const LOCKED_DELIMITER: &str = ",";

#[derive(Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    jira: JiraSection,
    #[serde(default)]
    locked: LockedSection,
}

#[derive(Default, Serialize, Deserialize)]
struct JiraSection {
    #[serde(default)]
    url: String,
    #[serde(default)]
    user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct LockedSection {
    #[serde(default)]
    tickets: String,
}

/// Connection settings for the remote tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub url: String,
    pub user: String,
    pub token: Option<String>,
}

/// Settings carried between runs: the connection group and the locked keys.
pub struct SessionStore {
    file_path: PathBuf,
    file: SessionFile,
}

impl SessionStore {
    pub fn load() -> AppResult<Self> {
        Self::load_from(config_file_path()?)
    }

    pub fn load_from(path: PathBuf) -> AppResult<Self> {
        let file = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<SessionFile>(&contents).map_err(|err| {
                AppError::Configuration(format!("invalid session file {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SessionFile::default(),
            Err(err) => return Err(AppError::Io(err)),
        };

        Ok(Self {
            file_path: path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn connection(&self) -> SessionConfig {
        SessionConfig {
            url: self.file.jira.url.clone(),
            user: self.file.jira.user.clone(),
            token: self
                .file
                .jira
                .token
                .clone()
                .filter(|token| !token.is_empty()),
        }
    }

    /// The token is only kept when the user opted in.
    pub fn set_connection(&mut self, config: &SessionConfig, save_token: bool) {
        self.file.jira = JiraSection {
            url: config.url.trim().to_string(),
            user: config.user.trim().to_string(),
            token: config
                .token
                .clone()
                .filter(|token| save_token && !token.is_empty()),
        };
    }

    pub fn locked_keys(&self) -> BTreeSet<TicketKey> {
        self.file
            .locked
            .tickets
            .split(LOCKED_DELIMITER)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(TicketKey::new)
            .collect()
    }

    pub fn set_locked<'a>(&mut self, keys: impl IntoIterator<Item = &'a TicketKey>) {
        let sorted: BTreeSet<&str> = keys.into_iter().map(TicketKey::as_str).collect();
        self.file.locked.tickets = sorted
            .into_iter()
            .collect::<Vec<_>>()
            .join(LOCKED_DELIMITER);
    }

    pub fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.file).map_err(|err| {
            AppError::Configuration(format!("failed to write session file: {err}"))
        })?;
        fs::write(&self.file_path, data)?;
        debug!(path = %self.file_path.display(), "session saved");
        Ok(())
    }
}
