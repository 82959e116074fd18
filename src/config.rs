use std::env;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::workflow::ticket_set::DEFAULT_PAGE_SIZE;

const APP_DIRECTORY: &str = "ticket-deck";
const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub page_size: usize,
    pub session_path: PathBuf,
    pub export_dir: PathBuf,
}

impl AppConfig {
    pub fn load(workspace_hint: &Path) -> AppResult<Self> {
        let page_size = match env::var("TDECK_PAGE_SIZE") {
            Ok(raw) => parse_page_size(&raw)?,
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            page_size,
            session_path: config_file_path()?,
            export_dir: workspace_hint.to_path_buf(),
        })
    }
}

fn parse_page_size(raw: &str) -> AppResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(AppError::Configuration(format!(
            "TDECK_PAGE_SIZE must be a positive integer, got '{raw}'"
        ))),
    }
}

pub fn config_directory() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIRECTORY))
        .ok_or_else(|| {
            AppError::Configuration("unable to locate a configuration directory".to_string())
        })
}

/// `TDECK_CONFIG` overrides the default `<config dir>/ticket-deck/session.json`.
pub fn config_file_path() -> AppResult<PathBuf> {
    match env::var("TDECK_CONFIG") {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(config_directory()?.join(SESSION_FILE_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_size() {
        assert_eq!(parse_page_size(" 25 ").expect("valid"), 25);
        assert!(matches!(
            parse_page_size("0"),
            Err(AppError::Configuration(_))
        ));
        assert!(parse_page_size("ten").is_err());
    }
}
