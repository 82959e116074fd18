use tokio::process::Command;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Hands `url` to the platform's default opener without waiting for the
/// browser to exit.
pub fn open_in_browser(url: &str) -> AppResult<()> {
    let mut command = opener_command(url);
    debug!(url, "launching browser");
    command.spawn().map(|_| ()).map_err(|err| {
        AppError::Configuration(format!("unable to launch a browser for {url}: {err}"))
    })
}

fn opener_command(url: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    } else if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}
