use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::info;

use crate::error::{AppError, AppResult};

/// `current-HHMMSS_MM-DD-YYYY_N_tickets.txt`
pub fn export_file_name<Tz: TimeZone>(now: &DateTime<Tz>, count: usize) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "current-{}_{}_{count}_tickets.txt",
        now.format("%H%M%S"),
        now.format("%m-%d-%Y")
    )
}

/// Writes one label per line into `directory` and returns the file path.
pub fn write_export<Tz: TimeZone>(
    directory: &Path,
    labels: &[String],
    now: &DateTime<Tz>,
) -> AppResult<PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    if labels.is_empty() {
        return Err(AppError::Configuration(
            "select at least one ticket to export".to_string(),
        ));
    }

    let path = directory.join(export_file_name(now, labels.len()));
    let mut contents = String::new();
    for label in labels {
        contents.push_str(label);
        contents.push('\n');
    }
    fs::write(&path, contents)?;

    info!(path = %path.display(), count = labels.len(), "ticket list exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};

    use super::*;

    fn fixed_now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .and_then(|tz| tz.with_ymd_and_hms(2024, 7, 4, 9, 5, 3).single())
            .expect("valid timestamp")
    }

    #[test]
    fn builds_file_name_from_time_and_count() {
        assert_eq!(
            export_file_name(&fixed_now(), 3),
            "current-090503_07-04-2024_3_tickets.txt"
        );
    }

    #[test]
    fn writes_one_label_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let labels = vec!["A-2*".to_string(), "A-1".to_string()];

        let path = write_export(dir.path(), &labels, &fixed_now()).expect("export written");

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("current-090503_07-04-2024_2_tickets.txt")
        );
        assert_eq!(fs::read_to_string(path).expect("readable"), "A-2*\nA-1\n");
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let result = write_export(&missing, &["A-1".to_string()], &fixed_now());
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
