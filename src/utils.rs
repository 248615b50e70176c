use chrono::{Local, NaiveDate, Utc};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "daybook-dev",
            Profile::Prod => "daybook",
        }
    }
}

/// Get the configuration directory path for daybook
/// If profile is Dev, uses "daybook-dev" instead of "daybook"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "daybook", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for daybook
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "daybook", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Format a date as the zero-padded ISO string stored in `due_date`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Which calendar decides what "today" is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateBasis {
    #[default]
    Utc,
    Local,
}

/// Source of the current date for view membership
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    pub basis: DateBasis,
}

impl SystemClock {
    pub fn new(basis: DateBasis) -> Self {
        Self { basis }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        match self.basis {
            DateBasis::Utc => Utc::now().date_naive(),
            DateBasis::Local => Local::now().date_naive(),
        }
    }
}

/// A clock pinned to one date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_dates_are_zero_padded() {
        let date = parse_date("2024-01-05").expect("valid date");
        assert_eq!(format_date(date), "2024-01-05");
        assert!(parse_date("2024-1-5x").is_err());
    }

    #[test]
    fn fixed_clock_returns_its_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).expect("leap day");
        assert_eq!(FixedClock(date).today(), date);
    }

    #[test]
    fn expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/tmp/daybook.db"), PathBuf::from("/tmp/daybook.db"));
    }
}
