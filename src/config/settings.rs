//! Runtime settings shared by every workflow.

use std::path::PathBuf;
use std::time::Duration;

use crate::cloudformation::PollSettings;

/// Default mirror root.
pub const DEFAULT_APPS_DIR: &str = "apps";

/// Default template directory.
pub const DEFAULT_TEMPLATES_DIR: &str = "iac/templates";

/// Default AWS named profile.
pub const DEFAULT_PROFILE: &str = "default";

/// Default seconds between stack status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default seconds before a stack operation is abandoned.
pub const DEFAULT_STACK_TIMEOUT_SECS: u64 = 3600;

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the local mirror (`<apps_dir>/<alias>/...`).
    pub apps_dir: PathBuf,
    /// Directory holding the stack templates.
    pub templates_dir: PathBuf,
    /// AWS named profile.
    pub profile: String,
    /// AWS region override.
    pub region: Option<String>,
    /// Stack wait settings.
    pub poll: PollSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            apps_dir: PathBuf::from(DEFAULT_APPS_DIR),
            templates_dir: PathBuf::from(DEFAULT_TEMPLATES_DIR),
            profile: String::from(DEFAULT_PROFILE),
            region: None,
            poll: PollSettings::new(
                Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
                Duration::from_secs(DEFAULT_STACK_TIMEOUT_SECS),
            ),
        }
    }
}

impl Settings {
    /// Sets the poll interval and timeout in seconds.
    #[must_use]
    pub const fn with_poll_secs(mut self, interval_secs: u64, timeout_secs: u64) -> Self {
        self.poll = PollSettings::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        );
        self
    }
}
