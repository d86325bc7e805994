//! Push-event trigger filter

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

/// `on:` block of a pipeline definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Push trigger; absent means the pipeline runs for every event
    #[serde(default)]
    pub push: Option<PushTriggerConfig>,
}

/// Branch and path filters for push events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushTriggerConfig {
    /// Branch name globs (empty = any branch)
    #[serde(default)]
    pub branches: Vec<String>,

    /// Path globs whose changes alone do not trigger a run
    #[serde(default)]
    pub paths_ignore: Vec<String>,
}

/// A push to the repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushEvent {
    pub branch: String,
    pub changed_paths: Vec<String>,
}

impl PushEvent {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            changed_paths: Vec::new(),
        }
    }

    pub fn with_changed(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.changed_paths.extend(paths.into_iter().map(Into::into));
        self
    }
}

/// Compiled path or branch glob
///
/// `*` and `?` stay within one path segment, `**` spans segments and
/// `[...]` matches a character class.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    matcher: GlobMatcher,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, globset::Error> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<GlobPattern>, globset::Error> {
    patterns.iter().map(|p| GlobPattern::new(p)).collect()
}

/// Compiled push trigger
#[derive(Debug, Clone, Default)]
pub struct PushFilter {
    branches: Vec<GlobPattern>,
    paths_ignore: Vec<GlobPattern>,
}

impl PushFilter {
    pub fn from_config(config: &PushTriggerConfig) -> Result<Self, globset::Error> {
        Ok(Self {
            branches: compile_all(&config.branches)?,
            paths_ignore: compile_all(&config.paths_ignore)?,
        })
    }

    /// Whether a push event should start the pipeline
    ///
    /// The branch must match one of the branch globs, and unless no paths
    /// were reported, at least one changed path must fall outside every
    /// ignore glob.
    pub fn matches(&self, event: &PushEvent) -> bool {
        let branch_ok =
            self.branches.is_empty() || self.branches.iter().any(|b| b.matches(&event.branch));
        if !branch_ok {
            return false;
        }

        if event.changed_paths.is_empty() || self.paths_ignore.is_empty() {
            return true;
        }

        event
            .changed_paths
            .iter()
            .any(|path| !self.paths_ignore.iter().any(|glob| glob.matches(path)))
    }

    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(GlobPattern::as_str)
    }

    pub fn paths_ignore(&self) -> impl Iterator<Item = &str> {
        self.paths_ignore.iter().map(GlobPattern::as_str)
    }
}
