//! Pull-request change-set input types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a file in a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// The file is new.
    Added,
    /// The file existed and was changed.
    Modified,
    /// The file was removed.
    Deleted,
    /// The file was moved or renamed.
    Renamed,
}

/// One file entry in a pull-request change-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Repository-relative path.
    pub path: String,
    /// What happened to the file.
    pub status: FileStatus,
    /// Lines added.
    pub additions: u64,
    /// Lines deleted.
    pub deletions: u64,
    /// File type key used for weighting (usually the extension).
    pub file_type: String,
    /// Whether the file is a test.
    pub is_test: bool,
    /// Complexity estimate supplied by upstream tooling.
    pub complexity_score: f64,
}

impl ChangedFile {
    /// Create a file entry with zero complexity.
    #[must_use]
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        let path = path.into();
        let file_type = path.rsplit('.').next().unwrap_or("").to_owned();
        Self {
            path,
            status,
            additions: 0,
            deletions: 0,
            file_type,
            is_test: false,
            complexity_score: 0.0,
        }
    }

    /// Set addition/deletion counts.
    #[must_use]
    pub fn with_changes(mut self, additions: u64, deletions: u64) -> Self {
        self.additions = additions;
        self.deletions = deletions;
        self
    }

    /// Mark the file as a test.
    #[must_use]
    pub fn as_test(mut self) -> Self {
        self.is_test = true;
        self
    }

    /// Set the complexity estimate.
    #[must_use]
    pub fn with_complexity(mut self, score: f64) -> Self {
        self.complexity_score = score;
        self
    }

    /// Total changed lines in this file.
    #[must_use]
    pub fn total_changes(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A pull-request's files-changed record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PRChangeSet {
    /// Pull request number.
    pub pr_number: u64,
    /// Pull request title.
    pub title: String,
    /// Author login.
    pub author: String,
    /// Source branch.
    pub branch: String,
    /// Target branch.
    pub base_branch: String,
    /// Files touched by the pull request.
    pub files: Vec<ChangedFile>,
    /// Total lines added across all files.
    pub total_additions: u64,
    /// Total lines deleted across all files.
    pub total_deletions: u64,
    /// Labels applied to the pull request.
    #[serde(default)]
    pub labels: Vec<String>,
    /// When the pull request was opened.
    pub created_at: DateTime<Utc>,
    /// When the pull request was last updated.
    pub updated_at: DateTime<Utc>,
}

impl PRChangeSet {
    /// Create a change-set, deriving the addition/deletion totals from the
    /// file entries.
    #[must_use]
    pub fn new(pr_number: u64, title: impl Into<String>, files: Vec<ChangedFile>) -> Self {
        let now = Utc::now();
        let total_additions = files.iter().map(|f| f.additions).sum();
        let total_deletions = files.iter().map(|f| f.deletions).sum();
        Self {
            pr_number,
            title: title.into(),
            author: String::new(),
            branch: String::new(),
            base_branch: "main".to_owned(),
            files,
            total_additions,
            total_deletions,
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the source branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Total changed lines across all files.
    #[must_use]
    pub fn total_changes(&self) -> u64 {
        self.total_additions + self.total_deletions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_file_defaults() {
        let file = ChangedFile::new("src/lib.rs", FileStatus::Modified);
        assert_eq!(file.file_type, "rs");
        assert!(!file.is_test);
        assert_eq!(file.total_changes(), 0);
    }

    #[test]
    fn changeset_derives_totals() {
        let cs = PRChangeSet::new(
            7,
            "add feature",
            vec![
                ChangedFile::new("a.rs", FileStatus::Modified).with_changes(10, 5),
                ChangedFile::new("b.rs", FileStatus::Added).with_changes(20, 0),
            ],
        );
        assert_eq!(cs.total_additions, 30);
        assert_eq!(cs.total_deletions, 5);
        assert_eq!(cs.total_changes(), 35);
    }

    #[test]
    fn file_status_serde() {
        let json = serde_json::to_string(&FileStatus::Renamed).unwrap();
        assert_eq!(json, r#""renamed""#);
    }
}
