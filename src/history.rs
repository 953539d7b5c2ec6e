use chrono::{Local, TimeZone};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::diff::{diff, FileChange};
use crate::error::{Error, Result};
use crate::fileset::FileSet;
use crate::repository::FrameworkStorage;
use crate::storage::{Commit, StorageBackend};

const LINK_PREFIX: &str = "history://diff/";
const SHORT_HASH_LEN: usize = 7;
const MESSAGE_WIDTH: usize = 50;

/// Link emitted by the history list, opening a diff against the live files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryLink {
    CommitDiff(String),
}

impl HistoryLink {
    pub fn parse(url: &str) -> Result<Self> {
        match url.strip_prefix(LINK_PREFIX) {
            Some(hash) if !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
                Ok(HistoryLink::CommitDiff(hash.to_string()))
            }
            _ => Err(Error::InvalidLink(url.to_string())),
        }
    }
}

impl FromStr for HistoryLink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for HistoryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryLink::CommitDiff(hash) => write!(f, "{}{}", LINK_PREFIX, hash),
        }
    }
}

/// One row of the history list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub hash: String,
    pub short_hash: String,
    pub message: String,
    pub timestamp_millis: i64,
    pub is_merge: bool,
}

impl From<&Commit> for CommitSummary {
    fn from(commit: &Commit) -> Self {
        CommitSummary {
            hash: commit.hash.clone(),
            short_hash: commit.hash.chars().take(SHORT_HASH_LEN).collect(),
            message: commit.message.clone(),
            timestamp_millis: commit.timestamp_millis,
            is_merge: commit.is_merge(),
        }
    }
}

impl CommitSummary {
    pub fn link(&self) -> HistoryLink {
        HistoryLink::CommitDiff(self.hash.clone())
    }
}

/// Read-only view of stage histories.
pub struct HistoryView<'a, S> {
    storage: &'a FrameworkStorage<S>,
}

impl<'a, S: StorageBackend> HistoryView<'a, S> {
    pub fn new(storage: &'a FrameworkStorage<S>) -> Self {
        HistoryView { storage }
    }

    /// Commits reachable from the head of `ref_name`, newest first.
    pub fn history(&self, ref_name: &str) -> Result<Vec<CommitSummary>> {
        let Some(head) = self.storage.resolve_ref(ref_name)? else {
            return Ok(Vec::new());
        };
        let commits = self
            .storage
            .commits()
            .ancestors(&head, self.storage.history_depth())?;

        let mut summaries: Vec<CommitSummary> = commits.iter().map(CommitSummary::from).collect();
        summaries.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis));
        Ok(summaries)
    }

    /// Like `history`, but an unreadable store just shows nothing.
    pub fn history_or_empty(&self, ref_name: &str) -> Vec<CommitSummary> {
        self.history(ref_name).unwrap_or_else(|e| {
            warn!(ref_name, "history unavailable: {}", e);
            Vec::new()
        })
    }

    /// Changes from the snapshot of `commit_hash` to `live`.
    pub fn diff_against_live(&self, commit_hash: &str, live: &FileSet) -> Result<Vec<FileChange>> {
        let commit = self.storage.get_commit(commit_hash)?;
        let recorded = self.storage.get_snapshot_by_hash(&commit.snapshot_hash)?;
        Ok(diff(&recorded, live))
    }

    pub fn open_link(&self, url: &str, live: &FileSet) -> Result<Vec<FileChange>> {
        match HistoryLink::parse(url)? {
            HistoryLink::CommitDiff(hash) => self.diff_against_live(&hash, live),
        }
    }
}

/// `dd Mon HH:MM` in local time
pub fn format_timestamp(timestamp_millis: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_millis).single() {
        Some(time) => time.format("%d %b %H:%M").to_string(),
        None => "?".to_string(),
    }
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() > MESSAGE_WIDTH {
        let head: String = message.chars().take(MESSAGE_WIDTH).collect();
        format!("{}...", head)
    } else {
        message.to_string()
    }
}

/// Plain-text history list: a header line per commit, then its message.
pub fn render(commits: &[CommitSummary]) -> String {
    let mut out = String::new();
    for commit in commits {
        out.push_str(&commit.short_hash);
        out.push(' ');
        out.push_str(&format_timestamp(commit.timestamp_millis));
        if commit.is_merge {
            out.push_str(" [merge]");
        }
        out.push_str("\n    ");
        out.push_str(&truncate_message(&commit.message));
        out.push('\n');
    }
    out
}
