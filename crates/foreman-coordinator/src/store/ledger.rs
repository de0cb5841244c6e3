use super::write_atomically;
use foreman_core::{AssignmentRecord, Result, TaskId, parse_timestamp};
use foreman_deps::chrono::SecondsFormat;
use foreman_deps::tracing::{debug, warn};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const TITLE: &str = "# In Progress Tasks";
const HEADER_ROW: &str = "| Task ID | Agent ID | Role | Claimed At | Worktree | Status |";
const SEPARATOR_ROW: &str = "|---------|----------|------|------------|----------|--------|";
const COLUMN_COUNT: usize = 6;

/// Markdown table of active assignments.
///
/// The number of rows is the concurrency counter, so the file is regenerated in full
/// on every change and never edited in place.
#[derive(Debug, Clone)]
pub struct AssignmentLedger {
    path: PathBuf,
    max_concurrent: usize,
}

impl AssignmentLedger {
    /// Creates a ledger backed by `path`, rendering `max_concurrent` in its header.
    pub fn new(path: PathBuf, max_concurrent: usize) -> Self {
        Self {
            path,
            max_concurrent,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every well-formed row; malformed rows are skipped with a warning.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read
    pub fn list(&self) -> Result<Vec<AssignmentRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        let records = contents
            .lines()
            .enumerate()
            .filter_map(|(index, line)| self.parse_row(index + 1, line))
            .collect::<Vec<_>>();
        debug!("Read {} assignments from {:?}", records.len(), self.path);
        Ok(records)
    }

    /// Replaces the whole ledger with `entries`.
    ///
    /// # Errors
    /// Returns `InvalidInput` for an entry that would not survive as one table row,
    /// or an error if the file cannot be written
    pub fn upsert_all(&self, entries: &[AssignmentRecord]) -> Result<()> {
        for entry in entries {
            entry.check_cells()?;
        }
        write_atomically(&self.path, &self.render(entries))?;
        debug!("Wrote {} assignments to {:?}", entries.len(), self.path);
        Ok(())
    }

    fn render(&self, entries: &[AssignmentRecord]) -> String {
        let mut output = format!(
            "{TITLE}\n\n**Max Concurrent: {}**\n\n{HEADER_ROW}\n{SEPARATOR_ROW}\n",
            self.max_concurrent
        );
        for entry in entries {
            let _ignored = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} |",
                entry.task_id,
                entry.agent_id,
                entry.role,
                entry.claimed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                entry.workspace_path.display(),
                entry.status
            );
        }
        output
    }

    fn parse_row(&self, line_number: usize, line: &str) -> Option<AssignmentRecord> {
        let trimmed = line.trim();
        if !trimmed.starts_with('|') || trimmed == HEADER_ROW || is_separator(trimmed) {
            return None;
        }

        let cells: Vec<&str> = trimmed
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if cells.len() < COLUMN_COUNT {
            warn!(
                "Skipping ledger row {line_number} in {:?}: expected {COLUMN_COUNT} columns, found {}",
                self.path,
                cells.len()
            );
            return None;
        }
        if cells[0] == "Task ID" {
            return None;
        }

        let Some(claimed_at) = parse_timestamp(cells[3]) else {
            warn!(
                "Skipping ledger row {line_number} in {:?}: bad timestamp '{}'",
                self.path, cells[3]
            );
            return None;
        };

        Some(AssignmentRecord {
            task_id: TaskId::from(cells[0]),
            agent_id: cells[1].to_owned(),
            role: cells[2].to_owned(),
            claimed_at,
            workspace_path: PathBuf::from(cells[4]),
            status: cells[5].to_owned(),
        })
    }
}

fn is_separator(row: &str) -> bool {
    row.chars().all(|character| matches!(character, '|' | '-' | ':' | ' '))
}
