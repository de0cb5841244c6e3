use super::write_atomically;
use foreman_core::{Error, Result, Task, TaskId, TaskStatus};
use foreman_deps::serde_json::{from_str, to_string};
use foreman_deps::tracing::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Line-delimited JSON collection of every task, unique by id.
///
/// Reads are tolerant: a line that does not parse, or whose claim fields contradict
/// its status, is skipped with a warning. Writes are strict: only well-formed records
/// are written back, and skipped lines are moved to a `.corrupt` sidecar first so
/// nothing disappears silently.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

/// A line that could not be turned into a task.
#[derive(Debug, Clone)]
struct CorruptLine {
    line: usize,
    raw: String,
    reason: String,
}

/// Result of reading the whole collection.
#[derive(Debug, Default)]
struct Scan {
    tasks: Vec<Task>,
    corrupt: Vec<CorruptLine>,
}

impl TaskStore {
    /// Creates a store backed by the file at `path` (created lazily).
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds a new task.
    ///
    /// # Errors
    /// Returns an error if a task with the same id already exists or the write fails
    pub fn create(&self, task: &Task) -> Result<()> {
        let mut scan = self.scan()?;
        if scan.tasks.iter().any(|existing| existing.id == task.id) {
            return Err(Error::Other(format!("Task {} already exists", task.id)));
        }
        scan.tasks.push(task.clone());
        self.rewrite(&scan)
    }

    /// Looks up a task by id.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read
    pub fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self
            .scan()?
            .tasks
            .into_iter()
            .find(|task| &task.id == id))
    }

    /// Lists tasks in storage order, optionally only those with `status`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read
    pub fn list(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let scan = self.scan()?;
        for corrupt in &scan.corrupt {
            warn!(
                "Skipping corrupt task record in {:?} line {}: {}",
                self.path, corrupt.line, corrupt.reason
            );
        }
        Ok(scan
            .tasks
            .into_iter()
            .filter(|task| status.is_none_or(|wanted| task.status == wanted))
            .collect())
    }

    /// Replaces the task with the same id, or adds it.
    ///
    /// The old record is dropped and the new one appended, and the whole collection
    /// is rewritten.
    ///
    /// # Errors
    /// Returns an error if the collection cannot be read or written
    pub fn upsert(&self, task: &Task) -> Result<()> {
        let mut scan = self.scan()?;
        scan.tasks.retain(|existing| existing.id != task.id);
        scan.tasks.push(task.clone());
        self.rewrite(&scan)
    }

    /// Replaces the stored task only if its status is still `expected`.
    ///
    /// # Errors
    /// Returns `NotFound` if the task is missing, `InvalidState` if its status changed,
    /// or an I/O error if the rewrite fails
    pub fn compare_and_swap(&self, expected: TaskStatus, task: &Task) -> Result<()> {
        let mut scan = self.scan()?;
        let current = scan
            .tasks
            .iter()
            .find(|existing| existing.id == task.id)
            .ok_or_else(|| Error::NotFound(task.id.clone()))?;

        if current.status != expected {
            return Err(Error::InvalidState {
                task_id: task.id.clone(),
                expected,
                actual: current.status,
            });
        }

        scan.tasks.retain(|existing| existing.id != task.id);
        scan.tasks.push(task.clone());
        self.rewrite(&scan)
    }

    /// Next free id sequence number (one past the highest stored).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read
    pub fn next_sequence(&self) -> Result<u64> {
        let highest = self
            .scan()?
            .tasks
            .iter()
            .filter_map(|task| task.id.sequence())
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }

    /// Strict read: fails on the first record that tolerant reads would skip.
    ///
    /// # Errors
    /// Returns `PersistenceCorruption` naming the offending line
    pub fn check_integrity(&self) -> Result<usize> {
        let scan = self.scan()?;
        if let Some(corrupt) = scan.corrupt.into_iter().next() {
            return Err(Error::PersistenceCorruption {
                path: self.path.clone(),
                line: corrupt.line,
                reason: corrupt.reason,
            });
        }
        Ok(scan.tasks.len())
    }

    fn scan(&self) -> Result<Scan> {
        if !self.path.exists() {
            return Ok(Scan::default());
        }

        let contents = fs::read_to_string(&self.path)?;
        let mut scan = Scan::default();

        for (index, raw) in contents.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed = from_str::<Task>(trimmed)
                .map_err(|error| error.to_string())
                .and_then(|task| task.check_consistency().map(|()| task));

            match parsed {
                Ok(task) => {
                    // Later records win, matching the drop-then-append write order.
                    scan.tasks.retain(|existing| existing.id != task.id);
                    scan.tasks.push(task);
                }
                Err(reason) => scan.corrupt.push(CorruptLine {
                    line: index + 1,
                    raw: trimmed.to_owned(),
                    reason,
                }),
            }
        }

        Ok(scan)
    }

    fn rewrite(&self, scan: &Scan) -> Result<()> {
        if !scan.corrupt.is_empty() {
            self.quarantine(&scan.corrupt)?;
        }

        let mut contents = String::new();
        for task in &scan.tasks {
            contents.push_str(&to_string(task)?);
            contents.push('\n');
        }

        write_atomically(&self.path, &contents)?;
        debug!("Rewrote {} tasks to {:?}", scan.tasks.len(), self.path);
        Ok(())
    }

    fn quarantine(&self, corrupt: &[CorruptLine]) -> Result<()> {
        let mut file_name = self.path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".corrupt");
        let sidecar = self.path.with_file_name(file_name);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sidecar)?;
        for line in corrupt {
            writeln!(file, "{}", line.raw)?;
        }

        warn!(
            "Moved {} corrupt task records from {:?} to {:?}",
            corrupt.len(),
            self.path,
            sidecar
        );
        Ok(())
    }
}
