use foreman_core::Result;
use foreman_deps::chrono::{DateTime, SecondsFormat, Utc};
use foreman_deps::tracing::debug;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// One audit entry: who decided what, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Stable identifier, e.g. `FORCE-RELEASE-TASK-20260101-0001`
    pub id: String,
    /// When the decision was taken
    pub timestamp: DateTime<Utc>,
    /// Component or person responsible
    pub owner: String,
    /// What was done
    pub decision: String,
    /// Why it was done
    pub rationale: String,
}

impl Decision {
    fn render(&self) -> String {
        format!(
            "\n## {} | {}\n**Owner:** {}\n**Decision:** {}\n**Rationale:** {}\n\n---\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.id,
            self.owner,
            self.decision,
            self.rationale
        )
    }
}

/// Append-only markdown log of forced releases and cleanups.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    path: PathBuf,
}

impl DecisionLog {
    /// Creates a log appending to `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `decision` to the end of the log.
    ///
    /// # Errors
    /// Returns an error if the log cannot be opened or written
    pub fn append(&self, decision: &Decision) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(decision.render().as_bytes())?;
        debug!("Logged decision {} to {:?}", decision.id, self.path);
        Ok(())
    }
}
