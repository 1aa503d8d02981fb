use crate::facts::redact;
use core::fmt::{Display, Formatter};

/// Outcome of one report run across every configured repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<String>,

    /// Repositories whose metrics were computed from incomplete listings.
    pub partial: Vec<String>,

    /// Repository and failure reason, with secrets removed.
    pub failed: Vec<(String, String)>,

    pub records_written: usize,
}

impl RunSummary {
    pub fn record_success(&mut self, repository: impl Into<String>, partial: bool) {
        let repository = repository.into();
        if partial {
            self.partial.push(repository.clone());
        }
        self.succeeded.push(repository);
    }

    pub fn record_failure(&mut self, repository: impl Into<String>, reason: &str) {
        self.failed.push((repository.into(), redact(reason, &[])));
    }

    /// At least one repository was attempted and none succeeded.
    #[must_use]
    pub const fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(
            f,
            "{} repositories succeeded, {} failed, {} records written",
            self.succeeded.len(),
            self.failed.len(),
            self.records_written
        )?;

        for repository in &self.partial {
            writeln!(f, "  {repository}: partial data")?;
        }

        for (repository, reason) in &self.failed {
            writeln!(f, "  {repository}: {reason}")?;
        }

        Ok(())
    }
}
