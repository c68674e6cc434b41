//! Batch reports, summary counts and exit signals.

use std::fmt;
use std::path::PathBuf;

/// How one document's outcome counts toward the batch summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    /// Acted upon (published, deleted, synced, updated; or would be in a dry run).
    Succeeded,
    Skipped,
    Draft,
    Failed,
}

/// A per-document status that knows how it is counted.
pub trait Tallied {
    fn tally(&self) -> Tally;
}

/// Result for a single document (or remote record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<S> {
    pub path: PathBuf,
    pub title: String,
    pub status: S,
}

/// Count tuple printed at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub skipped: usize,
    pub drafts: usize,
    pub failed: usize,
}

/// Process exit signal for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitSignal {
    Success,
    Partial,
    TotalFailure,
}

impl ExitSignal {
    /// All-failed when nothing succeeded and something failed; partial when
    /// some of each; success otherwise.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => ExitSignal::Success,
            (0, _) => ExitSignal::TotalFailure,
            _ => ExitSignal::Partial,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ExitSignal::Success => 0,
            ExitSignal::Partial => 1,
            ExitSignal::TotalFailure => 2,
        }
    }

    /// The more severe of two signals (used across sites).
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

/// Every outcome of one operation on one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report<S> {
    pub site: String,
    pub dry_run: bool,
    pub outcomes: Vec<Outcome<S>>,
    /// Failures not tied to a document (e.g. a relay query nobody answered).
    pub batch_errors: Vec<String>,
    /// The user declined the confirmation prompt; nothing was done.
    pub cancelled: bool,
}

impl<S> Report<S> {
    pub fn new(site: impl Into<String>, dry_run: bool) -> Self {
        Self {
            site: site.into(),
            dry_run,
            outcomes: Vec::new(),
            batch_errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn push(&mut self, path: impl Into<PathBuf>, title: impl Into<String>, status: S) {
        self.outcomes.push(Outcome {
            path: path.into(),
            title: title.into(),
            status,
        });
    }
}

impl<S: Tallied> Report<S> {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            failed: self.batch_errors.len(),
            ..Summary::default()
        };
        for outcome in &self.outcomes {
            match outcome.status.tally() {
                Tally::Succeeded => summary.succeeded += 1,
                Tally::Skipped => summary.skipped += 1,
                Tally::Draft => summary.drafts += 1,
                Tally::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn exit_signal(&self) -> ExitSignal {
        let s = self.summary();
        ExitSignal::from_counts(s.succeeded, s.failed)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} drafts, {} failed",
            self.succeeded, self.skipped, self.drafts, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug)]
    struct S(Tally);

    impl Tallied for S {
        fn tally(&self) -> Tally {
            self.0
        }
    }

    #[rstest]
    #[case(0, 0, ExitSignal::Success)]
    #[case(3, 0, ExitSignal::Success)]
    #[case(2, 1, ExitSignal::Partial)]
    #[case(0, 4, ExitSignal::TotalFailure)]
    fn exit_signal_from_counts(
        #[case] succeeded: usize,
        #[case] failed: usize,
        #[case] expected: ExitSignal,
    ) {
        assert_eq!(ExitSignal::from_counts(succeeded, failed), expected);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitSignal::Success.code(), 0);
        assert_eq!(ExitSignal::Partial.code(), 1);
        assert_eq!(ExitSignal::TotalFailure.code(), 2);
        assert_eq!(
            ExitSignal::Partial.worst(ExitSignal::TotalFailure),
            ExitSignal::TotalFailure
        );
        assert_eq!(ExitSignal::Success.worst(ExitSignal::Partial), ExitSignal::Partial);
    }

    #[test]
    fn summary_counts_batch_errors_as_failures() {
        let mut report = Report::new("blog", false);
        report.push("a.md", "A", S(Tally::Succeeded));
        report.push("b.md", "B", S(Tally::Draft));
        report.push("c.md", "C", S(Tally::Skipped));
        report.batch_errors.push("query failed".into());

        let summary = report.summary();
        assert_eq!(
            summary,
            Summary {
                succeeded: 1,
                skipped: 1,
                drafts: 1,
                failed: 1
            }
        );
        assert_eq!(report.exit_signal(), ExitSignal::Partial);
    }
}
