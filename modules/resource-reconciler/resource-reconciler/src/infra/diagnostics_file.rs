//! Failure report file.
//!
//! Each report replaces the file's previous content:
//!
//! ```text
//! 2026-03-01T10:00:00Z
//!
//! Failed to create api/v1/namespaces/a/pods/p
//!
//! =================================================================
//!
//! HTTP 500: boom
//!
//! ==============
//! == Contents ==
//! ==============
//!
//! <request body>
//! ```

use std::fmt;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tokio::runtime::{Handle, RuntimeFlavor};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::domain::diagnostics::{DiagnosticSink, FailureReport};

const ERROR_BANNER: &str = "=================================================================";
const CONTENTS_BANNER: &str = "==============";

/// Writes every failure report to one file, overwriting it.
///
/// The write finishes before [`DiagnosticSink::operation_failed`] returns.
/// On a multi-threaded runtime the worker is handed off with
/// [`tokio::task::block_in_place`] while the file is written.
#[derive(Debug, Clone)]
pub struct FileDiagnostics {
    path: PathBuf,
}

impl FileDiagnostics {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, text: &str) -> std::io::Result<()> {
        let mut file = File::create(&self.path)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()
    }

    fn write_off_worker(&self, text: &str) -> std::io::Result<()> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.write(text))
            }
            _ => self.write(text),
        }
    }
}

impl DiagnosticSink for FileDiagnostics {
    fn operation_failed(&self, report: &FailureReport<'_>) {
        let text = render(report, OffsetDateTime::now_utc());
        match self.write_off_worker(&text) {
            Ok(()) => debug!(path = %self.path.display(), "Wrote failure report"),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Failed to write failure report");
            }
        }
    }
}

fn render(report: &FailureReport<'_>, at: OffsetDateTime) -> String {
    let timestamp = at
        .format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    Rendered { timestamp, report }.to_string()
}

struct Rendered<'r, 'a> {
    timestamp: String,
    report: &'r FailureReport<'a>,
}

impl fmt::Display for Rendered<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\nFailed to {}\n\n", self.timestamp, self.report.action)?;

        for failure in self.report.history {
            write!(f, "{ERROR_BANNER}\n\n{failure}\n\n")?;
        }

        if let Some(contents) = self.report.contents {
            write!(
                f,
                "{CONTENTS_BANNER}\n== Contents ==\n{CONTENTS_BANNER}\n\n{}\n\n",
                String::from_utf8_lossy(contents)
            )?;
        }
        Ok(())
    }
}
