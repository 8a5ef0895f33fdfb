//! Diagnostics reported back from lifecycle operations

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error diagnostic carrying the full error chain as detail
    pub fn from_err(error: &anyhow::Error) -> Self {
        Self(vec![Diagnostic {
            severity: Severity::Error,
            summary: error.to_string(),
            detail: Some(format!("{:#}", error)),
        }])
    }

    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::new(),
            Err(e) => Self::from_err(&e),
        }
    }

    pub fn warn(&mut self, summary: impl Into<String>) {
        self.0.push(Diagnostic {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: None,
        });
    }

    pub fn has_error(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Turn error diagnostics back into an error
    pub fn into_result(self) -> Result<()> {
        let errors: Vec<String> = self
            .0
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.detail.unwrap_or(d.summary))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(errors.join("; ")))
        }
    }
}
