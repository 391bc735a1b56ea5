//! Non-fatal render diagnostics.
//!
//! Nothing in the composer aborts a render. Each failure is handled where it
//! occurs, converted into empty content or a sentinel, and recorded as a
//! [`Diagnostic`] alongside a `tracing` warning.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a render diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No implementation is registered for a module identifier.
    ModuleNotFound,
    /// The implementation could not be constructed as a module.
    ModuleContractViolation,
    /// `setup` failed; the module still ran.
    ModuleSetupFailed,
    /// `get_data` reported failure.
    ModuleDataFailure,
    /// One operation of a fetch batch failed.
    FetchOperationFailure,
    /// An asset descriptor had no resolvable source.
    MisconfiguredAsset,
    /// A sub-template placeholder names no configured sub-template.
    SubtemplateNotFound,
    /// A sub-template was referenced again after being consumed.
    SubtemplateConsumed,
    /// A template or sub-template file could not be read.
    TemplateLoadFailure,
    /// A cache backend call failed; the render continued uncached.
    CacheFailure,
    /// The fetch phase hit its round cap with work outstanding.
    FetchRoundLimit,
    /// A deferred module was left with no pending work to finish it.
    ModuleStalled,
}

impl DiagnosticKind {
    /// `PascalCase` name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModuleNotFound => "ModuleNotFound",
            Self::ModuleContractViolation => "ModuleContractViolation",
            Self::ModuleSetupFailed => "ModuleSetupFailed",
            Self::ModuleDataFailure => "ModuleDataFailure",
            Self::FetchOperationFailure => "FetchOperationFailure",
            Self::MisconfiguredAsset => "MisconfiguredAsset",
            Self::SubtemplateNotFound => "SubtemplateNotFound",
            Self::SubtemplateConsumed => "SubtemplateConsumed",
            Self::TemplateLoadFailure => "TemplateLoadFailure",
            Self::CacheFailure => "CacheFailure",
            Self::FetchRoundLimit => "FetchRoundLimit",
            Self::ModuleStalled => "ModuleStalled",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded render diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Classification.
    pub kind: DiagnosticKind,
    /// What the diagnostic is about (module, sub-template, asset, key).
    pub subject: String,
    /// Human-readable detail.
    pub message: String,
}

impl Diagnostic {
    /// Build a diagnostic.
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.kind, self.subject, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_subject() {
        let d = Diagnostic::new(DiagnosticKind::ModuleNotFound, "weather", "no factory registered");
        assert_eq!(d.to_string(), "ModuleNotFound [weather]: no factory registered");
    }

    #[test]
    fn kind_serde_snake_case() {
        let json = serde_json::to_string(&DiagnosticKind::FetchOperationFailure).unwrap();
        assert_eq!(json, r#""fetch_operation_failure""#);
    }
}
