//! Classification of remote store failures.
//!
//! This is the only place that reads the free-text message of a
//! [`RemoteError`]. Everything else works with [`RemoteFailure`].

use crate::interface::RemoteError;
use std::collections::BTreeSet;
use std::fmt;

const UNKNOWN_CONTENT_TYPE_PATTERNS: &[&str] = &["unknown content type", "unknown contenttype"];
const CANNOT_SAVE_PATTERN: &str = "cannot save the content";
const ANCESTOR_DISALLOWS_PATTERN: &str = "because its ancestor does not allow the type";
const ALREADY_EXISTS_PATTERN: &str = "already exists";

/// A save failure that a corrective remote operation can fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProvisioningFault {
    /// The content type of the saved object is not installed.
    UnknownContentType,
    /// An ancestor of the saved object does not accept its type.
    AncestorDisallowsType,
}

impl ProvisioningFault {
    pub fn corrective_action(&self) -> CorrectiveAction {
        match self {
            Self::UnknownContentType => CorrectiveAction::InstallSchemas,
            Self::AncestorDisallowsType => CorrectiveAction::GrantAllowedChildTypes,
        }
    }
}

impl fmt::Display for ProvisioningFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnknownContentType => "unknown_content_type",
            Self::AncestorDisallowsType => "ancestor_disallows_type",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CorrectiveAction {
    /// (Re-)ensure every schema definition; which one is missing is unknown.
    InstallSchemas,
    /// Grant the application types on the workspace root.
    GrantAllowedChildTypes,
}

impl fmt::Display for CorrectiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InstallSchemas => "install_schemas",
            Self::GrantAllowedChildTypes => "grant_allowed_child_types",
        };
        write!(f, "{label}")
    }
}

/// Enumerated view of a [`RemoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailure {
    Recoverable(ProvisioningFault),
    AlreadyExists,
    Cancelled,
    Fatal,
}

impl RemoteFailure {
    pub fn classify(err: &RemoteError) -> Self {
        let message = match err {
            RemoteError::Cancelled => return Self::Cancelled,
            RemoteError::Transport(_) => return Self::Fatal,
            RemoteError::Rejected { message } => message.to_lowercase(),
        };

        if UNKNOWN_CONTENT_TYPE_PATTERNS
            .iter()
            .any(|pattern| message.contains(pattern))
        {
            return Self::Recoverable(ProvisioningFault::UnknownContentType);
        }
        if message.contains(CANNOT_SAVE_PATTERN) && message.contains(ANCESTOR_DISALLOWS_PATTERN) {
            return Self::Recoverable(ProvisioningFault::AncestorDisallowsType);
        }
        if message.contains(ALREADY_EXISTS_PATTERN) {
            return Self::AlreadyExists;
        }
        Self::Fatal
    }
}

/// Per-save bookkeeping of the self-healing loop.
///
/// Each corrective action is applied at most once per save; a fault that
/// comes back after its action already ran ends the loop.
#[derive(Debug, Default)]
pub struct HealState {
    applied: BTreeSet<CorrectiveAction>,
    attempts: u32,
}

impl HealState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a failed attempt with `fault`.
    ///
    /// Returns the action to apply before retrying, or `None` when that action
    /// was already applied and the fault repeated.
    pub fn next_action(&mut self, fault: ProvisioningFault) -> Option<CorrectiveAction> {
        self.attempts += 1;
        let action = fault.corrective_action();
        if self.applied.insert(action) {
            Some(action)
        } else {
            None
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn applied(&self) -> impl Iterator<Item = &CorrectiveAction> {
        self.applied.iter()
    }
}
