//! CLI error reporting: exit statuses, JSON error payloads and the
//! user-facing [`UsageError`] raised for bad invocations.

use redline_schema::SuggestError;
use std::fmt;
use std::path::Path;

/// Exit status for refused publish/reject/guarded writes.
pub const EXIT_PERMISSION_DENIED: u8 = 3;
/// Exit status for every other failure.
pub const EXIT_FAILURE: u8 = 1;

/// A mistake in how the CLI was invoked or configured, with a note on where
/// the relevant setting lives and commands that fix it.
#[derive(Debug)]
pub struct UsageError {
    problem: String,
    note: &'static str,
    fixes: Vec<String>,
}

impl UsageError {
    fn build(problem: String, note: &'static str, fixes: &[&str]) -> Self {
        Self {
            problem,
            note,
            fixes: fixes.iter().map(|fix| fix.to_string()).collect(),
        }
    }

    fn and_fix(mut self, fix: String) -> Self {
        self.fixes.push(fix);
        self
    }

    pub fn config_not_found(path: &Path) -> Self {
        Self::build(
            format!("Config file not found: {}", path.display()),
            "entities and their suggestion settings are declared in redline.toml",
            &["point --config (or REDLINE_CONFIG) at an existing file"],
        )
        .and_fix(format!("create {} with [[entities]] and [[suggestions]] blocks", path.display()))
    }

    pub fn unknown_actor(username: &str) -> Self {
        Self::build(
            format!("Unknown actor: {}", username),
            "actors are declared in the [[actors]] section of redline.toml",
            &["redline config --json"],
        )
    }

    /// Entity is not declared, or has no [[suggestions]] block.
    pub fn unregistered_entity(entity: &str) -> Self {
        Self::build(
            format!("No edit suggestions registered for {}", entity),
            "only entities named in a [[suggestions]] block have a shadow schema",
            &[],
        )
        .and_fix(format!("add [[suggestions]] entity = \"{}\" to redline.toml", entity))
    }

    pub fn invalid_id(raw: &str, details: &str) -> Self {
        Self::build(
            format!("Invalid record id '{}': {}", raw, details),
            "ids are printed by 'redline create' and 'redline list'",
            &[],
        )
    }

    pub fn invalid_data(details: &str) -> Self {
        Self::build(
            format!("Invalid --data payload: {}", details),
            "--data takes a JSON object",
            &["--data '{\"title\": \"New title\", \"reason\": \"typo\"}'"],
        )
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n  note: {}", self.problem, self.note)?;
        for fix in &self.fixes {
            write!(f, "\n  fix:  {}", fix)?;
        }
        Ok(())
    }
}

impl std::error::Error for UsageError {}

fn suggest_error(err: &anyhow::Error) -> Option<&SuggestError> {
    err.chain().find_map(|cause| cause.downcast_ref::<SuggestError>())
}

/// Process exit status for a failed command.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    match suggest_error(err) {
        Some(e) if e.is_permission_denied() => EXIT_PERMISSION_DENIED,
        _ => EXIT_FAILURE,
    }
}

/// Short machine-readable error kind.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    match suggest_error(err) {
        Some(SuggestError::PermissionDenied(_)) => "permission_denied",
        Some(SuggestError::NotFound(_)) => "not_found",
        Some(SuggestError::Conflict(_)) => "conflict",
        Some(SuggestError::Validation(_)) => "validation",
        Some(SuggestError::Config(_)) => "config",
        Some(SuggestError::Store(_)) => "store",
        None => "error",
    }
}

/// Print an error as JSON on stdout, for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let payload = serde_json::json!({
        "error": {
            "kind": error_kind(err),
            "message": format!("{:#}", err),
        }
    });
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:?}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_usage_error_lists_note_then_fixes() {
        let text = UsageError::config_not_found(Path::new("/tmp/redline.toml")).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Config file not found: /tmp/redline.toml");
        assert!(lines[1].starts_with("  note: "));
        assert_eq!(lines.len(), 4);
        assert!(lines[3].contains("create /tmp/redline.toml"));
    }

    #[test]
    fn test_usage_error_without_fixes_has_two_lines() {
        let text = UsageError::invalid_id("zz", "bad length").to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("Invalid record id 'zz': bad length"));
    }

    #[test]
    fn test_permission_denied_exit_status() {
        let err: anyhow::Error = SuggestError::permission_denied("nope").into();
        assert_eq!(exit_status(&err), EXIT_PERMISSION_DENIED);
        assert_eq!(error_kind(&err), "permission_denied");
    }

    #[test]
    fn test_exit_status_sees_through_context() {
        let result: Result<(), SuggestError> = Err(SuggestError::permission_denied("nope"));
        let err = result.context("publishing").unwrap_err();
        assert_eq!(exit_status(&err), EXIT_PERMISSION_DENIED);
    }

    #[test]
    fn test_other_errors_exit_one() {
        let err: anyhow::Error = SuggestError::not_found("gone").into();
        assert_eq!(exit_status(&err), EXIT_FAILURE);
        assert_eq!(error_kind(&err), "not_found");

        let err: anyhow::Error = UsageError::unknown_actor("mallory").into();
        assert_eq!(exit_status(&err), EXIT_FAILURE);
        assert_eq!(error_kind(&err), "error");
    }
}
