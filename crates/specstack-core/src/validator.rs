//! Gate between a finished command and the privileged executor.
//!
//! Given the exit code and captured error channel of a prior invocation,
//! decide whether the requested action may proceed. Validation is
//! structural: the envelope is checked field by field against the schema of
//! the kind its exit code reserves, so the report can name exactly what is
//! missing or mistyped. Blocked requests are never retried here.

use crate::context::Host;
use crate::contract::{ContractEnvelope, EnvelopeKind};
use crate::error::{Result, StackError};
use crate::events::{AuditRecord, EventLog};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub problem: String,
}

impl Violation {
    fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub exit_code: i32,
    pub expected: EnvelopeKind,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ViolationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "contract violation: exit code {} requires a '{}' envelope",
            self.exit_code, self.expected
        )?;
        for v in &self.violations {
            writeln!(f, "  - {v}")?;
        }
        write!(
            f,
            "the action was blocked; correct the command output and invoke it again"
        )
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Proceed. `None` when the exit code requested no action.
    Allow(Option<ContractEnvelope>),
    Block(ViolationReport),
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }

    /// Convert a block into [`StackError::ContractSchemaViolation`].
    pub fn into_result(self) -> Result<Option<ContractEnvelope>> {
        match self {
            Verdict::Allow(env) => Ok(env),
            Verdict::Block(report) => Err(StackError::ContractSchemaViolation(report.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// check (pure)
// ---------------------------------------------------------------------------

/// Decide allow/block without side effects.
pub fn check(exit_code: i32, error_channel: &str) -> Verdict {
    let Some(expected) = EnvelopeKind::from_exit_code(exit_code) else {
        return Verdict::Allow(None);
    };
    let block = |violations| {
        Verdict::Block(ViolationReport {
            exit_code,
            expected,
            violations,
        })
    };

    let obj = match extract_envelope(error_channel) {
        Ok(obj) => obj,
        Err(v) => return block(vec![v]),
    };

    match obj.get("type") {
        None => return block(vec![Violation::new("type", "missing required field")]),
        Some(Value::String(tag)) if tag == expected.as_str() => {}
        Some(Value::String(tag)) => {
            return block(vec![Violation::new(
                "type",
                format!(
                    "envelope is '{tag}' but exit code {exit_code} is reserved for '{expected}'"
                ),
            )])
        }
        Some(other) => {
            return block(vec![Violation::new(
                "type",
                format!("expected string, found {}", type_name(other)),
            )])
        }
    }

    let violations = match expected {
        EnvelopeKind::PrSuggestion => check_pr_suggestion(&obj),
        EnvelopeKind::ImportPrompt => check_import_prompt(&obj),
    };
    if !violations.is_empty() {
        return block(violations);
    }

    match serde_json::from_value::<ContractEnvelope>(Value::Object(obj)) {
        Ok(env) => Verdict::Allow(Some(env)),
        Err(e) => block(vec![Violation::new("<envelope>", e.to_string())]),
    }
}

/// [`check`] over raw bytes. Content that is not UTF-8 cannot carry an
/// envelope, so under a reserved code it blocks.
pub fn check_bytes(exit_code: i32, error_channel: &[u8]) -> Verdict {
    let Some(expected) = EnvelopeKind::from_exit_code(exit_code) else {
        return Verdict::Allow(None);
    };
    match std::str::from_utf8(error_channel) {
        Ok(text) => check(exit_code, text),
        Err(e) => Verdict::Block(ViolationReport {
            exit_code,
            expected,
            violations: vec![Violation::new(
                "<envelope>",
                format!("error channel is not valid UTF-8 ({e})"),
            )],
        }),
    }
}

/// The envelope is the whole channel, or failing that the last line that
/// parses as a JSON object. Other stderr lines (logs) are ignored.
fn extract_envelope(content: &str) -> std::result::Result<Map<String, Value>, Violation> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Violation::new("<envelope>", "error channel is empty"));
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Object(map) => Ok(map),
            other => Err(Violation::new(
                "<envelope>",
                format!("expected a JSON object, found {}", type_name(&other)),
            )),
        };
    }
    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .find_map(|l| match serde_json::from_str::<Value>(l) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .ok_or_else(|| Violation::new("<envelope>", "no JSON object found on the error channel"))
}

fn check_pr_suggestion(obj: &Map<String, Value>) -> Vec<Violation> {
    let mut out = Vec::new();
    for field in ["title", "description", "base", "specId"] {
        require_string(obj.get(field), field, &mut out);
    }
    out
}

fn check_import_prompt(obj: &Map<String, Value>) -> Vec<Violation> {
    let mut out = Vec::new();

    match obj.get("branches") {
        None => out.push(Violation::new("branches", "missing required field")),
        Some(Value::Array(items)) if items.is_empty() => {
            out.push(Violation::new("branches", "must contain at least one branch"))
        }
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let Value::Object(entry) = item else {
                    out.push(Violation::new(
                        format!("branches[{i}]"),
                        format!("expected object, found {}", type_name(item)),
                    ));
                    continue;
                };
                for field in ["branchName", "baseBranch"] {
                    require_string(entry.get(field), &format!("branches[{i}].{field}"), &mut out);
                }
            }
        }
        Some(other) => out.push(Violation::new(
            "branches",
            format!("expected array, found {}", type_name(other)),
        )),
    }

    match obj.get("availableSpecs") {
        None => out.push(Violation::new("availableSpecs", "missing required field")),
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    out.push(Violation::new(
                        format!("availableSpecs[{i}]"),
                        format!("expected string, found {}", type_name(item)),
                    ));
                }
            }
        }
        Some(other) => out.push(Violation::new(
            "availableSpecs",
            format!("expected array, found {}", type_name(other)),
        )),
    }

    out
}

fn require_string(value: Option<&Value>, field: &str, out: &mut Vec<Violation>) {
    match value {
        None => out.push(Violation::new(field, "missing required field")),
        Some(Value::String(_)) => {}
        Some(other) => out.push(Violation::new(
            field,
            format!("expected string, found {}", type_name(other)),
        )),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// ContractValidator
// ---------------------------------------------------------------------------

/// [`check`] plus the audit trail.
pub struct ContractValidator {
    log: EventLog,
    host: Host,
}

impl ContractValidator {
    pub fn new(log: EventLog, host: Host) -> Self {
        Self { log, host }
    }

    pub fn validate(&self, exit_code: i32, error_channel: &str) -> Verdict {
        self.record(exit_code, check(exit_code, error_channel))
    }

    /// Same as [`ContractValidator::validate`] for a channel captured as raw
    /// bytes.
    pub fn validate_bytes(&self, exit_code: i32, error_channel: &[u8]) -> Verdict {
        self.record(exit_code, check_bytes(exit_code, error_channel))
    }

    /// Append the audit record for a reserved exit code. A failed append is
    /// logged; the verdict stands either way.
    fn record(&self, exit_code: i32, verdict: Verdict) -> Verdict {
        let record = match &verdict {
            Verdict::Allow(None) => return verdict,
            Verdict::Allow(Some(env)) => AuditRecord::passed(exit_code, env.kind(), self.host),
            Verdict::Block(report) => {
                tracing::warn!(exit_code, violations = report.violations.len(), "contract blocked");
                AuditRecord::violated(
                    exit_code,
                    report.violations.iter().map(|v| v.to_string()).collect(),
                    self.host,
                )
            }
        };
        if let Err(e) = self.log.append(&record) {
            tracing::error!(exit_code, error = %e, "failed to append contract audit record");
        }
        verdict
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use serde_json::json;
    use tempfile::TempDir;

    fn pr() -> Value {
        json!({
            "type": "pr-suggestion",
            "title": "Add login",
            "description": "Implements 001-login",
            "base": "main",
            "specId": "001-login"
        })
    }

    fn import() -> Value {
        json!({
            "type": "import-prompt",
            "branches": [{"branchName": "feat-a", "baseBranch": "main"}],
            "availableSpecs": ["001-login"]
        })
    }

    fn fields(verdict: &Verdict) -> Vec<String> {
        match verdict {
            Verdict::Block(r) => r.violations.iter().map(|v| v.field.clone()).collect(),
            Verdict::Allow(_) => panic!("expected block"),
        }
    }

    #[test]
    fn non_reserved_codes_are_noops() {
        for code in [0, 1, 4, 127] {
            assert_eq!(check(code, "garbage"), Verdict::Allow(None));
        }
    }

    #[test]
    fn valid_pr_suggestion_allowed() {
        let verdict = check(2, &pr().to_string());
        match verdict {
            Verdict::Allow(Some(ContractEnvelope::PrSuggestion(p))) => {
                assert_eq!(p.spec_id, "001-login")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn each_missing_pr_field_is_named() {
        for field in ["title", "description", "base", "specId"] {
            let mut env = pr();
            env.as_object_mut().unwrap().remove(field);
            let verdict = check(2, &env.to_string());
            assert_eq!(fields(&verdict), vec![field.to_string()]);
        }
    }

    #[test]
    fn mistyped_pr_field_is_named() {
        let mut env = pr();
        env["specId"] = json!(7);
        let verdict = check(2, &env.to_string());
        match &verdict {
            Verdict::Block(r) => {
                assert_eq!(r.violations[0].field, "specId");
                assert!(r.violations[0].problem.contains("found number"));
            }
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn tag_must_match_exit_code() {
        let verdict = check(3, &pr().to_string());
        assert_eq!(fields(&verdict), vec!["type"]);
        let verdict = check(2, &import().to_string());
        assert_eq!(fields(&verdict), vec!["type"]);
    }

    #[test]
    fn valid_import_prompt_allowed() {
        assert!(check(3, &import().to_string()).is_allow());
    }

    #[test]
    fn import_prompt_requires_non_empty_branches() {
        let mut env = import();
        env["branches"] = json!([]);
        assert_eq!(fields(&check(3, &env.to_string())), vec!["branches"]);

        let mut env = import();
        env.as_object_mut().unwrap().remove("branches");
        assert_eq!(fields(&check(3, &env.to_string())), vec!["branches"]);
    }

    #[test]
    fn import_prompt_requires_available_specs_array() {
        let mut env = import();
        env.as_object_mut().unwrap().remove("availableSpecs");
        assert_eq!(fields(&check(3, &env.to_string())), vec!["availableSpecs"]);

        let mut env = import();
        env["availableSpecs"] = json!("001-login");
        assert_eq!(fields(&check(3, &env.to_string())), vec!["availableSpecs"]);

        // An empty list of specs is acceptable.
        let mut env = import();
        env["availableSpecs"] = json!([]);
        assert!(check(3, &env.to_string()).is_allow());
    }

    #[test]
    fn import_entry_fields_are_named_by_index() {
        let mut env = import();
        env["branches"] = json!([
            {"branchName": "a", "baseBranch": "main"},
            {"branchName": "b"}
        ]);
        assert_eq!(
            fields(&check(3, &env.to_string())),
            vec!["branches[1].baseBranch"]
        );
    }

    #[test]
    fn envelope_found_after_log_lines() {
        let content = format!(" WARN something noisy\n{}\n", pr());
        assert!(check(2, &content).is_allow());
    }

    #[test]
    fn empty_or_garbage_channel_blocks() {
        assert_eq!(fields(&check(2, "")), vec!["<envelope>"]);
        assert_eq!(fields(&check(2, "error: boom")), vec!["<envelope>"]);
        assert_eq!(fields(&check(3, "[1,2]")), vec!["<envelope>"]);
    }

    #[test]
    fn report_is_human_readable() {
        let mut env = pr();
        env.as_object_mut().unwrap().remove("base");
        let Verdict::Block(report) = check(2, &env.to_string()) else {
            panic!("expected block");
        };
        let text = report.to_string();
        assert!(text.contains("pr-suggestion"));
        assert!(text.contains("base: missing required field"));
    }

    #[test]
    fn validator_audits_reserved_codes_only() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events.jsonl"));
        let validator = ContractValidator::new(log.clone(), Host::Direct);

        validator.validate(0, "");
        validator.validate(1, "error: x");
        assert!(log.read_all().unwrap().is_empty());

        assert!(validator.validate(2, &pr().to_string()).is_allow());
        assert!(!validator.validate(3, "{}").is_allow());

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, EventType::ContractValidation);
        assert!(records[0].pass);
        assert_eq!(records[1].event_type, EventType::ContractViolation);
        assert_eq!(records[1].exit_code, 3);
        assert!(!records[1].pass);
        assert!(!records[1].violations.is_empty());
    }

    #[test]
    fn block_converts_to_schema_violation_error() {
        let err = check(2, "{}").into_result().unwrap_err();
        assert!(matches!(err, StackError::ContractSchemaViolation(_)));
    }

    #[test]
    fn non_utf8_channel_blocks_reserved_codes() {
        let bytes = [0xff, 0xfe, b'{', b'}'];
        assert_eq!(check_bytes(0, &bytes), Verdict::Allow(None));
        let verdict = check_bytes(2, &bytes);
        assert_eq!(fields(&verdict), vec!["<envelope>"]);
        let Verdict::Block(report) = verdict else {
            panic!("expected block");
        };
        assert!(report.violations[0].problem.contains("UTF-8"));

        assert!(check_bytes(2, pr().to_string().as_bytes()).is_allow());
    }

    #[test]
    fn non_utf8_channel_is_audited() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events.jsonl"));
        let validator = ContractValidator::new(log.clone(), Host::Direct);

        assert!(!validator.validate_bytes(2, &[0xff, 0xfe]).is_allow());
        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, EventType::ContractViolation);
    }

    #[test]
    fn unwritable_audit_log_keeps_the_verdict() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let validator =
            ContractValidator::new(EventLog::new(blocker.join("events.jsonl")), Host::Direct);

        assert!(matches!(validator.validate(3, "{}"), Verdict::Block(_)));
        assert!(validator.validate(2, &pr().to_string()).is_allow());
    }
}
