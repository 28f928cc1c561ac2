use std::collections::BTreeSet;

use crate::db::{Db, Event, EventKind};
use crate::error::StoreError;

pub const DEFAULT_IGNORE_LIST: &[&str] = &["pwd", "ls"];

/// Filtering applied to history lines. Every rule defaults to on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPolicy {
    pub ignore_duplicates: bool,
    pub ignore_leading_space: bool,
    pub ignore_list: BTreeSet<String>,
}

impl Default for RecordPolicy {
    fn default() -> Self {
        Self {
            ignore_duplicates: true,
            ignore_leading_space: true,
            ignore_list: DEFAULT_IGNORE_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    Empty,
    LeadingSpace,
    Ignored,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Suppressed(SuppressReason),
}

pub fn record_session_start(
    db: &Db,
    timestamp: i64,
    pid: i64,
    command: Option<&str>,
) -> Result<RecordOutcome, StoreError> {
    record_boundary(db, EventKind::SessionStart, timestamp, pid, command)
}

pub fn record_session_stop(
    db: &Db,
    timestamp: i64,
    pid: i64,
    command: Option<&str>,
) -> Result<RecordOutcome, StoreError> {
    record_boundary(db, EventKind::SessionStop, timestamp, pid, command)
}

fn record_boundary(
    db: &Db,
    kind: EventKind,
    timestamp: i64,
    pid: i64,
    command: Option<&str>,
) -> Result<RecordOutcome, StoreError> {
    db.append(&Event {
        kind,
        timestamp,
        pid,
        command: command.map(str::to_string),
    })?;
    tracing::debug!(?kind, pid, timestamp, "recorded session boundary");
    Ok(RecordOutcome::Recorded)
}

/// Appends a history line unless `policy` suppresses it. The duplicate
/// lookup and the insert are separate statements, so two concurrent shells
/// with the same pid can both get through.
pub fn record_history(
    db: &Db,
    policy: &RecordPolicy,
    timestamp: i64,
    pid: i64,
    command: Option<&str>,
) -> Result<RecordOutcome, StoreError> {
    if let Some(reason) = suppress_reason(db, policy, pid, command)? {
        tracing::debug!(?reason, pid, "history line not recorded");
        return Ok(RecordOutcome::Suppressed(reason));
    }
    let command = command.unwrap_or_default();
    db.append(&Event::history(timestamp, pid, command))?;
    tracing::debug!(pid, timestamp, "recorded history line");
    Ok(RecordOutcome::Recorded)
}

fn suppress_reason(
    db: &Db,
    policy: &RecordPolicy,
    pid: i64,
    command: Option<&str>,
) -> Result<Option<SuppressReason>, StoreError> {
    let command = match command {
        Some(c) if !c.is_empty() => c,
        _ => return Ok(Some(SuppressReason::Empty)),
    };
    if policy.ignore_leading_space && command.starts_with(' ') {
        return Ok(Some(SuppressReason::LeadingSpace));
    }
    if policy.ignore_list.contains(command.trim()) {
        return Ok(Some(SuppressReason::Ignored));
    }
    if policy.ignore_duplicates
        && db.most_recent_history_for(pid)?.as_deref() == Some(command)
    {
        return Ok(Some(SuppressReason::Duplicate));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Order;

    fn test_db() -> Db {
        Db::open_in_memory().expect("in-memory db")
    }

    fn history_count(db: &Db) -> usize {
        db.query_all(Order::OldestFirst, None)
            .unwrap()
            .iter()
            .filter(|e| e.kind == EventKind::History)
            .count()
    }

    #[test]
    fn test_duplicate_suppressed_by_default() {
        let db = test_db();
        let policy = RecordPolicy::default();
        assert_eq!(
            record_history(&db, &policy, 10, 1, Some("ls -la")).unwrap(),
            RecordOutcome::Recorded
        );
        assert_eq!(
            record_history(&db, &policy, 11, 1, Some("ls -la")).unwrap(),
            RecordOutcome::Suppressed(SuppressReason::Duplicate)
        );
        assert_eq!(history_count(&db), 1);
    }

    #[test]
    fn test_duplicates_kept_when_disabled() {
        let db = test_db();
        let policy = RecordPolicy {
            ignore_duplicates: false,
            ..Default::default()
        };
        record_history(&db, &policy, 10, 1, Some("ls -la")).unwrap();
        record_history(&db, &policy, 11, 1, Some("ls -la")).unwrap();
        assert_eq!(history_count(&db), 2);
    }

    #[test]
    fn test_duplicate_check_is_per_pid() {
        let db = test_db();
        let policy = RecordPolicy::default();
        record_history(&db, &policy, 10, 1, Some("make")).unwrap();
        assert_eq!(
            record_history(&db, &policy, 11, 2, Some("make")).unwrap(),
            RecordOutcome::Recorded
        );
    }

    #[test]
    fn test_duplicate_check_is_untrimmed() {
        let db = test_db();
        let policy = RecordPolicy::default();
        record_history(&db, &policy, 10, 1, Some("make")).unwrap();
        assert_eq!(
            record_history(&db, &policy, 11, 1, Some("make ")).unwrap(),
            RecordOutcome::Recorded
        );
    }

    #[test]
    fn test_non_consecutive_repeat_is_recorded() {
        let db = test_db();
        let policy = RecordPolicy::default();
        record_history(&db, &policy, 10, 1, Some("make")).unwrap();
        record_history(&db, &policy, 11, 1, Some("make test")).unwrap();
        record_history(&db, &policy, 12, 1, Some("make")).unwrap();
        assert_eq!(history_count(&db), 3);
    }

    #[test]
    fn test_ignore_list_and_leading_space() {
        let db = test_db();
        let policy = RecordPolicy::default();
        assert_eq!(
            record_history(&db, &policy, 10, 1, Some("pwd")).unwrap(),
            RecordOutcome::Suppressed(SuppressReason::Ignored)
        );
        assert_eq!(
            record_history(&db, &policy, 11, 1, Some(" secret")).unwrap(),
            RecordOutcome::Suppressed(SuppressReason::LeadingSpace)
        );
        assert_eq!(history_count(&db), 0);
    }

    #[test]
    fn test_ignore_list_matches_trimmed_text() {
        let db = test_db();
        let policy = RecordPolicy {
            ignore_leading_space: false,
            ..Default::default()
        };
        assert_eq!(
            record_history(&db, &policy, 10, 1, Some("  ls\t")).unwrap(),
            RecordOutcome::Suppressed(SuppressReason::Ignored)
        );
        assert_eq!(
            record_history(&db, &policy, 11, 1, Some("ls -la")).unwrap(),
            RecordOutcome::Recorded
        );
    }

    #[test]
    fn test_leading_space_kept_when_disabled() {
        let db = test_db();
        let policy = RecordPolicy {
            ignore_leading_space: false,
            ..Default::default()
        };
        assert_eq!(
            record_history(&db, &policy, 10, 1, Some(" secret")).unwrap(),
            RecordOutcome::Recorded
        );
    }

    #[test]
    fn test_empty_command_never_recorded() {
        let db = test_db();
        let policy = RecordPolicy {
            ignore_duplicates: false,
            ignore_leading_space: false,
            ignore_list: BTreeSet::new(),
        };
        assert_eq!(
            record_history(&db, &policy, 10, 1, None).unwrap(),
            RecordOutcome::Suppressed(SuppressReason::Empty)
        );
        assert_eq!(
            record_history(&db, &policy, 10, 1, Some("")).unwrap(),
            RecordOutcome::Suppressed(SuppressReason::Empty)
        );
        assert_eq!(history_count(&db), 0);
    }

    #[test]
    fn test_empty_rule_wins_over_others() {
        let db = test_db();
        let policy = RecordPolicy {
            ignore_list: [String::new()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            record_history(&db, &policy, 10, 1, Some("")).unwrap(),
            RecordOutcome::Suppressed(SuppressReason::Empty)
        );
    }

    #[test]
    fn test_boundaries_are_unconditional() {
        let db = test_db();
        record_session_start(&db, 1, 9, None).unwrap();
        record_session_start(&db, 1, 9, None).unwrap();
        record_session_stop(&db, 2, 9, Some("exit")).unwrap();

        let events = db.query_all(Order::OldestFirst, None).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].kind, EventKind::SessionStop);
        assert_eq!(events[2].command.as_deref(), Some("exit"));
    }
}
