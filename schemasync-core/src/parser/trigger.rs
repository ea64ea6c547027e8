//! `CREATE TRIGGER` parsing.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::canonicalize_identifier;
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::{Trigger, TriggerEvent, TriggerForEach, TriggerTiming};

static CREATE_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^CREATE\s+TRIGGER\s+([A-Za-z_"][A-Za-z0-9_"]*)\s+(BEFORE|AFTER|INSTEAD\s+OF)\s+(.+?)\s+ON\s+([A-Za-z_"][A-Za-z0-9_".]*)\s*(?:FOR\s+EACH\s+(ROW|STATEMENT)\s*)?(?:WHEN\s*\((.+?)\)\s*)?EXECUTE\s+(?:FUNCTION|PROCEDURE)\s+([A-Za-z_"][A-Za-z0-9_".]*)\s*\(([^)]*)\)\s*$"#,
    )
    .unwrap()
});

fn parse_events(raw: &str) -> BTreeSet<TriggerEvent> {
    let mut events = BTreeSet::new();
    for part in raw.to_uppercase().replace(" OR ", ",").split(',') {
        // UPDATE OF col1, col2 — only the event keyword matters for the set.
        let head = part.trim().split_whitespace().next().unwrap_or("");
        match head {
            "INSERT" => {
                events.insert(TriggerEvent::Insert);
            }
            "UPDATE" => {
                events.insert(TriggerEvent::Update);
            }
            "DELETE" => {
                events.insert(TriggerEvent::Delete);
            }
            "TRUNCATE" => {
                events.insert(TriggerEvent::Truncate);
            }
            _ => {}
        }
    }
    events
}

/// Parse `CREATE TRIGGER name {BEFORE|AFTER|INSTEAD OF} event [OR event ...] ON table
/// [FOR EACH {ROW|STATEMENT}] [WHEN (cond)] EXECUTE {FUNCTION|PROCEDURE} fn(args)`.
pub fn parse_create_trigger(stmt: &str, line: usize) -> Result<Trigger> {
    let caps = CREATE_TRIGGER.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE TRIGGER statement",
            Some(line),
        )
    })?;

    let name = canonicalize_identifier(caps.get(1).unwrap().as_str());
    let timing = match caps.get(2).unwrap().as_str().to_uppercase().replace(' ', "") .as_str() {
        "BEFORE" => TriggerTiming::Before,
        "AFTER" => TriggerTiming::After,
        _ => TriggerTiming::InsteadOf,
    };
    let events = parse_events(caps.get(3).unwrap().as_str());
    let table_raw = caps.get(4).unwrap().as_str();
    let table = canonicalize_identifier(table_raw.rsplit('.').next().unwrap_or(table_raw));
    let for_each = match caps.get(5).map(|m| m.as_str().to_uppercase()).as_deref() {
        Some("ROW") => TriggerForEach::Row,
        _ => TriggerForEach::Statement,
    };
    let when = caps.get(6).map(|m| m.as_str().trim().to_string());
    let function_raw = caps.get(7).unwrap().as_str();
    let function = canonicalize_identifier(function_raw.rsplit('.').next().unwrap_or(function_raw));
    let function_args = caps
        .get(8)
        .unwrap()
        .as_str()
        .split(',')
        .map(|a| a.trim().trim_matches('\'').to_string())
        .filter(|a| !a.is_empty())
        .collect();

    if events.is_empty() {
        return Err(SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "trigger declares no recognizable events",
            Some(line),
        ));
    }

    Ok(Trigger {
        name,
        table,
        timing,
        events,
        for_each,
        when,
        function,
        function_args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_trigger() {
        let t = parse_create_trigger(
            "CREATE TRIGGER trg_audit AFTER INSERT ON users FOR EACH ROW EXECUTE FUNCTION audit_log()",
            1,
        )
        .unwrap();
        assert_eq!(t.name, "trg_audit");
        assert_eq!(t.timing, TriggerTiming::After);
        assert!(t.events.contains(&TriggerEvent::Insert));
        assert_eq!(t.for_each, TriggerForEach::Row);
        assert_eq!(t.function, "audit_log");
    }

    #[test]
    fn test_parse_multi_event_trigger_order_independent() {
        let a = parse_create_trigger(
            "CREATE TRIGGER t BEFORE INSERT OR UPDATE ON x FOR EACH ROW EXECUTE FUNCTION f()",
            1,
        )
        .unwrap();
        let b = parse_create_trigger(
            "CREATE TRIGGER t BEFORE UPDATE OR INSERT ON x FOR EACH ROW EXECUTE FUNCTION f()",
            1,
        )
        .unwrap();
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn test_parse_trigger_with_when_clause() {
        let t = parse_create_trigger(
            "CREATE TRIGGER t AFTER UPDATE ON x FOR EACH ROW WHEN (OLD.status IS DISTINCT FROM NEW.status) EXECUTE FUNCTION f()",
            1,
        )
        .unwrap();
        assert!(t.when.unwrap().contains("DISTINCT"));
    }

    #[test]
    fn test_parse_instead_of_trigger() {
        let t = parse_create_trigger(
            "CREATE TRIGGER t INSTEAD OF DELETE ON v FOR EACH ROW EXECUTE FUNCTION f()",
            1,
        )
        .unwrap();
        assert_eq!(t.timing, TriggerTiming::InsteadOf);
    }
}
