//! `CREATE FUNCTION` / `CREATE PROCEDURE` parsing, sharing one `Routine` shape.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::canon::canonicalize_identifier;
use crate::error::{ParserErrorKind, Result, SchemaSyncError};
use crate::model::{Parallel, ParamMode, Parameter, Routine, Volatility};

static CREATE_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^CREATE\s+(?:OR\s+REPLACE\s+)?(FUNCTION|PROCEDURE)\s+([A-Za-z_"][A-Za-z0-9_".]*)\s*\(([^)]*)\)\s*(.*)$"#,
    )
    .unwrap()
});
static RETURNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)RETURNS\s+([A-Za-z_][A-Za-z0-9_ ]*)").unwrap());
static LANGUAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)LANGUAGE\s+(\w+)").unwrap());
static BODY_DOLLAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)AS\s+(\$[A-Za-z_]*\$)(.*?)\1").unwrap());
static BODY_QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)AS\s+'(.*?)'").unwrap());
static COST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bCOST\s+(\d+(?:\.\d+)?)").unwrap());
static ROWS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bROWS\s+(\d+(?:\.\d+)?)").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn parse_mode(token: &str) -> (ParamMode, &str) {
    let trimmed = token.trim_start();
    let upper = trimmed.to_uppercase();
    if upper.starts_with("INOUT ") {
        (ParamMode::InOut, trimmed[6..].trim_start())
    } else if upper.starts_with("OUT ") {
        (ParamMode::Out, trimmed[4..].trim_start())
    } else if upper.starts_with("VARIADIC ") {
        (ParamMode::Variadic, trimmed[9..].trim_start())
    } else if upper.starts_with("IN ") {
        (ParamMode::In, trimmed[3..].trim_start())
    } else {
        (ParamMode::In, trimmed)
    }
}

fn parse_parameters(raw: &str) -> Vec<Parameter> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    split_top_level_commas(raw)
        .into_iter()
        .map(|p| {
            let (mode, remainder) = parse_mode(&p);
            let mut tokens = remainder.splitn(2, char::is_whitespace);
            let first = tokens.next().unwrap_or("").trim();
            let rest = tokens.next().unwrap_or("").trim();

            let (name, type_and_default) = if rest.is_empty() {
                (None, first.to_string())
            } else {
                (Some(canonicalize_identifier(first)), rest.to_string())
            };

            let (type_part, default) = match type_and_default.to_uppercase().find("DEFAULT") {
                Some(idx) => (
                    type_and_default[..idx].trim().to_string(),
                    Some(type_and_default[idx + "DEFAULT".len()..].trim().to_string()),
                ),
                None => (type_and_default.trim().to_string(), None),
            };

            Parameter {
                name,
                canonical_type: crate::canon::parse_type(&type_part).to_string(),
                mode,
                default,
            }
        })
        .collect()
}

fn split_top_level_commas(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Parse `CREATE [OR REPLACE] FUNCTION`/`CREATE [OR REPLACE] PROCEDURE`.
///
/// Procedures and functions share this one sub-parser: a procedure is simply a
/// `Routine` with `is_procedure = true` and `return_type = None`.
pub fn parse_create_routine(stmt: &str, line: usize) -> Result<Routine> {
    let caps = CREATE_FUNCTION.captures(stmt).ok_or_else(|| {
        SchemaSyncError::parser(
            ParserErrorKind::SyntaxError,
            "malformed CREATE FUNCTION/PROCEDURE statement",
            Some(line),
        )
    })?;

    let is_procedure = caps.get(1).unwrap().as_str().eq_ignore_ascii_case("PROCEDURE");
    let raw_name = caps.get(2).unwrap().as_str();
    let name = canonicalize_identifier(raw_name.rsplit('.').next().unwrap_or(raw_name));
    let parameters = parse_parameters(caps.get(3).unwrap().as_str());
    let tail = caps.get(4).unwrap().as_str();

    let return_type = if is_procedure {
        None
    } else {
        RETURNS
            .captures(tail)
            .map(|c| crate::canon::parse_type(c.get(1).unwrap().as_str().trim()).to_string())
    };

    let language = LANGUAGE
        .captures(tail)
        .map(|c| c.get(1).unwrap().as_str().to_lowercase())
        .unwrap_or_else(|| "sql".to_string());

    let body = if let Some(c) = BODY_DOLLAR.captures(tail) {
        c.get(2).unwrap().as_str().trim().to_string()
    } else if let Some(c) = BODY_QUOTED.captures(tail) {
        c.get(1).unwrap().as_str().trim().to_string()
    } else {
        String::new()
    };
    let body = WHITESPACE.replace_all(&body, " ").trim().to_string();

    let upper_tail = tail.to_uppercase();
    let volatility = if upper_tail.contains("IMMUTABLE") {
        Volatility::Immutable
    } else if upper_tail.contains("STABLE") {
        Volatility::Stable
    } else {
        Volatility::Volatile
    };
    let parallel = if upper_tail.contains("PARALLEL SAFE") {
        Parallel::Safe
    } else if upper_tail.contains("PARALLEL RESTRICTED") {
        Parallel::Restricted
    } else {
        Parallel::Unsafe
    };
    let security_definer = upper_tail.contains("SECURITY DEFINER");
    let strict = upper_tail.contains("STRICT") || upper_tail.contains("RETURNS NULL ON NULL INPUT");
    let cost = COST.captures(tail).and_then(|c| c.get(1).unwrap().as_str().parse().ok());
    let rows = ROWS.captures(tail).and_then(|c| c.get(1).unwrap().as_str().parse().ok());

    Ok(Routine {
        name,
        parameters,
        return_type,
        language,
        body,
        volatility,
        parallel,
        security_definer,
        strict,
        cost,
        rows,
        is_procedure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let r = parse_create_routine(
            "CREATE FUNCTION add_one(n INTEGER) RETURNS INTEGER LANGUAGE sql AS $$ SELECT n + 1; $$",
            1,
        )
        .unwrap();
        assert_eq!(r.name, "add_one");
        assert!(!r.is_procedure);
        assert_eq!(r.return_type.as_deref(), Some("INTEGER"));
        assert_eq!(r.language, "sql");
        assert!(r.body.contains("SELECT n + 1"));
        assert_eq!(r.parameters[0].canonical_type, "INTEGER");
    }

    #[test]
    fn test_parse_procedure_has_no_return_type() {
        let r = parse_create_routine(
            "CREATE PROCEDURE do_thing() LANGUAGE plpgsql AS $$ BEGIN NULL; END; $$",
            1,
        )
        .unwrap();
        assert!(r.is_procedure);
        assert_eq!(r.return_type, None);
    }

    #[test]
    fn test_parse_function_volatility_and_parallel() {
        let r = parse_create_routine(
            "CREATE FUNCTION f() RETURNS VOID LANGUAGE sql IMMUTABLE PARALLEL SAFE AS $$ SELECT 1 $$",
            1,
        )
        .unwrap();
        assert_eq!(r.volatility, Volatility::Immutable);
        assert_eq!(r.parallel, Parallel::Safe);
    }

    #[test]
    fn test_parse_function_with_default_parameter() {
        let r = parse_create_routine(
            "CREATE FUNCTION f(a INTEGER DEFAULT 0) RETURNS INTEGER LANGUAGE sql AS $$ SELECT a $$",
            1,
        )
        .unwrap();
        assert_eq!(r.parameters[0].name.as_deref(), Some("a"));
        assert_eq!(r.parameters[0].default.as_deref(), Some("0"));
    }

    #[test]
    fn test_parse_function_out_parameter_mode() {
        let r = parse_create_routine(
            "CREATE FUNCTION f(IN a INTEGER, OUT b INTEGER) RETURNS INTEGER LANGUAGE sql AS $$ SELECT 1 $$",
            1,
        )
        .unwrap();
        assert_eq!(r.parameters[0].mode, ParamMode::In);
        assert_eq!(r.parameters[1].mode, ParamMode::Out);
    }
}
