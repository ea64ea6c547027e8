//! Canonicalization rules: the single source of truth for deciding whether two
//! lexically different declarations describe the same schema entity.
//!
//! Both the declared-SQL parser and the database introspector funnel their raw
//! output through these functions so that `INT` (declared) and `integer`
//! (introspected) collapse to one canonical type string before the diff engine
//! ever sees them.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Map a dialect type alias to its canonical form. Unknown types pass through
/// upper-cased and untouched, since this is normative only for the aliases the
/// spec enumerates, not an exhaustive type catalog.
pub fn canonicalize_type_name(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "INT" | "INT4" => "INTEGER".to_string(),
        "INT2" => "SMALLINT".to_string(),
        "INT8" => "BIGINT".to_string(),
        "FLOAT4" => "REAL".to_string(),
        "FLOAT8" => "DOUBLE PRECISION".to_string(),
        "BOOL" => "BOOLEAN".to_string(),
        "VARCHAR" => "CHARACTER VARYING".to_string(),
        "TIMESTAMPTZ" => "TIMESTAMP WITH TIME ZONE".to_string(),
        "TIMESTAMP" => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
        "DECIMAL" => "NUMERIC".to_string(),
        "VARBIT" => "BIT VARYING".to_string(),
        other => other.to_string(),
    }
}

/// A parsed type reference: canonical base name plus optional parameters
/// (length, or precision/scale), preserved verbatim when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalType {
    pub base: String,
    pub params: Option<String>,
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.params {
            Some(p) => write!(f, "{}({})", self.base, p),
            None => write!(f, "{}", self.base),
        }
    }
}

static TYPE_WITH_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_ ]*)\(([^)]*)\)$").unwrap());

/// Parse a declared type string like `VARCHAR(255)`, `NUMERIC(10,2)`, `TEXT`,
/// or a PostGIS type like `GEOMETRY(Point,4326)` into a canonical type.
///
/// "No parameter" and "default parameter" are distinguished: `NUMERIC` and
/// `NUMERIC(10)` produce different `CanonicalType`s.
pub fn parse_type(raw: &str) -> CanonicalType {
    let trimmed = raw.trim();
    if let Some(caps) = TYPE_WITH_PARAMS.captures(trimmed) {
        let base_raw = caps.get(1).unwrap().as_str().trim();
        let params_raw = caps.get(2).unwrap().as_str().trim();
        let base_upper = base_raw.to_uppercase();
        if is_postgis_type(&base_upper) {
            // PostGIS type parameters keep their casing inside the parens folded to
            // lower case, but are otherwise preserved verbatim.
            return CanonicalType {
                base: base_upper,
                params: Some(params_raw.to_lowercase()),
            };
        }
        return CanonicalType {
            base: canonicalize_type_name(base_raw),
            params: Some(params_raw.replace(' ', "")),
        };
    }

    // The SERIAL family is handled by the table/column builder (it expands into
    // a column + sequence + default), never reaches here as a plain type.
    CanonicalType {
        base: canonicalize_type_name(trimmed),
        params: None,
    }
}

fn is_postgis_type(base_upper: &str) -> bool {
    matches!(base_upper, "GEOGRAPHY" | "GEOMETRY")
}

fn integer_width(base: &str) -> Option<u8> {
    match base {
        "SMALLINT" => Some(1),
        "INTEGER" => Some(2),
        "BIGINT" => Some(3),
        _ => None,
    }
}

/// Whether changing a column's canonical type from `from` to `to` can be
/// expressed as an in-place `ALTER COLUMN ... TYPE` without risking a
/// non-representable value in existing rows.
///
/// Non-exhaustive: it covers the widening conversions PostgreSQL itself casts
/// implicitly (narrower-to-wider integers, `REAL` to `DOUBLE PRECISION`,
/// integers to exact/approximate numeric types, and `VARCHAR`/`CHAR` length
/// increases or length removal). Anything outside that set — including every
/// narrowing conversion — is treated as lossy and routed through a full table
/// recreation instead, since this tool has no live `pg_cast` catalog to check
/// against and a wrong "lossless" call would risk failed or silently
/// truncated data.
pub fn is_lossless_type_change(from: &str, to: &str) -> bool {
    if from == to {
        return true;
    }
    let from_t = parse_type(from);
    let to_t = parse_type(to);

    if let (Some(fw), Some(tw)) = (integer_width(&from_t.base), integer_width(&to_t.base)) {
        return tw >= fw;
    }
    if from_t.base == "REAL" && to_t.base == "DOUBLE PRECISION" {
        return true;
    }
    if integer_width(&from_t.base).is_some() && matches!(to_t.base.as_str(), "NUMERIC" | "DOUBLE PRECISION" | "REAL") {
        return true;
    }
    if from_t.base == to_t.base && matches!(from_t.base.as_str(), "CHARACTER VARYING" | "CHARACTER") {
        let from_len = from_t.params.as_deref().and_then(|p| p.parse::<u32>().ok());
        let to_len = to_t.params.as_deref().and_then(|p| p.parse::<u32>().ok());
        return match (from_len, to_len) {
            (_, None) => true,
            (Some(f), Some(t)) => t >= f,
            (None, Some(_)) => false,
        };
    }
    false
}

/// Collapse a boolean literal to its canonical `true`/`false` string form.
/// Returns `None` if `raw` is not recognizable as a boolean literal.
pub fn canonicalize_bool_literal(raw: &str) -> Option<&'static str> {
    match raw.trim().trim_matches('\'').to_lowercase().as_str() {
        "true" | "t" | "yes" | "on" | "1" => Some("true"),
        "false" | "f" | "no" | "off" | "0" => Some("false"),
        _ => None,
    }
}

static REDUNDANT_CAST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^(.*)::\s*([A-Za-z_][A-Za-z0-9_ ]*)\s*$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalize a default-value expression for a column of the given canonical
/// type: strip a redundant trailing `::type` cast that matches the column's own
/// type, collapse whitespace, and normalize `NOW()`/`CURRENT_TIMESTAMP` and
/// boolean literals to a single canonical spelling.
pub fn canonicalize_default(raw: &str, column_type: &str) -> String {
    let mut expr = WHITESPACE.replace_all(raw.trim(), " ").to_string();

    if let Some(caps) = REDUNDANT_CAST.captures(&expr) {
        let inner = caps.get(1).unwrap().as_str().trim();
        let cast_type = canonicalize_type_name(caps.get(2).unwrap().as_str());
        if cast_type.eq_ignore_ascii_case(&canonicalize_type_name(column_type)) {
            expr = inner.to_string();
        }
    }

    let upper = expr.to_uppercase();
    if upper == "CURRENT_TIMESTAMP" || upper == "NOW()" {
        return "CURRENT_TIMESTAMP".to_string();
    }

    if let Some(b) = canonicalize_bool_literal(&expr) {
        if upper == "TRUE" || upper == "FALSE" || expr.trim() == "'t'" || expr.trim() == "'f'" {
            return b.to_string();
        }
    }

    expr
}

/// Strip unnecessary double-quoting from an identifier, re-quoting only when
/// the identifier contains characters outside `[a-z0-9_]`, starts with a
/// digit, or collides with a reserved word.
pub fn canonicalize_identifier(raw: &str) -> String {
    let unquoted = if raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2 {
        raw[1..raw.len() - 1].replace("\"\"", "\"")
    } else {
        raw.to_string()
    };

    if needs_quoting(&unquoted) {
        format!("\"{}\"", unquoted.replace('"', "\"\""))
    } else {
        unquoted.to_lowercase()
    }
}

fn needs_quoting(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    let starts_with_digit = name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false);
    let has_unsafe_chars = !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    // Case-sensitivity is itself a reason to quote: an all-lowercase name never
    // needs quoting on that basis alone, but a mixed/upper-case name does,
    // since folding it would change its identity.
    let has_uppercase = name.chars().any(|c| c.is_ascii_uppercase());
    starts_with_digit || has_unsafe_chars || has_uppercase || is_reserved_word(name)
}

const RESERVED_WORDS: &[&str] = &[
    "select", "insert", "update", "delete", "table", "from", "where", "order", "group", "user",
    "primary", "foreign", "references", "check", "unique", "default", "column", "index", "all",
];

fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_type_name_int_aliases() {
        assert_eq!(canonicalize_type_name("int"), "INTEGER");
        assert_eq!(canonicalize_type_name("INT4"), "INTEGER");
        assert_eq!(canonicalize_type_name("int2"), "SMALLINT");
        assert_eq!(canonicalize_type_name("int8"), "BIGINT");
    }

    #[test]
    fn test_canonicalize_type_name_varchar() {
        assert_eq!(canonicalize_type_name("varchar"), "CHARACTER VARYING");
    }

    #[test]
    fn test_parse_type_no_params_vs_default_params() {
        let no_params = parse_type("NUMERIC");
        let with_params = parse_type("NUMERIC(10)");
        assert_ne!(no_params, with_params);
        assert_eq!(no_params.params, None);
        assert_eq!(with_params.params, Some("10".to_string()));
    }

    #[test]
    fn test_parse_type_varchar_alias_equals_character_varying() {
        let a = parse_type("VARCHAR(255)");
        let b = parse_type("character varying(255)");
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_type_postgis_preserves_params_lowercased() {
        let t = parse_type("GEOGRAPHY(Point,4326)");
        assert_eq!(t.base, "GEOGRAPHY");
        assert_eq!(t.params, Some("point,4326".to_string()));
    }

    #[test]
    fn test_canonicalize_default_strips_redundant_cast() {
        assert_eq!(canonicalize_default("'x'::text", "TEXT"), "'x'");
    }

    #[test]
    fn test_canonicalize_default_keeps_non_matching_cast() {
        assert_eq!(
            canonicalize_default("'1'::integer", "TEXT"),
            "'1'::integer"
        );
    }

    #[test]
    fn test_canonicalize_default_now_equals_current_timestamp() {
        assert_eq!(
            canonicalize_default("now()", "TIMESTAMP"),
            canonicalize_default("CURRENT_TIMESTAMP", "TIMESTAMP")
        );
    }

    #[test]
    fn test_canonicalize_default_collapses_whitespace() {
        assert_eq!(canonicalize_default("  1  +   1  ", "INTEGER"), "1 + 1");
    }

    #[test]
    fn test_canonicalize_bool_literal() {
        assert_eq!(canonicalize_bool_literal("TRUE"), Some("true"));
        assert_eq!(canonicalize_bool_literal("'t'"), Some("true"));
        assert_eq!(canonicalize_bool_literal("false"), Some("false"));
        assert_eq!(canonicalize_bool_literal("maybe"), None);
    }

    #[test]
    fn test_canonicalize_identifier_unquoted_lowercases() {
        assert_eq!(canonicalize_identifier("Users"), "\"Users\"");
        assert_eq!(canonicalize_identifier("users"), "users");
    }

    #[test]
    fn test_canonicalize_identifier_strips_unneeded_quotes() {
        assert_eq!(canonicalize_identifier("\"users\""), "users");
    }

    #[test]
    fn test_canonicalize_identifier_keeps_quotes_for_reserved_word() {
        assert_eq!(canonicalize_identifier("\"select\""), "\"select\"");
    }

    #[test]
    fn test_canonicalize_identifier_keeps_quotes_for_digit_start() {
        assert_eq!(canonicalize_identifier("1table"), "\"1table\"");
    }

    #[test]
    fn test_integer_widening_is_lossless() {
        assert!(is_lossless_type_change("SMALLINT", "INTEGER"));
        assert!(is_lossless_type_change("INTEGER", "BIGINT"));
        assert!(!is_lossless_type_change("BIGINT", "INTEGER"));
    }

    #[test]
    fn test_varchar_length_increase_is_lossless() {
        assert!(is_lossless_type_change("CHARACTER VARYING(50)", "CHARACTER VARYING(255)"));
        assert!(!is_lossless_type_change("CHARACTER VARYING(255)", "CHARACTER VARYING(50)"));
    }

    #[test]
    fn test_unrelated_type_change_is_lossy() {
        assert!(!is_lossless_type_change("INTEGER", "TEXT"));
        assert!(!is_lossless_type_change("DATE", "TIMESTAMP WITHOUT TIME ZONE"));
    }
}
