//! PostgreSQL catalog introspection.
//!
//! Every object that declared SQL can describe via a deparse function
//! (`pg_get_constraintdef`, `pg_get_viewdef`, `pg_get_functiondef`,
//! `pg_get_indexdef`) is read through that same function here, rather than
//! hand-reconstructed from catalog columns — native deparse and the
//! declared-SQL parser are kept as the two (and only two) sources of DDL
//! text in this tool, so nothing silently drifts from how PostgreSQL itself
//! would write the object back out.

use std::collections::{BTreeMap, BTreeSet};

use tokio_postgres::Client;

use crate::canon::{canonicalize_default, canonicalize_identifier, parse_type};
use crate::error::Result;
use crate::expr::canonicalize_check_expression;
use crate::model::{
    CheckConstraint, Column, EnumType, Extension, ForeignKey, Index, IndexColumn, IndexMethod,
    IndexOwner, ParamMode, Parameter, Parallel, PrimaryKey, ReferentialAction, Routine,
    SchemaDefinition, SchemaModel, Sequence, Table, Trigger, TriggerEvent, TriggerForEach,
    TriggerTiming, UniqueConstraint, View, Volatility,
};

/// Introspect every object this tool understands, scoped to one named schema.
pub async fn introspect_postgres(client: &Client, schema: &str) -> Result<SchemaModel> {
    let mut model = SchemaModel::new();

    for table in introspect_tables(client, schema).await? {
        model.tables.insert(table.qualified_name(), table);
    }
    for view in introspect_views(client, schema).await? {
        model.views.insert(view.name.clone(), view);
    }
    for e in introspect_enums(client, schema).await? {
        model.enums.insert(e.name.clone(), e);
    }
    for seq in introspect_sequences(client, schema).await? {
        model.sequences.insert(seq.name.clone(), seq);
    }
    let (functions, procedures) = introspect_routines(client, schema).await?;
    for f in functions {
        model.functions.insert(f.name.clone(), f);
    }
    for p in procedures {
        model.procedures.insert(p.name.clone(), p);
    }
    for trg in introspect_triggers(client, schema).await? {
        model.triggers.insert(trg.name.clone(), trg);
    }
    for ext in introspect_extensions(client).await? {
        model.extensions.insert(ext.name.clone(), ext);
    }
    model.schemas.insert(
        schema.to_string(),
        SchemaDefinition { name: schema.to_string() },
    );

    Ok(model)
}

async fn introspect_tables(client: &Client, schema: &str) -> Result<Vec<Table>> {
    let table_rows = client
        .query(
            "SELECT table_name FROM information_schema.tables
             WHERE table_schema = $1 AND table_type = 'BASE TABLE'
             ORDER BY table_name",
            &[&schema],
        )
        .await?;

    let mut tables = Vec::new();
    for row in &table_rows {
        let name: String = row.get(0);
        let mut table = Table::new(canonicalize_identifier(&name));
        table.schema = Some(schema.to_string());

        let col_rows = client
            .query(
                "SELECT column_name, data_type, udt_name, character_maximum_length,
                        numeric_precision, numeric_scale, is_nullable, column_default,
                        is_generated, generation_expression
                 FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[&schema, &name],
            )
            .await?;

        for r in &col_rows {
            let col_name: String = r.get(0);
            let data_type: String = r.get(1);
            let udt_name: String = r.get(2);
            let max_len: Option<i32> = r.get(3);
            let precision: Option<i32> = r.get(4);
            let scale: Option<i32> = r.get(5);
            let nullable: String = r.get(6);
            let default: Option<String> = r.get(7);
            let is_generated: String = r.get(8);
            let generation_expr: Option<String> = r.get(9);

            let type_str = render_type(&data_type, &udt_name, max_len, precision, scale);
            let canonical = parse_type(&type_str).to_string();

            let mut column = Column::new(canonicalize_identifier(&col_name), canonical.clone());
            column.nullable = nullable == "YES";

            if is_generated == "ALWAYS" {
                column.generated = Some(crate::model::Generated {
                    always: true,
                    expression: generation_expr.unwrap_or_default(),
                    stored: true,
                });
            } else if let Some(d) = default {
                column.default = Some(canonicalize_default(&d, &canonical));
            }

            table.columns.push(column);
        }

        let constraint_rows = client
            .query(
                "SELECT c.conname, c.contype, pg_get_constraintdef(c.oid)
                 FROM pg_constraint c
                 JOIN pg_class t ON t.oid = c.conrelid
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 WHERE n.nspname = $1 AND t.relname = $2
                 ORDER BY c.conname",
                &[&schema, &name],
            )
            .await?;

        for r in &constraint_rows {
            let cname: String = r.get(0);
            let ctype: i8 = r.get(1);
            let def: String = r.get(2);
            let ctype = ctype as u8 as char;
            match ctype {
                'p' => {
                    table.primary_key = Some(PrimaryKey {
                        name: canonicalize_identifier(&cname),
                        columns: extract_column_list(&def),
                    });
                }
                'u' => {
                    table.uniques.push(UniqueConstraint {
                        name: canonicalize_identifier(&cname),
                        columns: extract_column_list(&def),
                        deferrable: def.to_uppercase().contains("DEFERRABLE")
                            && !def.to_uppercase().contains("NOT DEFERRABLE"),
                        initially_deferred: def.to_uppercase().contains("INITIALLY DEFERRED"),
                    });
                }
                'c' => {
                    table.checks.push(CheckConstraint {
                        name: canonicalize_identifier(&cname),
                        expression: extract_check_expression(&def),
                    });
                }
                'f' => {
                    table.foreign_keys.push(parse_foreign_key_def(&cname, &def));
                }
                _ => {}
            }
        }

        let index_rows = client
            .query(
                "SELECT i.relname, pg_get_indexdef(ix.indexrelid), ix.indisunique,
                        ix.indisprimary, am.amname, i.reloptions, ts.spcname
                 FROM pg_index ix
                 JOIN pg_class i ON i.oid = ix.indexrelid
                 JOIN pg_class t ON t.oid = ix.indrelid
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 JOIN pg_am am ON am.oid = i.relam
                 LEFT JOIN pg_tablespace ts ON ts.oid = i.reltablespace
                 WHERE n.nspname = $1 AND t.relname = $2
                 ORDER BY i.relname",
                &[&schema, &name],
            )
            .await?;

        for r in &index_rows {
            let idx_name: String = r.get(0);
            let def: String = r.get(1);
            let is_unique: bool = r.get(2);
            let is_primary: bool = r.get(3);
            let am: String = r.get(4);
            let reloptions: Option<Vec<String>> = r.get(5);
            let tablespace: Option<String> = r.get(6);

            let owner = if is_primary {
                IndexOwner::Primary
            } else if is_unique
                && table
                    .uniques
                    .iter()
                    .any(|u| u.name == canonicalize_identifier(&idx_name))
            {
                IndexOwner::Unique
            } else {
                IndexOwner::None
            };
            if owner != IndexOwner::None {
                // Indexes backing PK/UNIQUE constraints are not surfaced independently.
                continue;
            }

            table.indexes.push(Index {
                name: canonicalize_identifier(&idx_name),
                table: table.name.clone(),
                columns: extract_index_columns(&def),
                expression: extract_index_expression(&def),
                method: parse_index_method(&am),
                unique: is_unique,
                concurrent: false,
                predicate: extract_where_clause(&def),
                storage_params: parse_reloptions(reloptions),
                tablespace,
                owner,
            });
        }

        tables.push(table);
    }

    Ok(tables)
}

fn render_type(
    data_type: &str,
    udt_name: &str,
    max_len: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    let base = if data_type.eq_ignore_ascii_case("USER-DEFINED") || data_type.eq_ignore_ascii_case("ARRAY") {
        udt_name.to_string()
    } else {
        data_type.to_string()
    };
    if let Some(len) = max_len {
        format!("{}({})", base, len)
    } else if let (Some(p), Some(s)) = (precision, scale) {
        if base.eq_ignore_ascii_case("numeric") && (p, s) != (0, 0) {
            format!("{}({},{})", base, p, s)
        } else {
            base
        }
    } else {
        base
    }
}

fn extract_column_list(def: &str) -> Vec<String> {
    def.find('(')
        .and_then(|open| def[open..].find(')').map(|close| (open, close)))
        .map(|(open, close)| {
            def[open + 1..open + close]
                .split(',')
                .map(|c| canonicalize_identifier(c.trim()))
                .collect()
        })
        .unwrap_or_default()
}

fn extract_check_expression(def: &str) -> String {
    let def = def.strip_prefix("CHECK ").unwrap_or(def).trim();
    let inner = def.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(def);
    canonicalize_check_expression(inner)
}

fn parse_foreign_key_def(name: &str, def: &str) -> ForeignKey {
    // Format: FOREIGN KEY (cols) REFERENCES table(refcols) [ON DELETE x] [ON UPDATE y]
    let columns = def
        .find('(')
        .and_then(|open| def[open..].find(')').map(|close| (open, close)))
        .map(|(open, close)| {
            def[open + 1..open + close]
                .split(',')
                .map(|c| canonicalize_identifier(c.trim()))
                .collect()
        })
        .unwrap_or_default();

    let after_references = def.split("REFERENCES").nth(1).unwrap_or("").trim();
    let ref_table = after_references
        .split('(')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    let ref_columns = after_references
        .find('(')
        .and_then(|open| after_references[open..].find(')').map(|close| (open, close)))
        .map(|(open, close)| {
            after_references[open + 1..open + close]
                .split(',')
                .map(|c| canonicalize_identifier(c.trim()))
                .collect()
        })
        .unwrap_or_default();

    let on_delete = extract_action(def, "ON DELETE");
    let on_update = extract_action(def, "ON UPDATE");

    ForeignKey {
        name: canonicalize_identifier(name),
        columns,
        ref_table: canonicalize_identifier(&ref_table),
        ref_columns,
        on_delete,
        on_update,
    }
}

fn extract_action(def: &str, keyword: &str) -> ReferentialAction {
    let upper = def.to_uppercase();
    match upper.find(keyword) {
        Some(pos) => {
            let rest = upper[pos + keyword.len()..].trim_start();
            if rest.starts_with("CASCADE") {
                ReferentialAction::Cascade
            } else if rest.starts_with("RESTRICT") {
                ReferentialAction::Restrict
            } else if rest.starts_with("SET NULL") {
                ReferentialAction::SetNull
            } else if rest.starts_with("SET DEFAULT") {
                ReferentialAction::SetDefault
            } else {
                ReferentialAction::NoAction
            }
        }
        None => ReferentialAction::NoAction,
    }
}

fn parse_index_method(am: &str) -> IndexMethod {
    match am.to_lowercase().as_str() {
        "hash" => IndexMethod::Hash,
        "gin" => IndexMethod::Gin,
        "gist" => IndexMethod::Gist,
        "spgist" => IndexMethod::Spgist,
        "brin" => IndexMethod::Brin,
        _ => IndexMethod::Btree,
    }
}

fn extract_index_columns(def: &str) -> Vec<IndexColumn> {
    let open = match def.find('(') {
        Some(p) => p,
        None => return Vec::new(),
    };
    let rest = &def[open + 1..];
    let close = match find_matching_paren(rest) {
        Some(p) => p,
        None => return Vec::new(),
    };
    let body = &rest[..close];
    if body.contains('(') {
        // Expression index: handled by extract_index_expression instead.
        return Vec::new();
    }
    body.split(',')
        .map(|c| {
            let trimmed = c.trim();
            let descending = trimmed.to_uppercase().contains("DESC");
            let name = trimmed.split_whitespace().next().unwrap_or(trimmed);
            IndexColumn {
                name: canonicalize_identifier(name),
                descending,
                opclass: None,
            }
        })
        .collect()
}

fn extract_index_expression(def: &str) -> Option<String> {
    let open = def.find('(')?;
    let rest = &def[open + 1..];
    let close = find_matching_paren(rest)?;
    let body = rest[..close].trim();
    if body.contains('(') {
        Some(body.to_string())
    } else {
        None
    }
}

fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn extract_where_clause(def: &str) -> Option<String> {
    let upper = def.to_uppercase();
    upper
        .find(" WHERE ")
        .map(|pos| def[pos + 7..].trim().to_string())
}

/// Parse `pg_class.reloptions`, a text array of `"key=value"` entries, into
/// the same key/value map the declared-SQL `WITH (...)` parser produces.
fn parse_reloptions(reloptions: Option<Vec<String>>) -> BTreeMap<String, String> {
    reloptions
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            Some((key.trim().to_lowercase(), value.trim().to_string()))
        })
        .collect()
}

async fn introspect_views(client: &Client, schema: &str) -> Result<Vec<View>> {
    let mut views = Vec::new();

    let rows = client
        .query(
            "SELECT c.relname, pg_get_viewdef(c.oid, true)
             FROM pg_class c
             JOIN pg_namespace n ON n.oid = c.relnamespace
             WHERE n.nspname = $1 AND c.relkind = 'v'
             ORDER BY c.relname",
            &[&schema],
        )
        .await?;
    for r in &rows {
        let name: String = r.get(0);
        let def: String = r.get(1);
        views.push(View {
            name: canonicalize_identifier(&name),
            definition: normalize_ws(def.trim_end_matches(';').trim()),
            check_option: None,
            materialized: false,
            indexes: Vec::new(),
        });
    }

    let mat_rows = client
        .query(
            "SELECT c.relname, pg_get_viewdef(c.oid, true)
             FROM pg_class c
             JOIN pg_namespace n ON n.oid = c.relnamespace
             WHERE n.nspname = $1 AND c.relkind = 'm'
             ORDER BY c.relname",
            &[&schema],
        )
        .await?;
    for r in &mat_rows {
        let name: String = r.get(0);
        let def: String = r.get(1);
        views.push(View {
            name: canonicalize_identifier(&name),
            definition: normalize_ws(def.trim_end_matches(';').trim()),
            check_option: None,
            materialized: true,
            indexes: Vec::new(),
        });
    }

    Ok(views)
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn introspect_enums(client: &Client, schema: &str) -> Result<Vec<EnumType>> {
    let rows = client
        .query(
            "SELECT t.typname, array_agg(e.enumlabel ORDER BY e.enumsortorder)::text[]
             FROM pg_type t
             JOIN pg_enum e ON e.enumtypid = t.oid
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE n.nspname = $1
             GROUP BY t.typname
             ORDER BY t.typname",
            &[&schema],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|r| EnumType {
            name: canonicalize_identifier(&r.get::<_, String>(0)),
            values: r.get(1),
        })
        .collect())
}

async fn introspect_sequences(client: &Client, schema: &str) -> Result<Vec<Sequence>> {
    let rows = client
        .query(
            "SELECT s.sequencename, s.data_type, s.increment_by, s.min_value, s.max_value,
                    s.start_value, s.cache_size, s.cycle
             FROM pg_sequences s
             WHERE s.schemaname = $1
             ORDER BY s.sequencename",
            &[&schema],
        )
        .await?;

    let mut sequences = Vec::new();
    for r in &rows {
        let name: String = r.get(0);
        let owned_by_row = client
            .query_opt(
                "SELECT t.relname || '.' || a.attname
                 FROM pg_depend d
                 JOIN pg_class s ON s.oid = d.objid
                 JOIN pg_class t ON t.oid = d.refobjid
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = d.refobjsubid
                 JOIN pg_namespace n ON n.oid = s.relnamespace
                 WHERE s.relname = $1 AND n.nspname = $2 AND d.deptype = 'a'",
                &[&name, &schema],
            )
            .await?;

        sequences.push(Sequence {
            name: canonicalize_identifier(&name),
            data_type: r.get::<_, String>(1).to_uppercase(),
            increment: r.get(2),
            min_value: r.get(3),
            max_value: r.get(4),
            start: r.get(5),
            cache: r.get(6),
            cycle: r.get(7),
            owned_by: owned_by_row.map(|row| {
                let qualified: String = row.get(0);
                canonicalize_identifier(qualified.rsplit('.').next().unwrap_or(&qualified))
            }),
        });
    }
    Ok(sequences)
}

async fn introspect_routines(client: &Client, schema: &str) -> Result<(Vec<Routine>, Vec<Routine>)> {
    let rows = client
        .query(
            "SELECT p.proname, p.prokind, pg_get_functiondef(p.oid), l.lanname,
                    p.provolatile, p.proparallel, p.prosecdef, p.proisstrict,
                    p.procost, p.prorows, p.pronargs
             FROM pg_proc p
             JOIN pg_namespace n ON n.oid = p.pronamespace
             JOIN pg_language l ON l.oid = p.prolang
             WHERE n.nspname = $1 AND p.prokind IN ('f', 'p')
             ORDER BY p.proname",
            &[&schema],
        )
        .await?;

    let mut functions = Vec::new();
    let mut procedures = Vec::new();

    for r in &rows {
        let name: String = r.get(0);
        let kind: i8 = r.get(1);
        let def: String = r.get(2);
        let language: String = r.get(3);
        let volatile: i8 = r.get(4);
        let parallel: i8 = r.get(5);
        let security_definer: bool = r.get(6);
        let strict: bool = r.get(7);
        let cost: f64 = r.get(8);
        let rows_est: f64 = r.get(9);

        let is_procedure = (kind as u8 as char) == 'p';
        let volatility = match volatile as u8 as char {
            'i' => Volatility::Immutable,
            's' => Volatility::Stable,
            _ => Volatility::Volatile,
        };
        let parallel = match parallel as u8 as char {
            's' => Parallel::Safe,
            'r' => Parallel::Restricted,
            _ => Parallel::Unsafe,
        };

        let return_type = if is_procedure {
            None
        } else {
            extract_returns(&def)
        };
        let body = extract_body(&def);
        let parameters = extract_parameters(&def);

        let routine = Routine {
            name: canonicalize_identifier(&name),
            parameters,
            return_type,
            language: language.to_lowercase(),
            body,
            volatility,
            parallel,
            security_definer,
            strict,
            cost: Some(cost),
            rows: if is_procedure { None } else { Some(rows_est) },
            is_procedure,
        };

        if is_procedure {
            procedures.push(routine);
        } else {
            functions.push(routine);
        }
    }

    Ok((functions, procedures))
}

fn extract_returns(def: &str) -> Option<String> {
    let upper = def.to_uppercase();
    let pos = upper.find("RETURNS ")?;
    let rest = &def[pos + 8..];
    let end = rest.find(|c: char| c == '\n' || c.is_whitespace() && false).unwrap_or(rest.len());
    let _ = end;
    let word = rest.split_whitespace().next()?;
    Some(parse_type(word).to_string())
}

fn extract_body(def: &str) -> String {
    if let Some(start) = def.find("$$") {
        if let Some(rel_end) = def[start + 2..].find("$$") {
            return normalize_ws(def[start + 2..start + 2 + rel_end].trim());
        }
    }
    String::new()
}

fn extract_parameters(def: &str) -> Vec<Parameter> {
    let open = match def.find('(') {
        Some(p) => p,
        None => return Vec::new(),
    };
    let rest = &def[open + 1..];
    let close = match find_matching_paren(rest) {
        Some(p) => p,
        None => return Vec::new(),
    };
    let body = &rest[..close];
    if body.trim().is_empty() {
        return Vec::new();
    }
    split_top_level(body)
        .into_iter()
        .map(|raw| {
            let trimmed = raw.trim();
            let upper = trimmed.to_uppercase();
            let (mode, remainder) = if upper.starts_with("OUT ") {
                (ParamMode::Out, &trimmed[4..])
            } else if upper.starts_with("INOUT ") {
                (ParamMode::InOut, &trimmed[6..])
            } else if upper.starts_with("VARIADIC ") {
                (ParamMode::Variadic, &trimmed[9..])
            } else if upper.starts_with("IN ") {
                (ParamMode::In, &trimmed[3..])
            } else {
                (ParamMode::In, trimmed)
            };
            let mut parts = remainder.trim().splitn(2, char::is_whitespace);
            let first = parts.next().unwrap_or("").trim();
            let rest = parts.next().unwrap_or("").trim();
            let (name, type_part) = if rest.is_empty() {
                (None, first.to_string())
            } else {
                (Some(canonicalize_identifier(first)), rest.to_string())
            };
            Parameter {
                name,
                canonical_type: parse_type(&type_part).to_string(),
                mode,
                default: None,
            }
        })
        .collect()
}

fn split_top_level(s: &str) -> Vec<String> {
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

async fn introspect_triggers(client: &Client, schema: &str) -> Result<Vec<Trigger>> {
    let rows = client
        .query(
            "SELECT t.tgname, c.relname, pg_get_triggerdef(t.oid)
             FROM pg_trigger t
             JOIN pg_class c ON c.oid = t.tgrelid
             JOIN pg_namespace n ON n.oid = c.relnamespace
             WHERE n.nspname = $1 AND NOT t.tgisinternal
             ORDER BY t.tgname",
            &[&schema],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|r| {
            let name: String = r.get(0);
            let table: String = r.get(1);
            let def: String = r.get(2);
            parse_trigger_def(&name, &table, &def)
        })
        .collect())
}

fn parse_trigger_def(name: &str, table: &str, def: &str) -> Trigger {
    let upper = def.to_uppercase();
    let timing = if upper.contains(" BEFORE ") {
        TriggerTiming::Before
    } else if upper.contains(" INSTEAD OF ") {
        TriggerTiming::InsteadOf
    } else {
        TriggerTiming::After
    };
    let for_each = if upper.contains("FOR EACH ROW") {
        TriggerForEach::Row
    } else {
        TriggerForEach::Statement
    };
    let mut events = BTreeSet::new();
    if upper.contains("INSERT") {
        events.insert(TriggerEvent::Insert);
    }
    if upper.contains("UPDATE") {
        events.insert(TriggerEvent::Update);
    }
    if upper.contains("DELETE") {
        events.insert(TriggerEvent::Delete);
    }
    if upper.contains("TRUNCATE") {
        events.insert(TriggerEvent::Truncate);
    }

    let when = upper.find("WHEN (").map(|pos| {
        let rest = &def[pos + 6..];
        let close = find_matching_paren(rest).unwrap_or(rest.len());
        rest[..close].trim().to_string()
    });

    let (function, function_args) = match def.rfind("EXECUTE FUNCTION").or_else(|| def.rfind("EXECUTE PROCEDURE")) {
        Some(pos) => {
            let rest = &def[pos..];
            let open = rest.find('(').unwrap_or(rest.len());
            let fn_name = rest[rest.find(' ').unwrap_or(0)..open]
                .trim()
                .rsplit('.')
                .next()
                .unwrap_or("")
                .to_string();
            let close = rest[open..]
                .find(')')
                .map(|c| open + c)
                .unwrap_or(rest.len());
            let args = rest[open + 1..close]
                .split(',')
                .map(|a| a.trim().trim_matches('\'').to_string())
                .filter(|a| !a.is_empty())
                .collect();
            (fn_name, args)
        }
        None => (String::new(), Vec::new()),
    };

    Trigger {
        name: canonicalize_identifier(name),
        table: canonicalize_identifier(table),
        timing,
        events,
        for_each,
        when,
        function: canonicalize_identifier(&function),
        function_args,
    }
}

async fn introspect_extensions(client: &Client) -> Result<Vec<Extension>> {
    let rows = client
        .query(
            "SELECT extname, extversion FROM pg_extension WHERE extname != 'plpgsql' ORDER BY extname",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|r| Extension {
            name: r.get(0),
            version: Some(r.get(1)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_column_list() {
        assert_eq!(
            extract_column_list("PRIMARY KEY (id, tenant_id)"),
            vec!["id", "tenant_id"]
        );
    }

    #[test]
    fn test_extract_check_expression() {
        assert_eq!(extract_check_expression("CHECK ((age >= 0))"), "age >= 0");
    }

    #[test]
    fn test_parse_foreign_key_def() {
        let fk = parse_foreign_key_def(
            "fk_orders_user_id",
            "FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE",
        );
        assert_eq!(fk.ref_table, "users");
        assert_eq!(fk.columns, vec!["user_id"]);
        assert_eq!(fk.on_delete, ReferentialAction::Cascade);
    }

    #[test]
    fn test_extract_index_columns_plain() {
        let cols = extract_index_columns("CREATE INDEX idx ON users USING btree (email)");
        assert_eq!(cols[0].name, "email");
    }

    #[test]
    fn test_extract_index_expression() {
        let expr = extract_index_expression("CREATE INDEX idx ON users USING btree (lower(email))");
        assert_eq!(expr.as_deref(), Some("lower(email)"));
    }

    #[test]
    fn test_extract_where_clause() {
        let pred = extract_where_clause(
            "CREATE INDEX idx ON t USING btree (a) WHERE deleted_at IS NULL",
        );
        assert_eq!(pred.as_deref(), Some("deleted_at IS NULL"));
    }

    #[test]
    fn test_parse_reloptions() {
        let params = parse_reloptions(Some(vec!["fillfactor=70".to_string(), "fastupdate=off".to_string()]));
        assert_eq!(params.get("fillfactor").map(String::as_str), Some("70"));
        assert_eq!(params.get("fastupdate").map(String::as_str), Some("off"));
    }

    #[test]
    fn test_parse_reloptions_none_is_empty() {
        assert!(parse_reloptions(None).is_empty());
    }
}
