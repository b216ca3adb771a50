//! Recordset commands.

use super::{arg_text, CommandContext, CommandOutcome};
use crate::error::{SneaqlError, SneaqlResult};
use crate::expression::ExpressionEvaluator;
use crate::recordset::{RecordCondition, RecordsetStore};
use crate::value::{Record, Value};

/// `recordset name`: store the rows returned by the statement body.
///
/// Booleans become 0/1, timestamps become text and NULL becomes an empty
/// string so that database rows fit the recordset field types.
pub(super) fn recordset_from_query(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    let name = arg_text(args, 0)?;
    let rows = ctx.database()?.query_rows(ctx.statement)?;
    let rows: Vec<Record> = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(field, value)| {
                    let value = match value {
                        Value::Boolean(b) => Value::Integer(i64::from(b)),
                        Value::Timestamp(_) => Value::String(value.to_string()),
                        Value::Null => Value::String(String::new()),
                        other => other,
                    };
                    (field, value)
                })
                .collect()
        })
        .collect();
    tracing::info!(recordset = %name, records = rows.len(), "Storing query results as recordset");
    ctx.recordsets.store(&name, rows)?;
    Ok(None)
}

/// `remove_recordset name`
pub(super) fn remove_recordset(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    let name = arg_text(args, 0)?;
    if ctx.recordsets.remove(&name) {
        tracing::info!(recordset = %name, "Removed recordset");
    }
    Ok(None)
}

/// `iterate rs [include|exclude field op expr]...`
pub(super) fn validate_iterate_args(args: &[String]) -> bool {
    let Some((recordset, conditions)) = args.split_first() else {
        return false;
    };
    if !RecordsetStore::valid_recordset_name(recordset) || conditions.len() % 4 != 0 {
        return false;
    }
    conditions.chunks(4).all(|group| {
        matches!(group[0].to_lowercase().as_str(), "include" | "exclude")
            && RecordsetStore::valid_recordset_name(&group[1])
            && ExpressionEvaluator::valid_operator(&group[2])
            && ExpressionEvaluator::valid_expression_reference(&group[3])
    })
}

/// Replace `:rs.field` references with the record's values, longest field
/// name first.
pub(crate) fn substitute_record(statement: &str, recordset: &str, record: &Record) -> String {
    record
        .iter()
        .rev()
        .fold(statement.to_string(), |sql, (field, value)| {
            sql.replace(&format!(":{}.{}", recordset, field), &value.to_string())
        })
}

/// Run the statement body once per matching record.
///
/// A failing record is left in the error channel as the last iterated
/// record and stops the iteration.
pub(super) fn iterate(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    let name = arg_text(args, 0)?;
    let conditions = RecordCondition::parse_all(&args[1..])?;
    let records = ctx.recordsets.get(&name)?.to_vec();
    let db = ctx.database()?;

    tracing::info!(recordset = %name, records = records.len(), "Iterating recordset");
    for (n, record) in records.iter().enumerate() {
        if !RecordsetStore::record_matches(&*ctx.evaluator, record, &conditions)? {
            continue;
        }
        tracing::debug!(record = n + 1, of = records.len(), "Iterating record");

        let sql = substitute_record(ctx.statement, &name, record);
        match db.execute(&sql) {
            Ok(rows) => ctx.set_rows_affected(rows)?,
            Err(e) => {
                ctx.errors.set_last_iterated_record(record.clone());
                return Err(e);
            }
        }
    }
    Ok(None)
}

/// `rs_from_local_dir name glob`: one `{path_name}` record per matching path.
pub(super) fn rs_from_local_dir(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    let name = arg_text(args, 0)?;
    let pattern = arg_text(args, 1)?;
    let records = glob_records(&pattern)?;
    tracing::debug!(recordset = %name, records = records.len(), pattern = %pattern, "Adding paths as recordset");
    ctx.recordsets.store(&name, records)?;
    Ok(None)
}

fn glob_records(pattern: &str) -> SneaqlResult<Vec<Record>> {
    let paths = glob::glob(pattern)
        .map_err(|e| SneaqlError::ExpressionEvaluation(format!("invalid glob '{}': {}", pattern, e)))?;
    paths
        .map(|entry| {
            let path = entry.map_err(|e| SneaqlError::Io(e.to_string()))?;
            Ok(Record::from([(
                "path_name".to_string(),
                Value::String(path.display().to_string()),
            )]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Harness;
    use crate::commands::{BuiltinCommand, ROWS_AFFECTED_VARIABLE};
    use crate::value::record;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn setup_animals(h: &mut Harness) {
        h.run(
            BuiltinCommand::Execute,
            &[],
            "create table animals (name varchar, legs integer);",
        )
        .unwrap();
        h.run(
            BuiltinCommand::Execute,
            &[],
            "insert into animals values ('turkey', 2), ('cow', 4), ('turtle', 4);",
        )
        .unwrap();
        h.run(BuiltinCommand::Execute, &[], "create table seen (name varchar);")
            .unwrap();
    }

    #[test]
    fn test_validate_iterate_args() {
        assert!(validate_iterate_args(&strings(&["rs"])));
        assert!(validate_iterate_args(&strings(&[
            "rs", "include", "name", "like", "'turk%'"
        ])));
        assert!(validate_iterate_args(&strings(&[
            "rs", "INCLUDE", "legs", ">", "2", "exclude", "name", "=", "'cow'"
        ])));
        assert!(!validate_iterate_args(&[]));
        assert!(!validate_iterate_args(&strings(&["rs", "include", "name"])));
        assert!(!validate_iterate_args(&strings(&["rs", "keep", "name", "=", "1"])));
        assert!(!validate_iterate_args(&strings(&["rs", "include", "name", "==", "1"])));
    }

    #[test]
    fn test_substitute_record_longest_first() {
        let r = record([("id", Value::Integer(1)), ("id_name", Value::from("x"))]);
        assert_eq!(
            substitute_record("select :rs.id_name, :rs.id;", "rs", &r),
            "select x, 1;"
        );
    }

    #[test]
    fn test_recordset_and_iterate() {
        let mut h = Harness::new();
        setup_animals(&mut h);

        h.run(
            BuiltinCommand::Recordset,
            &["animals"],
            "select name, legs from animals order by name;",
        )
        .unwrap();
        assert_eq!(h.recordsets.get("animals").unwrap().len(), 3);

        h.run(
            BuiltinCommand::Iterate,
            &["animals", "include", "legs", "=", "4", "exclude", "name", "like", "'turt%'"],
            "insert into seen values (':animals.name');",
        )
        .unwrap();
        assert!(!h.errors.has_pending());
        assert_eq!(h.var(ROWS_AFFECTED_VARIABLE), Some(Value::Integer(1)));

        let seen = h.db.query_rows("select name from seen").unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["name"], Value::from("cow"));
    }

    #[test]
    fn test_recordset_converts_booleans() {
        let mut h = Harness::new();
        h.run(
            BuiltinCommand::Recordset,
            &["flags"],
            "select true as flag, TIMESTAMP '2020-01-02 03:04:05' as ts;",
        )
        .unwrap();
        let rs = h.recordsets.get("flags").unwrap();
        assert_eq!(rs[0]["flag"], Value::Integer(1));
        assert_eq!(rs[0]["ts"], Value::from("2020-01-02 03:04:05"));
    }

    #[test]
    fn test_recordset_nulls_become_empty_strings() {
        let mut h = Harness::new();
        h.run(
            BuiltinCommand::Execute,
            &[],
            "create table notes (name varchar, note varchar);",
        )
        .unwrap();
        h.run(
            BuiltinCommand::Execute,
            &[],
            "insert into notes values ('cow', null), ('turtle', 'slow');",
        )
        .unwrap();
        h.run(
            BuiltinCommand::Recordset,
            &["rs"],
            "select name, note from notes order by name;",
        )
        .unwrap();
        assert!(h.errors.pending_error().is_none());

        let rs = h.recordsets.get("rs").unwrap();
        assert_eq!(rs[0]["note"], Value::from(""));
        assert_eq!(rs[1]["note"], Value::from("slow"));
    }

    #[test]
    fn test_store_still_rejects_null_values() {
        let mut store = RecordsetStore::new();
        assert!(matches!(
            store.store("rs", vec![record([("x", Value::Null)])]),
            Err(SneaqlError::InvalidRecordset(_))
        ));
    }

    #[test]
    fn test_iterate_failure_records_last_record() {
        let mut h = Harness::new();
        setup_animals(&mut h);
        h.run(
            BuiltinCommand::Execute,
            &[],
            "create table strict (name varchar check (name != 'turkey'));",
        )
        .unwrap();
        h.run(BuiltinCommand::Recordset, &["animals"], "select name from animals order by name;")
            .unwrap();

        h.run(
            BuiltinCommand::Iterate,
            &["animals"],
            "insert into strict values (':animals.name');",
        )
        .unwrap();

        assert!(matches!(h.errors.pending_error(), Some(SneaqlError::Database(_))));
        let last = h.errors.last_iterated_record().unwrap();
        assert_eq!(last["name"], Value::from("turkey"));

        // iteration stopped at the failing record
        let inserted = h.db.query_rows("select name from strict").unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0]["name"], Value::from("cow"));
    }

    #[test]
    fn test_iterate_missing_recordset() {
        let mut h = Harness::new();
        h.run(BuiltinCommand::Iterate, &["nothing"], "select 1;").unwrap();
        assert!(matches!(
            h.errors.pending_error(),
            Some(SneaqlError::RecordsetNotFound(_))
        ));
    }

    #[test]
    fn test_remove_recordset() {
        let mut h = Harness::new();
        h.run(BuiltinCommand::Recordset, &["rs"], "select 1 as x;").unwrap();
        h.run(BuiltinCommand::RemoveRecordset, &["rs"], "").unwrap();
        assert!(!h.recordsets.contains("rs"));
        h.run(BuiltinCommand::RemoveRecordset, &["rs"], "").unwrap();
        assert!(!h.errors.has_pending());
    }

    #[test]
    fn test_rs_from_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "1").unwrap();
        std::fs::write(dir.path().join("b.csv"), "2").unwrap();
        std::fs::write(dir.path().join("c.txt"), "3").unwrap();

        let mut h = Harness::new();
        let pattern = format!("'{}/*.csv'", dir.path().display());
        h.run(BuiltinCommand::RsFromLocalDir, &["files", &pattern], "")
            .unwrap();

        let rs = h.recordsets.get("files").unwrap();
        assert_eq!(rs.len(), 2);
        assert!(rs[0]["path_name"].to_string().ends_with("a.csv"));
        assert!(rs[1]["path_name"].to_string().ends_with("b.csv"));
    }
}
