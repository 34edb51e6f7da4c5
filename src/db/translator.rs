//! Placeholder dialect translation.
//!
//! Callers may write positional markers as `%s` or `?` (freely mixed) or
//! named markers as `:name`. Before execution the SQL text is rewritten into
//! the marker syntax of the target driver and the parameter collection is
//! reshaped to match. This is a plain text scan: quoted strings, quoted
//! identifiers, comments, dollar-quoted bodies and `::` casts are skipped, and
//! nothing else about the SQL is interpreted.

use crate::error::{DbError, DbResult};
use crate::models::{Params, SqlValue};
use std::borrow::Cow;
use std::fmt;

/// Marker syntax a driver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `?` (MySQL, SQLite)
    Question,
    /// `%s` (pyformat-style drivers)
    Format,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
    /// `:name` with mapping parameters (Oracle)
    Named,
}

impl Dialect {
    pub fn takes_mapping(&self) -> bool {
        matches!(self, Self::Named)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Question => "question-mark",
            Self::Format => "format",
            Self::Numbered => "numbered",
            Self::Named => "named-colon",
        };
        f.write_str(name)
    }
}

/// Lexical rules for quotes and comments, which differ by vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlSyntax {
    /// Quotes escape only by doubling; comments are `--` and `/* */`.
    #[default]
    Standard,
    /// Also `\'`-style backslash escapes in string literals and `#` line
    /// comments.
    MySql,
}

/// Parameters reshaped for the driver's execute call.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BoundParams {
    /// Execute without a parameter argument.
    #[default]
    None,
    Positional(Vec<SqlValue>),
    Named(Vec<(String, SqlValue)>),
}

impl BoundParams {
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(values) => values.len(),
            Self::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A statement ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement<'a> {
    pub sql: Cow<'a, str>,
    pub params: BoundParams,
}

#[derive(Debug, Clone, PartialEq)]
enum Marker<'a> {
    Positional,
    Named(&'a str),
    /// `%%` outside quotes.
    PercentEscape,
}

#[derive(Debug, Clone, PartialEq)]
struct Placeholder<'a> {
    start: usize,
    end: usize,
    marker: Marker<'a>,
}

/// Rewrite `sql` for `dialect` and reshape `params` to match, using
/// standard quoting rules.
///
/// With no parameter argument the SQL is returned untouched.
pub fn translate<'a>(
    sql: &'a str,
    params: Option<&Params>,
    dialect: Dialect,
) -> DbResult<Statement<'a>> {
    translate_with(sql, params, dialect, SqlSyntax::Standard)
}

/// [`translate`] with the vendor's quote and comment rules.
pub fn translate_with<'a>(
    sql: &'a str,
    params: Option<&Params>,
    dialect: Dialect,
    syntax: SqlSyntax,
) -> DbResult<Statement<'a>> {
    let Some(params) = params else {
        return Ok(Statement {
            sql: Cow::Borrowed(sql),
            params: BoundParams::None,
        });
    };

    if let Params::Scalar(value) = params {
        return Err(DbError::invalid_argument_type(format!(
            "parameters must be a sequence or mapping, got bare {} value {value}; wrap it in a tuple",
            value.type_name()
        )));
    }

    let placeholders = scan(sql, syntax);
    let positional = placeholders
        .iter()
        .filter(|p| p.marker == Marker::Positional)
        .count();
    let named = placeholders
        .iter()
        .filter(|p| matches!(p.marker, Marker::Named(_)))
        .count();

    if positional > 0 && named > 0 {
        return Err(DbError::parameter_mismatch(format!(
            "statement mixes {positional} positional and {named} named placeholder(s)"
        )));
    }

    if positional == 0 && named == 0 {
        if !params.is_empty() {
            return Err(DbError::parameter_mismatch(format!(
                "statement has no placeholders but {} parameter(s) were supplied",
                params.len()
            )));
        }
        return Ok(Statement {
            sql: Cow::Borrowed(sql),
            params: BoundParams::None,
        });
    }

    if positional > 0 {
        let Params::Positional(values) = params else {
            return Err(DbError::invalid_argument_type(format!(
                "positional placeholders need a sequence of parameters, got a {}",
                params.shape()
            )));
        };
        if dialect.takes_mapping() {
            return Err(DbError::invalid_argument_type(format!(
                "the {dialect} driver binds by name; use :name placeholders with a mapping"
            )));
        }
        if values.len() != positional {
            return Err(DbError::parameter_mismatch(format!(
                "statement has {positional} placeholder(s) but {} parameter(s) were supplied",
                values.len()
            )));
        }
        let sql = rewrite(sql, &placeholders, dialect, |_, index| {
            Ok(positional_marker(dialect, index))
        })?;
        return Ok(Statement {
            sql: Cow::Owned(sql),
            params: BoundParams::Positional(values.clone()),
        });
    }

    let Params::Named(_) = params else {
        return Err(DbError::invalid_argument_type(format!(
            "named placeholders need a mapping of parameters, got a {}",
            params.shape()
        )));
    };

    if dialect.takes_mapping() {
        let mut bound: Vec<(String, SqlValue)> = Vec::new();
        for placeholder in &placeholders {
            if let Marker::Named(name) = placeholder.marker {
                if bound.iter().any(|(k, _)| k == name) {
                    continue;
                }
                bound.push((name.to_string(), lookup(params, name)?.clone()));
            }
        }
        let sql = rewrite(sql, &placeholders, dialect, |name, _| {
            Ok(format!(":{}", name.unwrap_or_default()))
        })?;
        return Ok(Statement {
            sql: Cow::Owned(sql),
            params: BoundParams::Named(bound),
        });
    }

    let mut values: Vec<SqlValue> = Vec::new();
    let mut numbered: Vec<&str> = Vec::new();
    let sql = rewrite(sql, &placeholders, dialect, |name, _| {
        let name = name.unwrap_or_default();
        let value = lookup(params, name)?;
        if dialect == Dialect::Numbered {
            if let Some(pos) = numbered.iter().position(|n| *n == name) {
                return Ok(format!("${}", pos + 1));
            }
            numbered.push(name);
        }
        values.push(value.clone());
        Ok(positional_marker(dialect, values.len() - 1))
    })?;
    Ok(Statement {
        sql: Cow::Owned(sql),
        params: BoundParams::Positional(values),
    })
}

fn lookup<'p>(params: &'p Params, name: &str) -> DbResult<&'p SqlValue> {
    params
        .get_named(name)
        .ok_or_else(|| DbError::parameter_mismatch(format!("no value supplied for :{name}")))
}

fn positional_marker(dialect: Dialect, index: usize) -> String {
    match dialect {
        Dialect::Question => "?".to_string(),
        Dialect::Format => "%s".to_string(),
        Dialect::Numbered => format!("${}", index + 1),
        // Unreachable for positional input; named drivers reject it earlier.
        Dialect::Named => format!(":{}", index + 1),
    }
}

/// Rebuild `sql`, replacing each placeholder with `marker(name, index)`.
///
/// `index` counts value markers only, starting at zero.
fn rewrite<'a, F>(
    sql: &str,
    placeholders: &[Placeholder<'a>],
    dialect: Dialect,
    mut marker: F,
) -> DbResult<String>
where
    F: FnMut(Option<&'a str>, usize) -> DbResult<String>,
{
    let mut out = String::with_capacity(sql.len() + placeholders.len() * 2);
    let mut last = 0;
    let mut index = 0;
    for placeholder in placeholders {
        out.push_str(&sql[last..placeholder.start]);
        match placeholder.marker {
            Marker::PercentEscape => {
                out.push_str(if dialect == Dialect::Format { "%%" } else { "%" });
            }
            Marker::Positional => {
                out.push_str(&marker(None, index)?);
                index += 1;
            }
            Marker::Named(name) => {
                out.push_str(&marker(Some(name), index)?);
                index += 1;
            }
        }
        last = placeholder.end;
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

/// Find every marker outside quotes and comments, in text order.
fn scan(sql: &str, syntax: SqlSyntax) -> Vec<Placeholder<'_>> {
    let mysql = syntax == SqlSyntax::MySql;
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(bytes, i, mysql),
            b'`' => i = skip_quoted(bytes, i, false),
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_line(bytes, i),
            b'#' if mysql => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block(bytes, i),
            b'$' => i = skip_dollar_quoted(sql, i),
            b'?' => {
                found.push(Placeholder {
                    start: i,
                    end: i + 1,
                    marker: Marker::Positional,
                });
                i += 1;
            }
            b'%' => match bytes.get(i + 1) {
                Some(b's') => {
                    found.push(Placeholder {
                        start: i,
                        end: i + 2,
                        marker: Marker::Positional,
                    });
                    i += 2;
                }
                Some(b'%') => {
                    found.push(Placeholder {
                        start: i,
                        end: i + 2,
                        marker: Marker::PercentEscape,
                    });
                    i += 2;
                }
                _ => i += 1,
            },
            b':' => {
                if bytes.get(i + 1) == Some(&b':') {
                    // cast
                    i += 2;
                    continue;
                }
                let start = i + 1;
                let end = ident_end(bytes, start);
                if end > start && !bytes[start].is_ascii_digit() {
                    found.push(Placeholder {
                        start: i,
                        end,
                        marker: Marker::Named(&sql[start..end]),
                    });
                    i = end;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    found
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    end
}

/// Skip a quoted run; a doubled quote character is an escape, and so is a
/// backslash pair when `backslash` is set.
fn skip_quoted(bytes: &[u8], start: usize, backslash: bool) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if backslash && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |p| start + p + 1)
}

fn skip_block(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |p| start + 2 + p + 2)
}

/// Skip `$tag$ ... $tag$`; any other `$` is ordinary text.
fn skip_dollar_quoted(sql: &str, start: usize) -> usize {
    let bytes = sql.as_bytes();
    let tag_end = ident_end(bytes, start + 1);
    if bytes.get(tag_end) != Some(&b'$')
        || bytes.get(start + 1).is_some_and(|b| b.is_ascii_digit())
    {
        return start + 1;
    }
    let tag = &sql[start..=tag_end];
    let body = tag_end + 1;
    sql[body..]
        .find(tag)
        .map_or(sql.len(), |p| body + p + tag.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn snake() -> Params {
        ("snake",).into()
    }

    #[test]
    fn test_no_params_leaves_sql_untouched() {
        let sql = "select * from animal where name = ?";
        let stmt = translate(sql, None, Dialect::Numbered).unwrap();
        assert!(matches!(stmt.sql, Cow::Borrowed(_)));
        assert_eq!(stmt.sql, sql);
        assert_eq!(stmt.params, BoundParams::None);
    }

    #[test]
    fn test_format_and_question_markers_agree() {
        let a = translate("select * from animal where name = %s", Some(&snake()), Dialect::Question)
            .unwrap();
        let b = translate("select * from animal where name = ?", Some(&snake()), Dialect::Question)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.sql, "select * from animal where name = ?");
    }

    #[test]
    fn test_mixed_positional_markers() {
        let params: Params = ("coily", "reptile").into();
        let stmt = translate(
            "UPDATE animal SET name = ? WHERE category = %s",
            Some(&params),
            Dialect::Numbered,
        )
        .unwrap();
        assert_eq!(stmt.sql, "UPDATE animal SET name = $1 WHERE category = $2");
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_bare_scalar_rejected_for_every_marker() {
        for sql in [
            "select * from animal where name = %s",
            "select * from animal where name = ?",
        ] {
            let err = translate(sql, Some(&Params::scalar("snake")), Dialect::Question).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgumentType, "{sql}");
        }
    }

    #[test]
    fn test_quoted_markers_are_text() {
        let stmt = translate(
            "select '?', \"%s\", `:x` from t -- ?\n where a = ? /* :y */",
            Some(&(1,).into()),
            Dialect::Numbered,
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "select '?', \"%s\", `:x` from t -- ?\n where a = $1 /* :y */"
        );
    }

    #[test]
    fn test_mysql_backslash_escape_keeps_quote_open() {
        let sql = r"select * from animal where name = 'it\'s' and category = ?";
        let stmt =
            translate_with(sql, Some(&("reptile",).into()), Dialect::Question, SqlSyntax::MySql)
                .unwrap();
        assert_eq!(stmt.sql, sql);
        assert_eq!(stmt.params.len(), 1);

        let sql = r#"select "a\"?" from animal where name = %s"#;
        let stmt = translate_with(sql, Some(&snake()), Dialect::Question, SqlSyntax::MySql).unwrap();
        assert_eq!(stmt.sql, r#"select "a\"?" from animal where name = ?"#);
    }

    #[test]
    fn test_mysql_hash_comment() {
        let sql = "select * from animal # why?\n where category = ?";
        let stmt =
            translate_with(sql, Some(&("reptile",).into()), Dialect::Question, SqlSyntax::MySql)
                .unwrap();
        assert_eq!(stmt.params.len(), 1);
        assert_eq!(stmt.sql, sql);
    }

    #[test]
    fn test_standard_syntax_keeps_backslash_literal() {
        // SQLite and PostgreSQL treat a backslash as an ordinary character
        let stmt = translate(
            r"select * from animal where name = 'a\' and category = ?",
            Some(&("reptile",).into()),
            Dialect::Question,
        )
        .unwrap();
        assert_eq!(stmt.params.len(), 1);

        let err = translate("select 1 # ?", Some(&(1, 2).into()), Dialect::Question).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterMismatch);
    }

    #[test]
    fn test_cast_and_dollar_quote_are_not_markers() {
        let stmt = translate(
            "select $$ ? $$, a::text from t where b = :b",
            Some(&Params::named([("b", 1)])),
            Dialect::Numbered,
        )
        .unwrap();
        assert_eq!(stmt.sql, "select $$ ? $$, a::text from t where b = $1");
    }

    #[test]
    fn test_percent_escape() {
        let stmt = translate("select a %% 2 from t where b = %s", Some(&(1,).into()), Dialect::Question)
            .unwrap();
        assert_eq!(stmt.sql, "select a % 2 from t where b = ?");

        let stmt = translate("select a %% 2 from t where b = ?", Some(&(1,).into()), Dialect::Format)
            .unwrap();
        assert_eq!(stmt.sql, "select a %% 2 from t where b = %s");
    }

    #[test]
    fn test_named_to_numbered_reuses_index() {
        let params = Params::named([("name", "snake"), ("unused", "x")]);
        let stmt = translate(
            "select * from animal where name = :name or alias = :name",
            Some(&params),
            Dialect::Numbered,
        )
        .unwrap();
        assert_eq!(stmt.sql, "select * from animal where name = $1 or alias = $1");
        assert_eq!(
            stmt.params,
            BoundParams::Positional(vec![SqlValue::from("snake")])
        );
    }

    #[test]
    fn test_named_to_question_repeats_values() {
        let params = Params::named([("name", "snake")]);
        let stmt = translate(
            "select * from animal where name = :name or alias = :name",
            Some(&params),
            Dialect::Question,
        )
        .unwrap();
        assert_eq!(stmt.sql, "select * from animal where name = ? or alias = ?");
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_named_dialect_keeps_referenced_names() {
        let params = Params::named([("lklabelsys_oid", 5), ("carr_oid", 5), ("extra", 1)]);
        let stmt = translate(
            "select * from carr where carr.oid = :carr_oid and lk.oid = :lklabelsys_oid",
            Some(&params),
            Dialect::Named,
        )
        .unwrap();
        assert_eq!(
            stmt.params,
            BoundParams::Named(vec![
                ("carr_oid".to_string(), SqlValue::Int(5)),
                ("lklabelsys_oid".to_string(), SqlValue::Int(5)),
            ])
        );
    }

    #[test]
    fn test_named_dialect_rejects_positional_tuple() {
        let err = translate(
            "select * from carr where carr.oid = ? and lk.oid = ?",
            Some(&(5, 5).into()),
            Dialect::Named,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgumentType);
    }

    #[test]
    fn test_missing_named_value() {
        let err = translate(
            "select * from animal where name = :name",
            Some(&Params::named([("other", 1)])),
            Dialect::Question,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterMismatch);
    }

    #[test]
    fn test_count_mismatch() {
        let err = translate("select ? , ?", Some(&snake()), Dialect::Question).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterMismatch);
    }

    #[test]
    fn test_mixed_named_and_positional() {
        let err = translate("select ? , :a", Some(&snake()), Dialect::Question).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterMismatch);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = translate("select :a", Some(&snake()), Dialect::Question).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgumentType);
        let err = translate("select ?", Some(&Params::named([("a", 1)])), Dialect::Question)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgumentType);
    }

    #[test]
    fn test_params_without_markers() {
        let err = translate("select 1", Some(&snake()), Dialect::Question).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterMismatch);

        let stmt = translate("select 1", Some(&().into()), Dialect::Question).unwrap();
        assert_eq!(stmt.params, BoundParams::None);
    }

    #[test]
    fn test_time_literal_and_numeric_colon() {
        let stmt = translate(
            "select '10:30' , x[1:2] from t where a = ?",
            Some(&(1,).into()),
            Dialect::Numbered,
        )
        .unwrap();
        assert_eq!(stmt.sql, "select '10:30' , x[1:2] from t where a = $1");
    }
}
