//! Dialect renderer for [`Expr`] trees.
//!
//! The writer owns the statement text and the parameter list. Every
//! placeholder is written by [`SqlWriter::bind`], which appends the value in
//! the same step, so parameters are always in placeholder order.

use crate::types::{Capabilities, Dialect, Window};

use super::CompiledQuery;
use super::expr::{Expr, Operand};
use super::value::SqlValue;

/// Width of the zero-padded id used as a string sort tie-break.
const PAD_WIDTH: usize = 10;

/// Builds one SQL statement for a specific dialect.
#[derive(Debug)]
pub struct SqlWriter<'a> {
    caps: &'a Capabilities,
    sql: String,
    params: Vec<SqlValue>,
}

impl<'a> SqlWriter<'a> {
    pub fn new(caps: &'a Capabilities) -> Self {
        Self {
            caps,
            sql: String::with_capacity(256),
            params: Vec::new(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.caps
    }

    /// Appends raw statement text.
    pub fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    /// Appends a placeholder bound to `value`.
    pub fn bind(&mut self, value: SqlValue) -> &mut Self {
        self.params.push(value);
        match self.caps.dialect {
            Dialect::Sqlite => {
                self.sql.push('?');
                self.sql.push_str(&self.params.len().to_string());
            }
            Dialect::MySql => self.sql.push('?'),
        }
        self
    }

    /// Number of parameters bound so far.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Writes the parts joined by `AND` without enclosing parentheses.
    pub fn conjunction(&mut self, parts: &[Expr]) -> &mut Self {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(" AND ");
            }
            self.expr(part);
        }
        self
    }

    /// Writes a boolean expression.
    pub fn expr(&mut self, expr: &Expr) -> &mut Self {
        match expr {
            Expr::False => {
                let text = if self.caps.supports_boolean_datatype {
                    "FALSE"
                } else {
                    "0 = 1"
                };
                self.sql.push_str(text);
            }
            Expr::And(parts) => self.joined(parts, " AND "),
            Expr::Or(parts) => self.joined(parts, " OR "),
            Expr::Not(inner) => {
                self.sql.push_str("NOT ");
                if matches!(**inner, Expr::And(_) | Expr::Or(_)) {
                    self.expr(inner);
                } else {
                    self.sql.push('(');
                    self.expr(inner);
                    self.sql.push(')');
                }
            }
            Expr::Compare { left, op, right } => {
                self.operand(left);
                self.sql.push(' ');
                self.sql.push_str(op.as_str());
                self.sql.push(' ');
                self.operand(right);
            }
            Expr::InSet {
                operand,
                values,
                negated,
            } => {
                if values.is_empty() {
                    self.empty_in(*negated);
                } else {
                    self.operand(operand);
                    self.sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            self.sql.push_str(", ");
                        }
                        self.bind(value.clone());
                    }
                    self.sql.push(')');
                }
            }
            Expr::InLiterals {
                operand,
                values,
                negated,
            } => {
                if values.is_empty() {
                    self.empty_in(*negated);
                } else {
                    self.operand(operand);
                    self.sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                    let list: Vec<String> = values.iter().map(i64::to_string).collect();
                    self.sql.push_str(&list.join(", "));
                    self.sql.push(')');
                }
            }
            Expr::Exists {
                table,
                alias,
                filter,
                negated,
            } => {
                if *negated {
                    self.sql.push_str("NOT ");
                }
                self.sql.push_str("EXISTS (SELECT * FROM ");
                self.sql.push_str(table);
                self.sql.push_str(" AS ");
                self.sql.push_str(alias);
                self.sql.push_str(" WHERE ");
                match filter.as_ref() {
                    Expr::And(parts) => {
                        self.conjunction(parts);
                    }
                    other => {
                        self.expr(other);
                    }
                }
                self.sql.push(')');
            }
            Expr::IsNull { operand, negated } => {
                self.operand(operand);
                self.sql
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Contains {
                operand,
                needle,
                negated,
            } => self.contains(operand, needle, *negated),
        }
        self
    }

    fn joined(&mut self, parts: &[Expr], separator: &str) {
        self.sql.push('(');
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(separator);
            }
            self.expr(part);
        }
        self.sql.push(')');
    }

    fn empty_in(&mut self, negated: bool) {
        if negated {
            self.sql.push_str("1 = 1");
        } else {
            self.expr(&Expr::False);
        }
    }

    // SQLite's LIKE stops at an embedded NUL, so tag name lists are searched
    // with instr() there.
    fn contains(&mut self, operand: &Operand, needle: &str, negated: bool) {
        match self.caps.dialect {
            Dialect::Sqlite => {
                self.sql.push_str("instr(");
                self.operand(operand);
                self.sql.push_str(", ");
                self.bind(SqlValue::Text(needle.to_string()));
                self.sql.push_str(if negated { ") = 0" } else { ") > 0" });
            }
            Dialect::MySql => {
                self.operand(operand);
                self.sql
                    .push_str(if negated { " NOT LIKE " } else { " LIKE " });
                self.bind(SqlValue::Text(like_pattern(needle)));
                self.sql.push_str(" ESCAPE '\\\\'");
            }
        }
    }

    /// Writes a scalar expression.
    pub fn operand(&mut self, operand: &Operand) -> &mut Self {
        match operand {
            Operand::Column(name) => self.sql.push_str(name),
            Operand::Param(value) => {
                self.bind(value.clone());
            }
            Operand::Literal(v) => self.sql.push_str(&v.to_string()),
            Operand::Upper(inner) => {
                self.sql.push_str("UPPER(");
                self.operand(inner);
                self.sql.push(')');
            }
            Operand::BitAnd(a, b) => {
                if self.caps.supports_bitwise_ops {
                    self.sql.push('(');
                    self.operand(a);
                    self.sql.push_str(" & ");
                    self.operand(b);
                    self.sql.push(')');
                } else {
                    self.sql.push_str("BITAND(");
                    self.operand(a);
                    self.sql.push_str(", ");
                    self.operand(b);
                    self.sql.push(')');
                }
            }
            Operand::Sign(inner) => match self.caps.dialect {
                Dialect::Sqlite => {
                    self.sql.push_str("(CASE WHEN ");
                    self.operand(inner);
                    self.sql.push_str(" > 0 THEN 1 WHEN ");
                    self.operand(inner);
                    self.sql.push_str(" < 0 THEN -1 ELSE 0 END)");
                }
                Dialect::MySql => {
                    self.sql.push_str("SIGN(");
                    self.operand(inner);
                    self.sql.push(')');
                }
            },
            Operand::Add(a, b) => self.binary(a, " + ", b),
            Operand::Sub(a, b) => self.binary(a, " - ", b),
            Operand::Concat(a, b) => match self.caps.dialect {
                Dialect::Sqlite => self.binary(a, " || ", b),
                Dialect::MySql => {
                    self.sql.push_str("CONCAT(");
                    self.operand(a);
                    self.sql.push_str(", ");
                    self.operand(b);
                    self.sql.push(')');
                }
            },
            Operand::PadId(inner) => match self.caps.dialect {
                Dialect::Sqlite => {
                    self.sql.push_str(&format!("printf('%0{PAD_WIDTH}d', "));
                    self.operand(inner);
                    self.sql.push(')');
                }
                Dialect::MySql => {
                    self.sql.push_str("LPAD(");
                    self.operand(inner);
                    self.sql.push_str(&format!(", {PAD_WIDTH}, '0')"));
                }
            },
            Operand::Coalesce(inner, default) => {
                self.sql.push_str("COALESCE(");
                self.operand(inner);
                self.sql.push_str(&format!(", {default})"));
            }
        }
        self
    }

    fn binary(&mut self, a: &Operand, op: &str, b: &Operand) {
        self.sql.push('(');
        self.operand(a);
        self.sql.push_str(op);
        self.operand(b);
        self.sql.push(')');
    }

    /// Writes an index hint after a table reference.
    pub fn index_hint(&mut self, index: &str) -> &mut Self {
        match self.caps.dialect {
            Dialect::Sqlite => {
                self.sql.push_str(" INDEXED BY ");
                self.sql.push_str(index);
            }
            Dialect::MySql => {
                self.sql.push_str(" FORCE INDEX (");
                self.sql.push_str(index);
                self.sql.push(')');
            }
        }
        self
    }

    /// Writes the LIMIT clause for a bounded window.
    ///
    /// Returns false when nothing was written, either because the window is
    /// unbounded or the backend has no LIMIT clause.
    pub fn limit(&mut self, window: Window) -> bool {
        let Some(limit) = window.limit else {
            return false;
        };
        if !self.caps.supports_limit_clause {
            return false;
        }
        match self.caps.dialect {
            Dialect::Sqlite => {
                self.sql
                    .push_str(&format!(" LIMIT {limit} OFFSET {}", window.offset));
            }
            Dialect::MySql => {
                self.sql
                    .push_str(&format!(" LIMIT {}, {limit}", window.offset));
            }
        }
        true
    }

    pub fn finish(self) -> CompiledQuery {
        CompiledQuery {
            text: self.sql,
            params: self.params,
        }
    }
}

/// LIKE pattern matching `needle` anywhere, with `\` as the escape character.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::CompareOp;

    fn render(caps: &Capabilities, expr: &Expr) -> CompiledQuery {
        let mut writer = SqlWriter::new(caps);
        writer.expr(expr);
        writer.finish()
    }

    #[test]
    fn test_sqlite_placeholders_are_numbered() {
        let caps = Capabilities::sqlite();
        let expr = Expr::And(vec![
            Expr::eq_param("mi.mailbox_id", 1),
            Expr::in_set("mi.folder_id", [2, 5], false),
        ]);
        let query = render(&caps, &expr);
        assert_eq!(query.text, "(mi.mailbox_id = ?1 AND mi.folder_id IN (?2, ?3))");
        assert_eq!(
            query.params,
            vec![SqlValue::Integer(1), SqlValue::Integer(2), SqlValue::Integer(5)]
        );
    }

    #[test]
    fn test_mysql_placeholders() {
        let caps = Capabilities::mysql();
        let query = render(&caps, &Expr::in_set("mi.id", [3, 4], true));
        assert_eq!(query.text, "mi.id NOT IN (?, ?)");
    }

    #[test]
    fn test_false_without_boolean_type() {
        let mut caps = Capabilities::sqlite();
        assert_eq!(render(&caps, &Expr::False).text, "FALSE");
        caps.supports_boolean_datatype = false;
        assert_eq!(render(&caps, &Expr::False).text, "0 = 1");
    }

    #[test]
    fn test_not_wraps_simple_predicates() {
        let caps = Capabilities::sqlite();
        let expr = Expr::negate(Expr::And(vec![
            Expr::compare(
                Operand::column("mi.size"),
                CompareOp::Ge,
                Operand::param(10),
            ),
            Expr::compare(
                Operand::column("mi.size"),
                CompareOp::Le,
                Operand::param(20),
            ),
        ]));
        assert_eq!(
            render(&caps, &expr).text,
            "NOT (mi.size >= ?1 AND mi.size <= ?2)"
        );
        let single = Expr::negate(Expr::is_null("mi.parent_id", false));
        assert_eq!(render(&caps, &single).text, "NOT (mi.parent_id IS NULL)");
    }

    #[test]
    fn test_sort_functions_by_dialect() {
        let column = Operand::column("mi.flags")
            .bit_and(Operand::Literal(16))
            .sign()
            .concat(Operand::column("mi.id").pad_id());

        let sqlite_caps = Capabilities::sqlite();
        let mut sqlite = SqlWriter::new(&sqlite_caps);
        sqlite.operand(&column);
        assert_eq!(
            sqlite.finish().text,
            "((CASE WHEN (mi.flags & 16) > 0 THEN 1 WHEN (mi.flags & 16) < 0 THEN -1 ELSE 0 END) || printf('%010d', mi.id))"
        );

        let mut caps = Capabilities::mysql();
        caps.supports_bitwise_ops = false;
        let mut mysql = SqlWriter::new(&caps);
        mysql.operand(&column);
        assert_eq!(
            mysql.finish().text,
            "CONCAT(SIGN(BITAND(mi.flags, 16)), LPAD(mi.id, 10, '0'))"
        );
    }

    #[test]
    fn test_contains_by_dialect() {
        let expr = Expr::Contains {
            operand: Operand::column("mi.tag_names"),
            needle: "\0a_b\0".to_string(),
            negated: false,
        };
        let sqlite = render(&Capabilities::sqlite(), &expr);
        assert_eq!(sqlite.text, "instr(mi.tag_names, ?1) > 0");
        assert_eq!(sqlite.params, vec![SqlValue::from("\0a_b\0")]);

        let mysql = render(&Capabilities::mysql(), &expr);
        assert_eq!(mysql.text, "mi.tag_names LIKE ? ESCAPE '\\\\'");
        assert_eq!(mysql.params, vec![SqlValue::from("%\0a\\_b\0%")]);
    }

    #[test]
    fn test_exists_filter_is_flat() {
        let expr = Expr::Exists {
            table: "tagged_item".to_string(),
            alias: "ti",
            filter: Box::new(Expr::And(vec![
                Expr::columns_eq("mi.id", "ti.item_id"),
                Expr::eq_param("ti.tag_id", 7),
            ])),
            negated: true,
        };
        assert_eq!(
            render(&Capabilities::sqlite(), &expr).text,
            "NOT EXISTS (SELECT * FROM tagged_item AS ti WHERE mi.id = ti.item_id AND ti.tag_id = ?1)"
        );
    }

    #[test]
    fn test_limit_syntax() {
        let sqlite_caps = Capabilities::sqlite();
        let mut sqlite = SqlWriter::new(&sqlite_caps);
        assert!(sqlite.limit(Window::page(5, 10)));
        assert_eq!(sqlite.finish().text, " LIMIT 10 OFFSET 5");

        let mysql_caps = Capabilities::mysql();
        let mut mysql = SqlWriter::new(&mysql_caps);
        assert!(mysql.limit(Window::page(5, 10)));
        assert_eq!(mysql.finish().text, " LIMIT 5, 10");

        let no_limit = Capabilities::sqlite().with_limit_clause(false);
        let mut writer = SqlWriter::new(&no_limit);
        assert!(!writer.limit(Window::page(5, 10)));
        let mut writer = SqlWriter::new(&mysql_caps);
        assert!(!writer.limit(Window::all()));
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("50%_\\x"), "%50\\%\\_\\\\x%");
    }
}
