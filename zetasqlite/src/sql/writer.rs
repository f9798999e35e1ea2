//! Deterministic serializer for the writer AST (`spec.md §4.10`, `§6.4`).
//! All identifiers are backtick-quoted; the serializer carries an indent
//! level and a newline toggle, though the translator's own output is always
//! requested in compact (non-pretty) form so emitted SQL matches the exact
//! shapes `spec.md §8`'s test suite checks against.

use super::ast::*;

pub struct Writer {
    buf: String,
    indent: usize,
    pretty: bool,
}

impl Writer {
    pub fn new(pretty: bool) -> Self {
        Writer {
            buf: String::new(),
            indent: 0,
            pretty,
        }
    }

    fn newline(&mut self) {
        if self.pretty {
            self.buf.push('\n');
            self.buf.push_str(&"  ".repeat(self.indent));
        } else {
            self.buf.push(' ');
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }

    pub fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn write(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn write_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Select(s) => self.write_select_statement(s),
            Statement::CreateTable(c) => self.write_create_table(c),
            Statement::CreateView(v) => self.write_create_view(v),
            Statement::Drop(d) => self.write_drop(d),
            Statement::Insert(i) => self.write_insert(i),
            Statement::Update(u) => self.write_update(u),
            Statement::Delete(d) => self.write_delete(d),
            Statement::Truncate(t) => self.write(&format!("TRUNCATE TABLE {}", Writer::quote_ident(&t.target))),
            Statement::Compound(stmts) => {
                for (i, s) in stmts.iter().enumerate() {
                    if i > 0 {
                        self.write("; ");
                    }
                    self.write_statement(s);
                }
            }
        }
    }

    pub fn write_select_statement(&mut self, stmt: &SelectStatement) {
        if let Some(with) = &stmt.with {
            self.write_with_clause(with);
        }
        match &stmt.body {
            SelectBody::Select(select) => self.write_plain_select(select),
            SelectBody::SetOp(set_op) => self.write_set_operation(set_op),
        }
        if !stmt.order_by.is_empty() {
            self.write(" ORDER BY ");
            for (i, item) in stmt.order_by.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.write_expr(&item.expr);
                if let Some(collation) = &item.collate {
                    self.write(&format!(" COLLATE {collation}"));
                }
                self.write(if item.desc { " DESC" } else { " ASC" });
            }
        }
        if let Some(limit) = &stmt.limit {
            self.write(" LIMIT ");
            self.write_expr(limit);
        }
        if let Some(offset) = &stmt.offset {
            self.write(" OFFSET ");
            self.write_expr(offset);
        }
    }

    fn write_with_clause(&mut self, with: &WithClause) {
        self.write("WITH ");
        if with.is_recursive() {
            self.write("RECURSIVE ");
        }
        for (i, entry) in with.entries.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&Writer::quote_ident(&entry.name));
            if !entry.column_aliases.is_empty() {
                self.write(" (");
                for (j, col) in entry.column_aliases.iter().enumerate() {
                    if j > 0 {
                        self.write(", ");
                    }
                    self.write(&Writer::quote_ident(col));
                }
                self.write(")");
            }
            self.write(" AS ");
            if entry.materialized {
                self.write("MATERIALIZED ");
            }
            self.write("(");
            self.write_select_statement(&entry.query);
            self.write(")");
        }
        self.newline();
    }

    fn write_plain_select(&mut self, select: &PlainSelect) {
        self.write("SELECT ");
        for (i, item) in select.select_list.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            match item {
                SelectItem::Star => self.write("*"),
                SelectItem::QualifiedStar(alias) => {
                    self.write(&Writer::quote_ident(alias));
                    self.write(".*");
                }
                SelectItem::Expr { expr, alias } => {
                    self.write_expr(expr);
                    self.write(" AS ");
                    self.write(&Writer::quote_ident(alias));
                }
            }
        }
        if let Some(from) = &select.from {
            if !matches!(from, FromItem::SingleRow) {
                self.write(" FROM ");
                self.write_from_item(from);
            }
        }
        if let Some(where_clause) = &select.where_clause {
            self.write(" WHERE ");
            self.write_expr(where_clause);
        }
        if !select.group_by.is_empty() {
            self.write(" GROUP BY ");
            for (i, expr) in select.group_by.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.write_expr(expr);
            }
        }
        if let Some(having) = &select.having {
            self.write(" HAVING ");
            self.write_expr(having);
        }
    }

    fn write_set_operation(&mut self, set_op: &SetOperation) {
        let keyword = match set_op.kind {
            SetOpKind::Union => "UNION",
            SetOpKind::Intersect => "INTERSECT",
            SetOpKind::Except => "EXCEPT",
        };
        let modifier = match set_op.modifier {
            SetOpModifier::All => " ALL",
            SetOpModifier::Distinct => "",
        };
        for (i, operand) in set_op.operands.iter().enumerate() {
            if i > 0 {
                self.write(&format!(" {keyword}{modifier} "));
            }
            self.write_select_statement(operand);
        }
    }

    fn write_from_item(&mut self, item: &FromItem) {
        match item {
            FromItem::Table { name, alias } => {
                self.write(&Writer::quote_ident(name));
                if let Some(alias) = alias {
                    self.write(" AS ");
                    self.write(&Writer::quote_ident(alias));
                }
            }
            FromItem::Subquery { query, alias } => {
                self.write("(");
                self.write_select_statement(query);
                self.write(") AS ");
                self.write(&Writer::quote_ident(alias));
            }
            FromItem::WithRef { name, alias } => {
                self.write(&Writer::quote_ident(name));
                self.write(" AS ");
                self.write(&Writer::quote_ident(alias));
            }
            FromItem::TableFunction { name, args, alias } => {
                self.write(name);
                self.write("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write_expr(arg);
                }
                self.write(") AS ");
                self.write(&Writer::quote_ident(alias));
            }
            FromItem::SingleRow => {}
            FromItem::Join(join) => self.write_join(join),
        }
    }

    fn write_join(&mut self, join: &JoinClause) {
        self.write_from_item(&join.left);
        let keyword = match join.kind {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
            JoinKind::FullOuter => " FULL OUTER JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
        };
        self.write(keyword);
        self.write_from_item(&join.right);
        if !join.using.is_empty() {
            self.write(" USING (");
            for (i, col) in join.using.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.write(&Writer::quote_ident(col));
            }
            self.write(")");
        } else if let Some(cond) = &join.condition {
            self.write(" ON ");
            self.write_expr(cond);
        }
    }

    pub fn write_expr(&mut self, expr: &SqlExpression) {
        match expr {
            SqlExpression::Column { table_alias, name } => {
                if let Some(alias) = table_alias {
                    self.write(&Writer::quote_ident(alias));
                    self.write(".");
                }
                self.write(&Writer::quote_ident(name));
            }
            SqlExpression::Literal(text) => self.write(text),
            SqlExpression::Parameter(name) => self.write(&format!("@{name}")),
            SqlExpression::Star => self.write("*"),
            SqlExpression::Raw(text) => self.write(text),
            SqlExpression::FunctionCall(call) => self.write_function_call(call),
            SqlExpression::Case(case) => self.write_case(case),
            SqlExpression::Exists(exists) => {
                if exists.negated {
                    self.write("NOT ");
                }
                self.write("EXISTS (");
                self.write_select_statement(&exists.subquery);
                self.write(")");
            }
            SqlExpression::ScalarSubquery(subquery) => {
                self.write("(");
                self.write_select_statement(subquery);
                self.write(")");
            }
            SqlExpression::InSubquery { expr, negated, subquery } => {
                self.write_expr(expr);
                if *negated {
                    self.write(" NOT IN (");
                } else {
                    self.write(" IN (");
                }
                self.write_select_statement(subquery);
                self.write(")");
            }
        }
    }

    fn write_function_call(&mut self, call: &FunctionCall) {
        self.write(&call.name);
        self.write("(");
        if call.distinct {
            self.write("DISTINCT ");
        }
        for (i, arg) in call.args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write_expr(arg);
        }
        self.write(")");
        if let Some(window) = &call.window {
            self.write(" OVER (");
            let mut wrote_any = false;
            if !window.partition_by.is_empty() {
                self.write("PARTITION BY ");
                for (i, expr) in window.partition_by.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write_expr(expr);
                }
                wrote_any = true;
            }
            if !window.order_by.is_empty() {
                if wrote_any {
                    self.write(" ");
                }
                self.write("ORDER BY ");
                for (i, item) in window.order_by.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write_expr(&item.expr);
                    self.write(if item.desc { " DESC" } else { " ASC" });
                }
                wrote_any = true;
            }
            if let Some((unit, start, end)) = &window.frame {
                if wrote_any {
                    self.write(" ");
                }
                let unit_kw = match unit {
                    FrameUnit::Rows => "ROWS",
                    FrameUnit::Range => "RANGE",
                    FrameUnit::Groups => "GROUPS",
                };
                self.write(unit_kw);
                self.write(" BETWEEN ");
                self.write(&Self::frame_bound_sql(start));
                self.write(" AND ");
                self.write(&Self::frame_bound_sql(end));
            }
            self.write(")");
        }
    }

    fn frame_bound_sql(bound: &FrameBound) -> String {
        match bound {
            FrameBound::UnboundedPreceding => "UNBOUNDED PRECEDING".to_string(),
            FrameBound::Preceding(n) => format!("{n} PRECEDING"),
            FrameBound::CurrentRow => "CURRENT ROW".to_string(),
            FrameBound::Following(n) => format!("{n} FOLLOWING"),
            FrameBound::UnboundedFollowing => "UNBOUNDED FOLLOWING".to_string(),
        }
    }

    fn write_case(&mut self, case: &CaseExpression) {
        self.write("CASE");
        if let Some(operand) = &case.operand {
            self.write(" ");
            self.write_expr(operand);
        }
        for (when, then) in &case.whens {
            self.write(" WHEN ");
            self.write_expr(when);
            self.write(" THEN ");
            self.write_expr(then);
        }
        if let Some(else_result) = &case.else_result {
            self.write(" ELSE ");
            self.write_expr(else_result);
        }
        self.write(" END");
    }

    fn write_create_table(&mut self, create: &CreateTable) {
        self.write("CREATE ");
        if create.or_replace {
            self.write("OR REPLACE ");
        }
        self.write("TABLE ");
        if create.if_not_exists {
            self.write("IF NOT EXISTS ");
        }
        self.write(&Writer::quote_ident(&create.name));
        if let Some(as_select) = &create.as_select {
            self.write(" AS ");
            self.write_select_statement(as_select);
        } else {
            self.write(" (");
            for (i, (name, ty)) in create.columns.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.write(&Writer::quote_ident(name));
                self.write(" ");
                self.write(ty);
            }
            self.write(")");
        }
    }

    fn write_create_view(&mut self, view: &CreateView) {
        self.write("CREATE ");
        if view.or_replace {
            self.write("OR REPLACE ");
        }
        self.write("VIEW ");
        self.write(&Writer::quote_ident(&view.name));
        self.write(" AS ");
        self.write_select_statement(&view.query);
    }

    fn write_drop(&mut self, drop: &DropStatement) {
        self.write("DROP ");
        self.write(match drop.object_type {
            DropObjectType::Table => "TABLE",
            DropObjectType::View => "VIEW",
            DropObjectType::Function => "FUNCTION",
            DropObjectType::Index => "INDEX",
            DropObjectType::Schema => "SCHEMA",
        });
        self.write(" ");
        if drop.if_exists {
            self.write("IF EXISTS ");
        }
        self.write(&Writer::quote_ident(&drop.name));
    }

    fn write_insert(&mut self, insert: &InsertStatement) {
        self.write("INSERT INTO ");
        self.write(&Writer::quote_ident(&insert.target));
        if !insert.columns.is_empty() {
            self.write(" (");
            for (i, col) in insert.columns.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.write(&Writer::quote_ident(col));
            }
            self.write(")");
        }
        self.write(" ");
        self.write_select_statement(&insert.source);
    }

    fn write_update(&mut self, update: &UpdateStatement) {
        self.write("UPDATE ");
        self.write(&Writer::quote_ident(&update.target));
        self.write(" SET ");
        for (i, (col, expr)) in update.assignments.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&Writer::quote_ident(col));
            self.write(" = ");
            self.write_expr(expr);
        }
        if let Some(from) = &update.from {
            self.write(" FROM ");
            self.write_from_item(from);
        }
        if let Some(where_clause) = &update.where_clause {
            self.write(" WHERE ");
            self.write_expr(where_clause);
        }
    }

    fn write_delete(&mut self, delete: &DeleteStatement) {
        self.write("DELETE FROM ");
        self.write(&Writer::quote_ident(&delete.target));
        if let Some(where_clause) = &delete.where_clause {
            self.write(" WHERE ");
            self.write_expr(where_clause);
        }
    }
}

pub fn serialize(stmt: &Statement) -> String {
    serialize_with(stmt, false)
}

pub fn serialize_with(stmt: &Statement, pretty: bool) -> String {
    let mut writer = Writer::new(pretty);
    writer.write_statement(stmt);
    writer.finish().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_simple_select_with_where() {
        let select = SelectStatement::simple(PlainSelect {
            select_list: vec![SelectItem::Expr {
                expr: SqlExpression::Column { table_alias: None, name: "a#1".into() },
                alias: "x".into(),
            }],
            from: Some(FromItem::Table { name: "t".into(), alias: None }),
            where_clause: Some(SqlExpression::FunctionCall(FunctionCall {
                name: "zetasqlite_gt".into(),
                args: vec![
                    SqlExpression::Column { table_alias: None, name: "b#2".into() },
                    SqlExpression::Literal("0".into()),
                ],
                distinct: false,
                window: None,
            })),
            group_by: vec![],
            having: None,
        });
        let sql = serialize(&Statement::Select(Box::new(select)));
        assert_eq!(
            sql,
            "SELECT `a#1` AS `x` FROM `t` WHERE zetasqlite_gt(`b#2`, 0)"
        );
    }

    #[test]
    fn single_row_from_is_omitted() {
        let select = SelectStatement::simple(PlainSelect {
            select_list: vec![SelectItem::Expr {
                expr: SqlExpression::Literal("1".into()),
                alias: "n".into(),
            }],
            from: Some(FromItem::SingleRow),
            where_clause: None,
            group_by: vec![],
            having: None,
        });
        let sql = serialize(&Statement::Select(Box::new(select)));
        assert_eq!(sql, "SELECT 1 AS `n`");
    }
}
