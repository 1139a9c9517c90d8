//! PostgreSQL rendering for [`SelectQuery`]
//!
//! Identifiers are double-quoted segment by segment (`users.name` becomes
//! `"users"."name"`). Values are never inlined: each one becomes a `$n`
//! placeholder and is returned in [`CompiledQuery::bindings`]. LIMIT and OFFSET
//! are integers and are written as literals.

use super::condition::{Condition, ConditionGroup, FilterOperator, FilterValue};
use super::select::{JoinKind, SelectQuery};

/// SQL text plus its positional bindings
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Statement with `$1`, `$2`, ... placeholders
    pub sql: String,
    /// Values for the placeholders, in order
    pub bindings: Vec<FilterValue>,
}

/// Quote an identifier, handling `table.column` and `column as alias`
///
/// ```rust
/// use acton_datatable::query::wrap;
///
/// assert_eq!(wrap("users.name"), r#""users"."name""#);
/// assert_eq!(wrap("t.*"), r#""t".*"#);
/// assert_eq!(wrap("name as label"), r#""name" AS "label""#);
/// ```
pub fn wrap(identifier: &str) -> String {
    if let (column, Some(alias)) = split_alias(identifier) {
        return format!("{} AS {}", wrap(column), wrap_segment(alias));
    }

    identifier
        .split('.')
        .map(wrap_segment)
        .collect::<Vec<_>>()
        .join(".")
}

/// Split `name as alias` (any case) into its parts
///
/// ```rust
/// use acton_datatable::query::split_alias;
///
/// assert_eq!(split_alias("users AS u"), ("users", Some("u")));
/// assert_eq!(split_alias("users"), ("users", None));
/// ```
pub fn split_alias(identifier: &str) -> (&str, Option<&str>) {
    match identifier.to_ascii_lowercase().find(" as ") {
        Some(pos) => (identifier[..pos].trim(), Some(identifier[pos + 4..].trim())),
        None => (identifier.trim(), None),
    }
}

fn wrap_segment(segment: &str) -> String {
    if segment == "*" {
        return segment.to_string();
    }
    format!("\"{}\"", segment.replace('"', "\"\""))
}

#[derive(Default)]
struct Compiler {
    bindings: Vec<FilterValue>,
}

impl Compiler {
    fn placeholder(&mut self, value: FilterValue) -> String {
        self.bindings.push(value);
        format!("${}", self.bindings.len())
    }

    fn group(&mut self, group: &ConditionGroup) -> String {
        let mut sql = String::new();
        for (index, (boolean, condition)) in group.conditions().iter().enumerate() {
            if index > 0 {
                sql.push(' ');
                sql.push_str(boolean.as_sql());
                sql.push(' ');
            }
            sql.push_str(&self.condition(condition));
        }
        sql
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Filter(filter) => {
                let column = wrap(&filter.field);
                match filter.operator {
                    FilterOperator::Like => {
                        // Cast so numeric, date and boolean columns can be searched too
                        let placeholder = self.placeholder(filter.value.clone());
                        format!("CAST({column} AS TEXT) LIKE {placeholder}")
                    }
                    FilterOperator::In => {
                        let placeholder = self.placeholder(filter.value.clone());
                        format!("{column} = ANY({placeholder})")
                    }
                    FilterOperator::IsNull | FilterOperator::IsNotNull => {
                        format!("{column} {}", filter.operator)
                    }
                    operator => {
                        let placeholder = self.placeholder(filter.value.clone());
                        format!("{column} {operator} {placeholder}")
                    }
                }
            }
            Condition::Group(group) => format!("({})", self.group(group)),
            Condition::Raw { sql, bindings } => {
                let mut values = bindings.iter().cloned().peekable();
                let mut out = String::with_capacity(sql.len());
                for ch in sql.chars() {
                    match (ch, values.next_if(|_| ch == '?')) {
                        (_, Some(value)) => out.push_str(&self.placeholder(value)),
                        (ch, None) => out.push(ch),
                    }
                }
                out
            }
        }
    }

    fn from_and_wheres(&mut self, query: &SelectQuery, sql: &mut String) {
        if let Some(from) = query.from() {
            sql.push_str(" FROM ");
            sql.push_str(&wrap(from));
        }

        for join in query.joins() {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(
                " {keyword} {} ON {} {} {}",
                wrap(&join.table),
                wrap(&join.first),
                join.operator,
                wrap(&join.second)
            ));
        }

        if !query.wheres().is_empty() {
            sql.push_str(" WHERE ");
            let clause = self.group(query.wheres());
            sql.push_str(&clause);
        }
    }
}

/// Key holding each row's position in [`compile_json_rows`] output
pub const ROW_NUMBER_COLUMN: &str = "__datatable_row";

fn render_orders(query: &SelectQuery) -> String {
    query
        .orders()
        .iter()
        .map(|o| format!("{} {}", wrap(&o.column), o.direction.as_sql()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_select(compiler: &mut Compiler, query: &SelectQuery, numbered: bool) -> String {
    let mut columns = if query.columns().is_empty() {
        "*".to_string()
    } else {
        query
            .columns()
            .iter()
            .map(|c| wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let orders = render_orders(query);
    if numbered {
        columns.push_str(&format!(
            ", ROW_NUMBER() OVER (ORDER BY {orders}) AS {}",
            wrap_segment(ROW_NUMBER_COLUMN)
        ));
    }

    let mut sql = format!("SELECT {columns}");
    compiler.from_and_wheres(query, &mut sql);

    if numbered {
        sql.push_str(&format!(" ORDER BY {}", wrap_segment(ROW_NUMBER_COLUMN)));
    } else if !orders.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&orders);
    }
    if let Some(limit) = query.limit() {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = query.offset() {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
    sql
}

/// Render the full SELECT
pub fn compile_select(query: &SelectQuery) -> CompiledQuery {
    let mut compiler = Compiler::default();
    let sql = render_select(&mut compiler, query, false);
    CompiledQuery {
        sql,
        bindings: compiler.bindings,
    }
}

/// Render the SELECT so that each row comes back as one JSON object
///
/// An outer query does not inherit the ORDER BY of its subquery, so an ordered
/// query also selects its position as [`ROW_NUMBER_COLUMN`] and the outer query
/// sorts on it. Callers drop that key from the rows.
pub fn compile_json_rows(query: &SelectQuery) -> CompiledQuery {
    let mut compiler = Compiler::default();
    let numbered = !query.orders().is_empty();
    let inner = render_select(&mut compiler, query, numbered);

    let mut sql = format!("SELECT row_to_json(t) FROM ({inner}) AS t");
    if numbered {
        sql.push_str(&format!(" ORDER BY t.{}", wrap_segment(ROW_NUMBER_COLUMN)));
    }
    CompiledQuery {
        sql,
        bindings: compiler.bindings,
    }
}

/// Render `SELECT COUNT(*)`; ORDER BY, LIMIT and OFFSET are dropped
pub fn compile_count(query: &SelectQuery) -> CompiledQuery {
    let mut compiler = Compiler::default();
    let mut sql = "SELECT COUNT(*) AS aggregate".to_string();
    compiler.from_and_wheres(query, &mut sql);
    CompiledQuery {
        sql,
        bindings: compiler.bindings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SortOrder;
    use crate::query::FilterCondition;

    #[test]
    fn test_wrap_escapes_quotes() {
        assert_eq!(wrap(r#"we"ird"#), r#""we""ird""#);
        assert_eq!(wrap("public.users.id"), r#""public"."users"."id""#);
    }

    #[test]
    fn test_plain_select() {
        let compiled = SelectQuery::table("users").to_sql();
        assert_eq!(compiled.sql, r#"SELECT * FROM "users""#);
        assert!(compiled.bindings.is_empty());
    }

    #[test]
    fn test_search_group_renders_parenthesized_or() {
        let mut group = ConditionGroup::new();
        group
            .or_where(FilterCondition::like("users.name", "%ana%"))
            .or_where(FilterCondition::like("users.email", "%ana%"));

        let mut query = SelectQuery::table("users").with_condition(FilterCondition::eq("active", true));
        query.and_group(group).order_by("name", SortOrder::Desc).skip(10).take(Some(5));

        let compiled = query.to_sql();
        assert_eq!(
            compiled.sql,
            r#"SELECT * FROM "users" WHERE "active" = $1 AND (CAST("users"."name" AS TEXT) LIKE $2 OR CAST("users"."email" AS TEXT) LIKE $3) ORDER BY "name" DESC LIMIT 5 OFFSET 10"#
        );
        assert_eq!(
            compiled.bindings,
            vec![
                FilterValue::Boolean(true),
                FilterValue::String("%ana%".into()),
                FilterValue::String("%ana%".into()),
            ]
        );
    }

    #[test]
    fn test_count_drops_order_and_paging() {
        let mut query = SelectQuery::table("users")
            .with_select(["id", "name"])
            .with_join("teams", "teams.id", "=", "users.team_id")
            .with_condition(FilterCondition::gt("age", 18));
        query.order_by("name", SortOrder::Asc).skip(10).take(Some(5));

        let compiled = query.to_count_sql();
        assert_eq!(
            compiled.sql,
            r#"SELECT COUNT(*) AS aggregate FROM "users" INNER JOIN "teams" ON "teams"."id" = "users"."team_id" WHERE "age" > $1"#
        );
        assert_eq!(compiled.bindings, vec![FilterValue::Integer(18)]);
    }

    #[test]
    fn test_select_list_and_left_join() {
        let compiled = SelectQuery::table("users")
            .with_select(["users.id", "teams.name as team"])
            .with_left_join("teams", "teams.id", "=", "users.team_id")
            .to_sql();
        assert_eq!(
            compiled.sql,
            r#"SELECT "users"."id", "teams"."name" AS "team" FROM "users" LEFT JOIN "teams" ON "teams"."id" = "users"."team_id""#
        );
    }

    #[test]
    fn test_raw_placeholders_are_numbered_in_sequence() {
        let mut group = ConditionGroup::new();
        group
            .where_(FilterCondition::eq("a", 1))
            .or_where_raw("lower(name) = ? OR age > ?", vec!["ana".into(), 30_i64.into()]);

        let compiled = SelectQuery::table("t").with_group(group).to_sql();
        assert_eq!(
            compiled.sql,
            r#"SELECT * FROM "t" WHERE ("a" = $1 OR lower(name) = $2 OR age > $3)"#
        );
        assert_eq!(compiled.bindings.len(), 3);
    }

    #[test]
    fn test_in_and_null_operators() {
        let compiled = SelectQuery::table("t")
            .with_condition(FilterCondition::in_integers("id", vec![1, 2]))
            .with_condition(FilterCondition::is_null("deleted_at"))
            .to_sql();
        assert_eq!(
            compiled.sql,
            r#"SELECT * FROM "t" WHERE "id" = ANY($1) AND "deleted_at" IS NULL"#
        );
        assert_eq!(compiled.bindings, vec![FilterValue::IntegerList(vec![1, 2])]);
    }

    #[test]
    fn test_like_wildcards_pass_through_as_bindings() {
        let compiled = SelectQuery::table("t")
            .with_condition(FilterCondition::like("code", "%10%_%"))
            .to_sql();
        assert_eq!(compiled.bindings, vec![FilterValue::String("%10%_%".into())]);
    }

    #[test]
    fn test_json_rows_keep_order_outside_the_subquery() {
        let mut query = SelectQuery::table("users").with_condition(FilterCondition::eq("active", true));
        query.order_by("name", SortOrder::Asc).skip(20).take(Some(10));

        let compiled = compile_json_rows(&query);
        assert_eq!(
            compiled.sql,
            r#"SELECT row_to_json(t) FROM (SELECT *, ROW_NUMBER() OVER (ORDER BY "name" ASC) AS "__datatable_row" FROM "users" WHERE "active" = $1 ORDER BY "__datatable_row" LIMIT 10 OFFSET 20) AS t ORDER BY t."__datatable_row""#
        );
        assert_eq!(compiled.bindings, vec![FilterValue::Boolean(true)]);
    }

    #[test]
    fn test_json_rows_without_order_are_not_numbered() {
        let mut query = SelectQuery::table("users").with_select(["id", "name"]);
        query.take(Some(5));

        let compiled = compile_json_rows(&query);
        assert_eq!(
            compiled.sql,
            r#"SELECT row_to_json(t) FROM (SELECT "id", "name" FROM "users" LIMIT 5) AS t"#
        );
    }
}
