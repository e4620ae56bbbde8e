use anyhow::{Result, bail};
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Le,
    Ge,
    Like,
    IsNull,
    IsNotNull,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::Like => "LIKE",
            Op::IsNull => "IS NULL",
            Op::IsNotNull => "IS NOT NULL",
        }
    }

    fn takes_value(self) -> bool {
        !matches!(self, Op::IsNull | Op::IsNotNull)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind {
    Select,
    Count,
    Insert,
    Delete,
}

/// Chainable builder for the handful of statement shapes the store needs.
/// `build` validates every identifier and returns SQL with numbered `?N`
/// placeholders plus the values bound to them, in order.
#[derive(Debug, Clone)]
pub struct FluentQuery {
    kind: QueryKind,
    table: String,
    columns: Vec<String>,
    values: Vec<(String, Value)>,
    filters: Vec<(String, Op, Value)>,
    order: Vec<(String, Direction)>,
    limit: Option<usize>,
    conflict_keys: Vec<String>,
}

impl FluentQuery {
    fn new(kind: QueryKind, table: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            columns: Vec::new(),
            values: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            conflict_keys: Vec::new(),
        }
    }

    pub fn select(table: &str) -> Self {
        Self::new(QueryKind::Select, table)
    }

    pub fn count(table: &str) -> Self {
        Self::new(QueryKind::Count, table)
    }

    pub fn insert(table: &str) -> Self {
        Self::new(QueryKind::Insert, table)
    }

    pub fn delete(table: &str) -> Self {
        Self::new(QueryKind::Delete, table)
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns
            .extend(columns.iter().map(|column| column.to_string()));
        self
    }

    pub fn filter(mut self, column: &str, op: Op, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), op, value.into()));
        self
    }

    pub fn filter_null(mut self, column: &str, op: Op) -> Self {
        self.filters.push((column.to_string(), op, Value::Null));
        self
    }

    pub fn value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.push((column.to_string(), value.into()));
        self
    }

    pub fn on_conflict(mut self, keys: &[&str]) -> Self {
        self.conflict_keys
            .extend(keys.iter().map(|key| key.to_string()));
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let table = identifier(&self.table)?;
        let mut params = Vec::<Value>::new();

        let sql = match self.kind {
            QueryKind::Select => {
                let columns = if self.columns.is_empty() {
                    "*".to_string()
                } else {
                    self.columns
                        .iter()
                        .map(|column| identifier(column))
                        .collect::<Result<Vec<&str>>>()?
                        .join(", ")
                };
                let mut sql = format!("SELECT {columns} FROM {table}");
                sql.push_str(&self.where_clause(&mut params)?);
                sql.push_str(&self.order_clause()?);
                if let Some(limit) = self.limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                sql
            }
            QueryKind::Count => {
                format!(
                    "SELECT COUNT(*) FROM {table}{}",
                    self.where_clause(&mut params)?
                )
            }
            QueryKind::Delete => {
                format!("DELETE FROM {table}{}", self.where_clause(&mut params)?)
            }
            QueryKind::Insert => self.insert_sql(table, &mut params)?,
        };

        Ok((sql, params))
    }

    fn insert_sql(&self, table: &str, params: &mut Vec<Value>) -> Result<String> {
        if self.values.is_empty() {
            bail!("insert into {table} has no values");
        }

        let mut columns = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());
        for (column, value) in &self.values {
            columns.push(identifier(column)?);
            params.push(value.clone());
            placeholders.push(format!("?{}", params.len()));
        }

        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        if !self.conflict_keys.is_empty() {
            let keys = self
                .conflict_keys
                .iter()
                .map(|key| identifier(key))
                .collect::<Result<Vec<&str>>>()?;
            let updates = columns
                .iter()
                .filter(|column| !keys.contains(column))
                .map(|column| format!("{column}=excluded.{column}"))
                .collect::<Vec<String>>();
            if updates.is_empty() {
                sql.push_str(&format!(" ON CONFLICT({}) DO NOTHING", keys.join(", ")));
            } else {
                sql.push_str(&format!(
                    " ON CONFLICT({}) DO UPDATE SET {}",
                    keys.join(", "),
                    updates.join(", ")
                ));
            }
        }

        Ok(sql)
    }

    fn where_clause(&self, params: &mut Vec<Value>) -> Result<String> {
        if self.filters.is_empty() {
            return Ok(String::new());
        }

        let mut conditions = Vec::with_capacity(self.filters.len());
        for (column, op, value) in &self.filters {
            let column = identifier(column)?;
            if op.takes_value() {
                params.push(value.clone());
                conditions.push(format!("{column} {} ?{}", op.as_sql(), params.len()));
            } else {
                conditions.push(format!("{column} {}", op.as_sql()));
            }
        }

        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    fn order_clause(&self) -> Result<String> {
        if self.order.is_empty() {
            return Ok(String::new());
        }

        let terms = self
            .order
            .iter()
            .map(|(column, direction)| {
                let direction = match direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                identifier(column).map(|column| format!("{column} {direction}"))
            })
            .collect::<Result<Vec<String>>>()?;

        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }
}

fn identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    };
    if !valid {
        bail!("invalid SQL identifier: {name:?}");
    }
    Ok(name)
}
