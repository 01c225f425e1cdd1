//! Built-in `database` block
//!
//! Runs one parameterized statement against Postgres. Identifiers are
//! validated and quoted, values are always bound. Every statement is wrapped
//! so Postgres returns the affected rows as a single JSON array.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use tracing::debug;

use crate::config::DatabaseBlockConfig;
use crate::domain::block::{
    BlockDefinition, BlockError, BlockExecutionContext, BlockFunction, BlockHandler, BlockOutputs,
    BlockPort,
};

pub const DATABASE_BLOCK_TYPE: &str = "database";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Statement kind
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DbFunction {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseQueryConfig {
    function: DbFunction,
    table: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default, rename = "where")]
    where_clause: Map<String, Value>,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    order_by: Option<String>,
}

/// SQL text plus the values bound to `$1..$n`
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

fn quote_identifier(name: &str) -> Result<String, BlockError> {
    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(BlockError::invalid_config(format!(
            "Invalid identifier: {}",
            name
        )));
    }
    Ok(format!("\"{}\"", name))
}

/// Quote a possibly schema-qualified table name
fn quote_table(table: &str) -> Result<String, BlockError> {
    let parts = table
        .split('.')
        .map(quote_identifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("."))
}

fn order_clause(order_by: &str) -> Result<String, BlockError> {
    let mut parts = order_by.split_whitespace();

    let column = parts
        .next()
        .ok_or_else(|| BlockError::invalid_config("orderBy cannot be empty"))?;

    let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => "ASC",
        Some("desc") => "DESC",
        Some(other) => {
            return Err(BlockError::invalid_config(format!(
                "Invalid order direction: {}",
                other
            )));
        }
    };

    if parts.next().is_some() {
        return Err(BlockError::invalid_config(format!(
            "Invalid orderBy: {}",
            order_by
        )));
    }

    Ok(format!("{} {}", quote_identifier(column)?, direction))
}

/// Accumulates bound parameters while rendering a statement
#[derive(Default)]
struct ParamSink {
    params: Vec<Value>,
}

impl ParamSink {
    /// Placeholder for a value; nulls are rendered inline
    fn placeholder(&mut self, value: &Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.params.push(value.clone());
        format!("${}", self.params.len())
    }

    fn where_clause(&mut self, conditions: &Map<String, Value>) -> Result<String, BlockError> {
        let mut parts = Vec::with_capacity(conditions.len());

        for (column, value) in conditions {
            let column = quote_identifier(column)?;
            if value.is_null() {
                parts.push(format!("{} IS NULL", column));
            } else {
                let placeholder = self.placeholder(value);
                parts.push(format!("{} = {}", column, placeholder));
            }
        }

        Ok(parts.join(" AND "))
    }
}

impl DatabaseQueryConfig {
    /// Parse config, letting resolved `where`/`data` inputs win
    fn from_parts(config: &Value, inputs: &Map<String, Value>) -> Result<Self, BlockError> {
        let mut query: Self = serde_json::from_value(config.clone())
            .map_err(|e| BlockError::invalid_config(format!("Invalid database config: {}", e)))?;

        if let Some(Value::Object(conditions)) = inputs.get("where") {
            query.where_clause = conditions.clone();
        }

        if let Some(Value::Object(data)) = inputs.get("data") {
            query.data = data.clone();
        }

        Ok(query)
    }

    fn build(&self) -> Result<BuiltQuery, BlockError> {
        let table = quote_table(&self.table)?;
        let mut sink = ParamSink::default();

        let statement = match self.function {
            DbFunction::Select => {
                let columns = if self.columns.is_empty() {
                    "*".to_string()
                } else {
                    self.columns
                        .iter()
                        .map(|c| quote_identifier(c))
                        .collect::<Result<Vec<_>, _>>()?
                        .join(", ")
                };

                let mut sql = format!("SELECT {} FROM {}", columns, table);

                if !self.where_clause.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&sink.where_clause(&self.where_clause)?);
                }

                if let Some(order_by) = &self.order_by {
                    sql.push_str(" ORDER BY ");
                    sql.push_str(&order_clause(order_by)?);
                }

                if let Some(limit) = self.limit {
                    sql.push_str(&format!(" LIMIT {}", limit));
                }

                sql
            }
            DbFunction::Insert => {
                if self.data.is_empty() {
                    return Err(BlockError::invalid_config("insert requires data"));
                }

                let mut columns = Vec::with_capacity(self.data.len());
                let mut values = Vec::with_capacity(self.data.len());

                for (column, value) in &self.data {
                    columns.push(quote_identifier(column)?);
                    values.push(sink.placeholder(value));
                }

                format!(
                    "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                    table,
                    columns.join(", "),
                    values.join(", ")
                )
            }
            DbFunction::Update => {
                if self.data.is_empty() {
                    return Err(BlockError::invalid_config("update requires data"));
                }
                if self.where_clause.is_empty() {
                    return Err(BlockError::invalid_config("update requires a where clause"));
                }

                let mut assignments = Vec::with_capacity(self.data.len());
                for (column, value) in &self.data {
                    let column = quote_identifier(column)?;
                    assignments.push(format!("{} = {}", column, sink.placeholder(value)));
                }

                let conditions = sink.where_clause(&self.where_clause)?;

                format!(
                    "UPDATE {} SET {} WHERE {} RETURNING *",
                    table,
                    assignments.join(", "),
                    conditions
                )
            }
            DbFunction::Delete => {
                if self.where_clause.is_empty() {
                    return Err(BlockError::invalid_config("delete requires a where clause"));
                }

                let conditions = sink.where_clause(&self.where_clause)?;
                format!("DELETE FROM {} WHERE {} RETURNING *", table, conditions)
            }
        };

        let sql = match self.function {
            DbFunction::Select => format!(
                "SELECT COALESCE(json_agg(row_to_json(t)), '[]'::json) FROM ({}) t",
                statement
            ),
            _ => format!(
                "WITH t AS ({}) SELECT COALESCE(json_agg(row_to_json(t)), '[]'::json) FROM t",
                statement
            ),
        };

        Ok(BuiltQuery {
            sql,
            params: sink.params,
        })
    }
}

/// Build the statement for a block invocation
pub fn build_query(config: &Value, inputs: &Map<String, Value>) -> Result<BuiltQuery, BlockError> {
    DatabaseQueryConfig::from_parts(config, inputs)?.build()
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => query.bind(i),
            (None, Some(f)) => query.bind(f),
            (None, None) => query.bind(n.to_string()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Null => query.bind(None::<String>),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

/// Handler running statements on a shared connection pool
#[derive(Debug, Clone)]
pub struct DatabaseBlock {
    pool: PgPool,
}

impl DatabaseBlock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a lazily connecting pool; nothing is dialed until first use
    pub fn connect_lazy(config: &DatabaseBlockConfig) -> Result<Self, BlockError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| BlockError::invalid_config("database.url is not configured"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy(url)
            .map_err(|e| BlockError::internal(format!("Invalid database url: {}", e)))?;

        Ok(Self::new(pool))
    }

    pub fn definition() -> BlockDefinition {
        BlockDefinition::new(DATABASE_BLOCK_TYPE)
            .with_description("Runs a parameterized statement against Postgres")
            .with_config(json!({
                "function": "select",
                "table": "users",
                "columns": [],
                "where": {},
                "data": {},
                "limit": null,
                "orderBy": null
            }))
            .with_input(BlockPort::new("where", "object").with_description("Equality filters"))
            .with_input(BlockPort::new("data", "object").with_description("Values to write"))
            .with_output(BlockPort::required("rows", "array"))
            .with_output(BlockPort::required("rowCount", "number"))
            .with_output(BlockPort::required("success", "boolean"))
            .with_function(BlockFunction::new("select", "Read rows"))
            .with_function(BlockFunction::new("insert", "Insert one row"))
            .with_function(BlockFunction::new("update", "Update matching rows"))
            .with_function(BlockFunction::new("delete", "Delete matching rows"))
            .with_timeout(DEFAULT_TIMEOUT_MS)
    }
}

#[async_trait]
impl BlockHandler for DatabaseBlock {
    async fn execute(
        &self,
        context: BlockExecutionContext,
        config: Value,
    ) -> Result<BlockOutputs, BlockError> {
        let built = build_query(&config, &context.inputs)?;

        debug!(
            block_id = %context.block_id,
            sql = %built.sql,
            params = built.params.len(),
            "Executing database statement"
        );

        let query = built
            .params
            .iter()
            .fold(sqlx::query(&built.sql), bind_value);

        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BlockError::handler(format!("Database query failed: {}", e)))?;

        let rows: Value = row
            .try_get(0)
            .map_err(|e| BlockError::handler(format!("Failed to decode rows: {}", e)))?;

        let row_count = rows.as_array().map(Vec::len).unwrap_or(0);

        let mut outputs = BlockOutputs::new();
        outputs.insert("rows".to_string(), rows);
        outputs.insert("rowCount".to_string(), json!(row_count));
        outputs.insert("success".to_string(), json!(true));

        Ok(outputs)
    }
}
