//! LanceDB connection helpers.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Creates `name` with zero rows when it does not exist yet.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await?;
	Ok(())
}

/// SQL string literal with embedded quotes escaped.
pub fn sql_quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

/// `column IN ('a', 'b')` predicate for a LanceDB filter.
pub fn in_list(column: &str, values: &[String]) -> String {
	let items: Vec<String> = values.iter().map(|v| sql_quote(v)).collect();
	format!("{column} IN ({})", items.join(", "))
}
