// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! DuckDB-backed hot tier
//!
//! One table keyed by record id. The full record is kept as JSON text next to
//! the columns the tiering protocol filters on.

use super::{HotStore, Page, Predicate};
use crate::Result;
use crate::config::{HotConfig, IN_MEMORY_HOT};
use crate::error::TieringError;
use crate::record::Record;
use async_trait::async_trait;
use diagnostics::*;
use duckdb::types::Value as DuckValue;
use duckdb::{Connection, params_from_iter};
use sea_query::{
    Condition, Expr, Iden, OnConflict, Order, Query, SqliteQueryBuilder, Value as SqlValue, Values,
};
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id VARCHAR PRIMARY KEY,
    partition_key VARCHAR NOT NULL,
    ts_micros BIGINT,
    body VARCHAR NOT NULL
);
";

#[derive(Iden)]
enum Records {
    Table,
    Id,
    PartitionKey,
    TsMicros,
    Body,
}

#[derive(Clone)]
pub struct DuckHotStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for DuckHotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckHotStore").finish_non_exhaustive()
    }
}

impl DuckHotStore {
    /// Open (creating if needed) the database named by `hot.path`
    pub fn open(config: &HotConfig) -> Result<Self> {
        let conn = if config.path == IN_MEMORY_HOT {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        conn.execute_batch(SCHEMA)?;
        info!("opened hot store {path}", path: config.path.as_str());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&HotConfig {
            path: IN_MEMORY_HOT.to_string(),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TieringError::HotStore("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }

    /// `(id, body)` rows, left undecoded
    async fn select_rows(&self, sql: String, values: Values) -> Result<Vec<(String, String)>> {
        let params = bind_values(values)?;
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, duckdb::Error>>()?;
            Ok(rows)
        })
        .await
    }

    async fn execute(&self, sql: String, values: Values) -> Result<usize> {
        let params = bind_values(values)?;
        self.with_connection(move |conn| Ok(conn.execute(&sql, params_from_iter(params))?))
            .await
    }
}

fn page_query(predicate: &Predicate, after: Option<&str>, limit: usize) -> (String, Values) {
    let mut cond = Condition::all().add(condition(predicate));
    if let Some(after) = after {
        cond = cond.add(Expr::col(Records::Id).gt(after));
    }
    let (sql, values) = Query::select()
        .columns([Records::Id, Records::Body])
        .from(Records::Table)
        .cond_where(cond)
        .order_by(Records::Id, Order::Asc)
        .build(SqliteQueryBuilder);
    // The page size is an integer we own; inline it rather than bind LIMIT
    (format!("{sql} LIMIT {limit}"), values)
}

fn condition(predicate: &Predicate) -> Condition {
    match predicate {
        Predicate::All => Condition::all(),
        Predicate::IdEquals(id) => Condition::all().add(Expr::col(Records::Id).eq(id.as_str())),
        Predicate::TimestampBefore(instant) => {
            Condition::all().add(Expr::col(Records::TsMicros).lt(instant.timestamp_micros()))
        }
        Predicate::And(parts) => parts
            .iter()
            .fold(Condition::all(), |acc, part| acc.add(condition(part))),
    }
}

fn bind_values(values: Values) -> Result<Vec<DuckValue>> {
    values.0.into_iter().map(bind_value).collect()
}

fn bind_value(value: SqlValue) -> Result<DuckValue> {
    Ok(match value {
        SqlValue::String(Some(text)) => DuckValue::Text(text.to_string()),
        SqlValue::BigInt(Some(v)) => DuckValue::BigInt(v),
        SqlValue::BigUnsigned(Some(v)) => DuckValue::UBigInt(v),
        SqlValue::Int(Some(v)) => DuckValue::Int(v),
        SqlValue::Unsigned(Some(v)) => DuckValue::UInt(v),
        SqlValue::String(None)
        | SqlValue::BigInt(None)
        | SqlValue::BigUnsigned(None)
        | SqlValue::Int(None)
        | SqlValue::Unsigned(None) => DuckValue::Null,
        other => {
            return Err(TieringError::HotStore(format!(
                "unsupported query parameter {other:?}"
            )));
        }
    })
}

#[async_trait]
impl HotStore for DuckHotStore {
    async fn query_page(
        &self,
        predicate: &Predicate,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page> {
        let (sql, values) = page_query(predicate, after, limit);
        debug!("hot query {sql}", sql: sql.as_str());

        let rows = self.select_rows(sql, values).await?;
        Ok(Page::from_rows(rows, limit))
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        let (sql, values) = Query::select()
            .columns([Records::Id, Records::Body])
            .from(Records::Table)
            .cond_where(Condition::all().add(Expr::col(Records::Id).eq(id)))
            .build(SqliteQueryBuilder);
        self.select_rows(sql, values)
            .await?
            .into_iter()
            .next()
            .map(|(_, body)| Record::from_slice(body.as_bytes()))
            .transpose()
    }

    async fn delete(&self, id: &str, partition_key: &str) -> Result<bool> {
        let (sql, values) = Query::delete()
            .from_table(Records::Table)
            .cond_where(
                Condition::all()
                    .add(Expr::col(Records::Id).eq(id))
                    .add(Expr::col(Records::PartitionKey).eq(partition_key)),
            )
            .build(SqliteQueryBuilder);
        Ok(self.execute(sql, values).await? > 0)
    }

    async fn upsert(&self, record: &Record) -> Result<()> {
        let body = String::from_utf8(record.to_canonical_bytes()?)
            .map_err(|e| TieringError::Validation(format!("record is not UTF-8: {e}")))?;
        let ts_micros: Option<i64> = record.timestamp().map(|ts| ts.timestamp_micros());

        let (sql, values) = Query::insert()
            .into_table(Records::Table)
            .columns([
                Records::Id,
                Records::PartitionKey,
                Records::TsMicros,
                Records::Body,
            ])
            .values([
                record.id().into(),
                record.partition_key().into(),
                ts_micros.into(),
                body.into(),
            ])
            .map_err(|e| TieringError::HotStore(e.to_string()))?
            .on_conflict(
                OnConflict::column(Records::Id)
                    .update_columns([Records::PartitionKey, Records::TsMicros, Records::Body])
                    .to_owned(),
            )
            .build(SqliteQueryBuilder);
        _ = self.execute(sql, values).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_timestamp;
    use crate::cold::ColdStore;
    use serde_json::json;

    fn record(id: &str, ts: Option<&str>) -> Record {
        let mut value = json!({"id": id, "partitionKey": "p1", "amount": 3.5});
        if let Some(ts) = ts {
            value["timestamp"] = json!(ts);
        }
        Record::from_value(value).expect("record")
    }

    #[tokio::test]
    async fn test_upsert_get_delete() {
        let store = DuckHotStore::open_in_memory().expect("open");
        let original = record("acct-1", Some("2023-01-01T00:00:00Z"));
        store.upsert(&original).await.expect("insert");
        assert_eq!(store.get("acct-1").await.expect("get"), Some(original.clone()));

        let changed = Record::from_value(json!({"id": "acct-1", "partitionKey": "p1", "amount": 4}))
            .expect("record");
        store.upsert(&changed).await.expect("replace");
        assert_eq!(store.get("acct-1").await.expect("get"), Some(changed));

        assert!(!store.delete("acct-1", "other").await.expect("delete"));
        assert!(store.delete("acct-1", "p1").await.expect("delete"));
        assert!(!store.delete("acct-1", "p1").await.expect("delete again"));
        assert_eq!(store.get("acct-1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_timestamp_predicate_and_pagination() {
        let store = DuckHotStore::open_in_memory().expect("open");
        for (id, ts) in [
            ("a", Some("2023-01-01T00:00:00Z")),
            ("b", Some("2023-02-01T00:00:00")),
            ("c", Some("2023-12-01T00:00:00Z")),
            ("d", None),
            ("e", Some("2023-03-01T00:00:00+01:00")),
        ] {
            store.upsert(&record(id, ts)).await.expect("insert");
        }
        let before =
            Predicate::TimestampBefore(parse_timestamp("2023-06-01T00:00:00Z").expect("ts"));

        let first = store.query_page(&before, None, 2).await.expect("page");
        let ids: Vec<_> = first.records.iter().map(Record::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(first.next.as_deref(), Some("b"));

        let second = store
            .query_page(&before, first.next.as_deref(), 2)
            .await
            .expect("page");
        let ids: Vec<_> = second.records.iter().map(Record::id).collect();
        assert_eq!(ids, vec!["e"]);
        assert_eq!(second.next, None);

        let one = store
            .query_page(&Predicate::IdEquals("d".to_string()), None, 10)
            .await
            .expect("page");
        assert_eq!(one.records.len(), 1);
    }

    #[tokio::test]
    async fn test_query_page_runs_on_spawned_task() {
        let store = DuckHotStore::open_in_memory().expect("open");
        store
            .upsert(&record("a", Some("2023-01-01T00:00:00Z")))
            .await
            .expect("insert");
        let cutoff = parse_timestamp("2023-06-01T00:00:00Z").expect("ts");
        let page = tokio::spawn(async move {
            store
                .query_page(&Predicate::TimestampBefore(cutoff), Some(""), 10)
                .await
        })
        .await
        .expect("join")
        .expect("page");
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HotConfig {
            path: dir.path().join("hot.duckdb").display().to_string(),
        };
        {
            let store = DuckHotStore::open(&config).expect("open");
            store.upsert(&record("kept", None)).await.expect("insert");
        }
        let store = DuckHotStore::open(&config).expect("reopen");
        assert!(store.get("kept").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_awkward_ids_are_bound_not_interpolated() {
        let store = DuckHotStore::open_in_memory().expect("open");
        let tricky = Record::from_value(json!({
            "id": "o'brien; DROP TABLE records",
            "partitionKey": "p",
        }))
        .expect("record");
        store.upsert(&tricky).await.expect("insert");
        assert!(store.get(tricky.id()).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_undecodable_row_does_not_stop_sweep() {
        use crate::cold::ObjectColdStore;
        use crate::config::TieringConfig;
        use crate::mover::Mover;
        use crate::report::Stage;
        use std::time::Duration;
        use tokio_util::sync::CancellationToken;

        let store = DuckHotStore::open_in_memory().expect("open");
        store
            .upsert(&record("a", Some("2023-01-01T00:00:00Z")))
            .await
            .expect("insert");
        store
            .upsert(&record("c", Some("2023-01-01T00:00:00Z")))
            .await
            .expect("insert");
        // written by some other producer, bypassing upsert
        _ = store
            .execute(
                "INSERT INTO records VALUES ('b', 'p1', 0, '{not json')".to_string(),
                Values(Vec::new()),
            )
            .await
            .expect("raw insert");

        let mut config = TieringConfig::default();
        config.archival.page_size = 2;
        let cold = ObjectColdStore::in_memory();
        let mover = Mover::new(Arc::new(store.clone()), Arc::new(cold.clone()), &config);
        let now = parse_timestamp("2024-01-01T00:00:00Z").expect("now");
        let report = mover
            .sweep(Duration::from_secs(90 * 24 * 60 * 60), now, &CancellationToken::new())
            .await
            .expect("sweep completes");

        assert_eq!(report.archived, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].id, "b");
        assert_eq!(report.errors[0].stage, Stage::Decode);
        assert!(store.get("a").await.expect("get").is_none());
        assert!(store.get("c").await.expect("get").is_none());
        assert!(cold.get("c.json.gz").await.is_ok());
        assert!(cold.get("b.json.gz").await.is_err());
    }
}
