use async_trait::async_trait;
use rusqlite::params;
use serde_json::{Map, Value};

use super::{
    check_field, generate_doc_id, CollectionPath, DocPath, DocumentGateway,
    GatewayError, OrderedQuery, Snapshot,
};
use crate::state::DbPool;

/// Document gateway backed by the `documents` table.
pub struct SqliteGateway {
    pool: DbPool,
}

impl SqliteGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn collect_snapshots(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> Result<Vec<Snapshot>, GatewayError> {
    let rows: Vec<(String, String)> = stmt
        .query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, json)| {
            Ok(Snapshot {
                id,
                data: serde_json::from_str(&json)?,
            })
        })
        .collect()
}

#[async_trait]
impl DocumentGateway for SqliteGateway {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, GatewayError> {
        let conn = self.pool.get()?;

        let result: Result<String, rusqlite::Error> = conn.query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![path.collection().as_str(), path.id()],
            |row| row.get(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Snapshot>, GatewayError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, data FROM documents WHERE collection = ?1 ORDER BY rowid")?;
        collect_snapshots(&mut stmt, params![collection.as_str()])
    }

    async fn query_eq(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Snapshot>, GatewayError> {
        check_field(field)?;
        let conn = self.pool.get()?;

        let sql = format!(
            "SELECT id, data FROM documents
             WHERE collection = ?1 AND json_extract(data, '$.{}') = json_extract(?2, '$')
             ORDER BY rowid",
            field
        );
        let mut stmt = conn.prepare(&sql)?;
        collect_snapshots(&mut stmt, params![collection.as_str(), value.to_string()])
    }

    async fn query_ordered(
        &self,
        collection: &CollectionPath,
        query: &OrderedQuery,
    ) -> Result<Vec<Snapshot>, GatewayError> {
        check_field(&query.order_by)?;
        let conn = self.pool.get()?;

        let key = format!("json_extract(data, '$.{}')", query.order_by);
        let sql = format!(
            "SELECT id, data FROM documents
             WHERE collection = ?1
               AND (?2 IS NULL
                    OR {key} < json_extract(?2, '$')
                    OR ({key} = json_extract(?2, '$') AND id < ?3))
             ORDER BY {key} DESC, id DESC
             LIMIT ?4",
        );

        let (start_key, start_id) = match &query.start_after {
            Some(pos) => (Some(pos.key.to_string()), Some(pos.id.as_str())),
            None => (None, None),
        };
        let mut stmt = conn.prepare(&sql)?;
        collect_snapshots(
            &mut stmt,
            params![collection.as_str(), start_key, start_id, query.limit as i64],
        )
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        data: Value,
    ) -> Result<DocPath, GatewayError> {
        let conn = self.pool.get()?;
        let path = collection.doc(generate_doc_id());

        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            params![
                path.collection().as_str(),
                path.id(),
                serde_json::to_string(&data)?
            ],
        )?;

        Ok(path)
    }

    async fn set(&self, path: &DocPath, data: Value) -> Result<(), GatewayError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO documents (collection, id, data)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, id) DO UPDATE SET
               data = excluded.data,
               updated_at = datetime('now')",
            params![
                path.collection().as_str(),
                path.id(),
                serde_json::to_string(&data)?
            ],
        )?;

        Ok(())
    }

    async fn update(
        &self,
        path: &DocPath,
        fields: Map<String, Value>,
    ) -> Result<(), GatewayError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let current: Result<String, rusqlite::Error> = tx.query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![path.collection().as_str(), path.id()],
            |row| row.get(0),
        );
        let current = match current {
            Ok(json) => json,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(GatewayError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let merged = match serde_json::from_str::<Value>(&current)? {
            Value::Object(mut doc) => {
                doc.extend(fields);
                Value::Object(doc)
            }
            _ => Value::Object(fields),
        };

        tx.execute(
            "UPDATE documents SET data = ?3, updated_at = datetime('now')
             WHERE collection = ?1 AND id = ?2",
            params![
                path.collection().as_str(),
                path.id(),
                serde_json::to_string(&merged)?
            ],
        )?;
        tx.commit()?;

        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), GatewayError> {
        let conn = self.pool.get()?;

        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![path.collection().as_str(), path.id()],
        )?;

        Ok(())
    }
}
