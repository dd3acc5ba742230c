//! SQLite-backed node registry
//!
//! Mutations are staged in memory under their session and written to the
//! database in a single transaction when the session commits, so a partial
//! launch batch is never visible to other readers.

use super::DbPool;
use crate::registry::{parse_node_state, Nic, NodeRecord, NodeRegistry, RegistrySession};
use anyhow::{Context, Result};
use chrono::Utc;
use gantry_common::NodeName;
use std::collections::HashMap;
use std::sync::Mutex;

/// A staged mutation awaiting commit
#[derive(Debug, Clone)]
enum PendingOp {
    Add(NodeRecord),
    Update(NodeRecord),
    Delete(NodeName),
}

/// Registry gateway backed by the adapter database
pub struct SqliteRegistry {
    pool: DbPool,
    pending: Mutex<HashMap<String, Vec<PendingOp>>>,
}

impl SqliteRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn stage(&self, session: &RegistrySession, op: PendingOp) {
        let mut pending = self.pending.lock().unwrap();
        pending.entry(session.id().to_string()).or_default().push(op);
    }

    /// Node rows currently visible in the database, ordered by name
    pub async fn committed_nodes(&self) -> Result<Vec<NodeRecord>> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT name, state, hardware_profile, software_profile, nics, session_id
             FROM nodes ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }
}

fn row_to_record(
    (name, state, hardware_profile, software_profile, nics, session_id): (
        String,
        String,
        String,
        String,
        String,
        String,
    ),
) -> Result<NodeRecord> {
    let nics: Vec<Nic> =
        serde_json::from_str(&nics).context("Malformed nics column in nodes table")?;

    Ok(NodeRecord {
        name: NodeName::new(name),
        state: parse_node_state(&state),
        hardware_profile,
        software_profile,
        nics,
        session_id,
    })
}

impl NodeRegistry for SqliteRegistry {
    async fn add_node(&self, session: &RegistrySession, node: &NodeRecord) -> Result<()> {
        self.stage(session, PendingOp::Add(node.clone()));
        Ok(())
    }

    async fn update_node(&self, session: &RegistrySession, node: &NodeRecord) -> Result<()> {
        self.stage(session, PendingOp::Update(node.clone()));
        Ok(())
    }

    async fn delete_node(&self, session: &RegistrySession, name: &NodeName) -> Result<()> {
        self.stage(session, PendingOp::Delete(name.clone()));
        Ok(())
    }

    async fn commit(&self, session: &RegistrySession) -> Result<()> {
        let ops = {
            let mut pending = self.pending.lock().unwrap();
            pending.remove(session.id()).unwrap_or_default()
        };

        if ops.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for op in &ops {
            match op {
                PendingOp::Add(node) => {
                    let nics_json = serde_json::to_string(&node.nics)?;
                    sqlx::query(
                        "INSERT INTO nodes
                         (name, state, hardware_profile, software_profile, nics,
                          session_id, created_at, updated_at)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(node.name.as_str())
                    .bind(node.state.as_str())
                    .bind(&node.hardware_profile)
                    .bind(&node.software_profile)
                    .bind(&nics_json)
                    .bind(&node.session_id)
                    .bind(&now)
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
                }
                PendingOp::Update(node) => {
                    let nics_json = serde_json::to_string(&node.nics)?;
                    sqlx::query(
                        "UPDATE nodes SET state = ?, nics = ?, updated_at = ?
                         WHERE name = ?",
                    )
                    .bind(node.state.as_str())
                    .bind(&nics_json)
                    .bind(&now)
                    .bind(node.name.as_str())
                    .execute(&mut *tx)
                    .await?;
                }
                PendingOp::Delete(name) => {
                    sqlx::query("DELETE FROM nodes WHERE name = ?")
                        .bind(name.as_str())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeState;
    use crate::store::open_test_db;

    fn test_node(name: &str, session: &RegistrySession) -> NodeRecord {
        NodeRecord::placeholder(NodeName::from(name), "compute", "default", session)
    }

    #[tokio::test]
    async fn test_add_is_invisible_until_commit() {
        let pool = open_test_db().await.unwrap();
        let registry = SqliteRegistry::new(pool.clone());
        let session = RegistrySession::open();

        registry
            .add_node(&session, &test_node("compute-01.cluster", &session))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        registry.commit(&session).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_update_transitions_state() {
        let pool = open_test_db().await.unwrap();
        let registry = SqliteRegistry::new(pool.clone());
        let session = RegistrySession::open();

        let mut node = test_node("compute-02.cluster", &session);
        registry.add_node(&session, &node).await.unwrap();
        registry.commit(&session).await.unwrap();

        node.state = NodeState::Provisioned;
        node.nics = vec![Nic {
            ip: "10.0.0.7".parse().unwrap(),
            boot: true,
        }];
        registry.update_node(&session, &node).await.unwrap();
        registry.commit(&session).await.unwrap();

        let state: String =
            sqlx::query_scalar("SELECT state FROM nodes WHERE name = 'compute-02.cluster'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(state, "provisioned");

        let nodes = registry.committed_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].boot_ip(), Some("10.0.0.7".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let pool = open_test_db().await.unwrap();
        let registry = SqliteRegistry::new(pool.clone());
        let session = RegistrySession::open();

        let node = test_node("compute-03.cluster", &session);
        registry.add_node(&session, &node).await.unwrap();
        registry.commit(&session).await.unwrap();

        registry.delete_node(&session, &node.name).await.unwrap();
        registry.commit(&session).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_add_and_delete_in_one_commit() {
        // A rollback staged before the commit leaves no trace
        let pool = open_test_db().await.unwrap();
        let registry = SqliteRegistry::new(pool.clone());
        let session = RegistrySession::open();

        let node = test_node("compute-04.cluster", &session);
        registry.add_node(&session, &node).await.unwrap();
        registry.delete_node(&session, &node.name).await.unwrap();
        registry.commit(&session).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_sessions_stage_independently() {
        let pool = open_test_db().await.unwrap();
        let registry = SqliteRegistry::new(pool.clone());
        let session_a = RegistrySession::open();
        let session_b = RegistrySession::open();

        registry
            .add_node(&session_a, &test_node("compute-05.cluster", &session_a))
            .await
            .unwrap();
        registry
            .add_node(&session_b, &test_node("compute-06.cluster", &session_b))
            .await
            .unwrap();

        // Committing B must not flush A's staged ops
        registry.commit(&session_b).await.unwrap();

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM nodes ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(names, vec!["compute-06.cluster".to_string()]);

        registry.commit(&session_a).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_commit_with_nothing_staged() {
        let pool = open_test_db().await.unwrap();
        let registry = SqliteRegistry::new(pool);
        let session = RegistrySession::open();

        registry.commit(&session).await.unwrap();
    }
}
