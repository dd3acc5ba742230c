//! Instance-metadata cache
//!
//! Maps a node name to the provider identity recorded when its launch was
//! confirmed. Decommission reads this instead of searching the provider; a
//! missing entry means the instance is already gone. Entries are written
//! strictly after a confirmed launch and soft-deleted strictly after a
//! confirmed termination, so readers filter on `deleted_at IS NULL`.

use super::DbPool;
use anyhow::Result;
use chrono::Utc;
use gantry_common::{InstanceId, NodeName};

/// Cached provider identity for one provisioned node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCacheEntry {
    pub instance_id: InstanceId,
    pub compartment_id: String,
    pub shape: String,
    pub vcpus: u32,
}

/// SQLite-backed instance cache
#[derive(Debug, Clone)]
pub struct InstanceCache {
    pool: DbPool,
}

impl InstanceCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up the live entry for a node name
    pub async fn get(&self, name: &NodeName) -> Result<Option<InstanceCacheEntry>> {
        let row: Option<(String, String, String, i64)> = sqlx::query_as(
            "SELECT instance_id, compartment_id, shape, vcpus FROM instances
             WHERE node_name = ? AND deleted_at IS NULL",
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(
            row.map(|(instance_id, compartment_id, shape, vcpus)| InstanceCacheEntry {
                instance_id: InstanceId::new(instance_id),
                compartment_id,
                shape,
                vcpus: vcpus as u32,
            }),
        )
    }

    /// Record the provider identity for a node
    ///
    /// Replaces any previous row for the name, including a tombstone left by
    /// an earlier decommission of the same name.
    pub async fn set(&self, name: &NodeName, entry: &InstanceCacheEntry) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT OR REPLACE INTO instances
             (node_name, instance_id, compartment_id, shape, vcpus, created_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(name.as_str())
        .bind(entry.instance_id.as_str())
        .bind(&entry.compartment_id)
        .bind(&entry.shape)
        .bind(entry.vcpus as i64)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark the entry for a node as deleted
    pub async fn delete(&self, name: &NodeName) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE instances SET deleted_at = ?
             WHERE node_name = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(name.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All live entries, ordered by node name
    pub async fn list(&self) -> Result<Vec<(NodeName, InstanceCacheEntry)>> {
        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT node_name, instance_id, compartment_id, shape, vcpus FROM instances
             WHERE deleted_at IS NULL ORDER BY node_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, instance_id, compartment_id, shape, vcpus)| {
                (
                    NodeName::new(name),
                    InstanceCacheEntry {
                        instance_id: InstanceId::new(instance_id),
                        compartment_id,
                        shape,
                        vcpus: vcpus as u32,
                    },
                )
            })
            .collect())
    }
}
