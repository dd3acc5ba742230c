//! CLI operations for the adapter database

use super::registry::SqliteRegistry;
use super::{DbPool, InstanceCache};
use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};

/// List committed registry nodes
pub async fn list_nodes(pool: &DbPool) -> Result<()> {
    let registry = SqliteRegistry::new(pool.clone());
    let nodes = registry.committed_nodes().await?;

    if nodes.is_empty() {
        println!("No registered nodes");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name"),
            Cell::new("State"),
            Cell::new("Hardware"),
            Cell::new("Software"),
            Cell::new("Boot IP"),
            Cell::new("Session"),
        ]);

    for node in nodes {
        let boot_ip = node
            .boot_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(node.name.as_str()),
            Cell::new(node.state.as_str()),
            Cell::new(&node.hardware_profile),
            Cell::new(&node.software_profile),
            Cell::new(boot_ip),
            Cell::new(&node.session_id),
        ]);
    }

    println!("{table}");

    Ok(())
}

/// List instance-cache entries, optionally including soft-deleted rows
pub async fn list_cache(pool: &DbPool, include_deleted: bool) -> Result<()> {
    if include_deleted {
        return list_cache_with_deleted(pool).await;
    }

    let cache = InstanceCache::new(pool.clone());
    let entries = cache.list().await?;

    if entries.is_empty() {
        println!("No cached instances");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node"),
            Cell::new("Instance"),
            Cell::new("Shape"),
            Cell::new("vCPUs"),
        ]);

    for (name, entry) in entries {
        table.add_row(vec![
            Cell::new(name.as_str()),
            Cell::new(entry.instance_id.as_str()),
            Cell::new(&entry.shape),
            Cell::new(entry.vcpus.to_string()),
        ]);
    }

    println!("{table}");

    Ok(())
}

/// Like [`list_cache`], but with tombstones and their deletion time
async fn list_cache_with_deleted(pool: &DbPool) -> Result<()> {
    let rows: Vec<(String, String, String, i64, Option<String>)> = sqlx::query_as(
        "SELECT node_name, instance_id, shape, vcpus, deleted_at
         FROM instances ORDER BY node_name",
    )
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        println!("No cached instances");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node"),
            Cell::new("Instance"),
            Cell::new("Shape"),
            Cell::new("vCPUs"),
            Cell::new("Deleted"),
        ]);

    for (name, instance_id, shape, vcpus, deleted_at) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(instance_id),
            Cell::new(shape),
            Cell::new(vcpus.to_string()),
            Cell::new(deleted_at.unwrap_or_else(|| "-".to_string())),
        ]);
    }

    println!("{table}");

    Ok(())
}

/// Remove stale cache tombstones from the database
pub async fn prune_database(pool: &DbPool, older_than_days: u32) -> Result<()> {
    let cutoff = format!("-{older_than_days} days");

    let result = sqlx::query(
        "DELETE FROM instances
         WHERE deleted_at IS NOT NULL
         AND datetime(deleted_at) < datetime('now', ?)",
    )
    .bind(&cutoff)
    .execute(pool)
    .await?;

    println!("Pruned {} cached instance records", result.rows_affected());

    Ok(())
}
