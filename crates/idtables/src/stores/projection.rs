//! Writes that fan one record out to its projection tables.
//!
//! Projections are written one round trip at a time in declaration order.
//! A failure stops the sequence; rows already written stay written.

use serde::Serialize;

use idtables_core::storage::{Projection, Result, TableStore};

use crate::tables::TableAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Fail with `Conflict` on an existing row.
    Insert,
    /// Overwrite whatever is there.
    Replace,
}

/// Maps `NotFound` to success.
pub(crate) fn ignore_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

pub(crate) async fn write_projections<S, T>(
    access: &TableAccess<S>,
    projections: &[Projection<T>],
    record: &T,
    mode: WriteMode,
) -> Result<()>
where
    S: TableStore,
    T: Serialize + Sync,
{
    let mut written: Vec<&'static str> = Vec::with_capacity(projections.len());

    for projection in projections {
        let Some(key) = projection.key_for(record) else {
            continue;
        };

        let result = match mode {
            WriteMode::Insert => access.insert(projection.table, record, &key).await,
            WriteMode::Replace => access.insert_or_replace(projection.table, record, &key).await,
        };

        if let Err(err) = result {
            if !written.is_empty() {
                tracing::warn!(
                    failed = projection.table,
                    written = ?written,
                    error = %err,
                    "Projection write aborted partway"
                );
            }
            return Err(err);
        }
        written.push(projection.table);
    }

    Ok(())
}

/// Deletes every projection row of `record`. A missing row aborts with `NotFound`.
pub(crate) async fn delete_projections<S, T>(
    access: &TableAccess<S>,
    projections: &[Projection<T>],
    record: &T,
) -> Result<()>
where
    S: TableStore,
    T: Sync,
{
    let mut deleted: Vec<&'static str> = Vec::with_capacity(projections.len());

    for projection in projections {
        let Some(key) = projection.key_for(record) else {
            continue;
        };

        if let Err(err) = access.delete(projection.table, &key).await {
            if !deleted.is_empty() {
                tracing::warn!(
                    failed = projection.table,
                    deleted = ?deleted,
                    error = %err,
                    "Projection delete aborted partway"
                );
            }
            return Err(err);
        }
        deleted.push(projection.table);
    }

    Ok(())
}

/// Deletes rows `previous` occupied under keys that `current` no longer derives.
pub(crate) async fn remove_stale_projections<S, T>(
    access: &TableAccess<S>,
    projections: &[Projection<T>],
    previous: &T,
    current: &T,
) -> Result<()>
where
    S: TableStore,
    T: Sync,
{
    for projection in projections {
        if let Some(key) = projection.stale_key(previous, current) {
            tracing::debug!(table = projection.table, key = %key, "Removing stale projection");
            ignore_missing(access.delete(projection.table, &key).await)?;
        }
    }
    Ok(())
}

/// Rewrites every projection of `current`, first dropping rows the previous
/// version left under keys that changed.
pub(crate) async fn replace_projections<S, T>(
    access: &TableAccess<S>,
    projections: &[Projection<T>],
    previous: Option<&T>,
    current: &T,
) -> Result<()>
where
    S: TableStore,
    T: Serialize + Sync,
{
    if let Some(previous) = previous {
        remove_stale_projections(access, projections, previous, current).await?;
    }
    write_projections(access, projections, current, WriteMode::Replace).await
}
