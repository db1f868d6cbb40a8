use anyhow::Context;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::engine::{BandDraft, GradeBand, PassStatus};

/// Owner-scoped persistence contract for grade bands. The engine only ever
/// talks to this trait, so its behaviour can be unit-tested without a
/// database behind it.
pub trait BandStore {
    fn list(&self, owner: &str) -> anyhow::Result<Vec<GradeBand>>;
    fn get(&self, owner: &str, id: &str) -> anyhow::Result<Option<GradeBand>>;
    fn insert(&self, owner: &str, draft: BandDraft) -> anyhow::Result<GradeBand>;
    fn insert_many(&self, owner: &str, drafts: Vec<BandDraft>) -> anyhow::Result<Vec<GradeBand>>;
    fn update(&self, owner: &str, id: &str, draft: BandDraft) -> anyhow::Result<Option<GradeBand>>;
    fn delete(&self, owner: &str, id: &str) -> anyhow::Result<bool>;
    fn delete_all(&self, owner: &str) -> anyhow::Result<usize>;
    fn count(&self, owner: &str) -> anyhow::Result<usize>;
}

pub struct SqliteBandStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteBandStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

const BAND_COLUMNS: &str = "id, owner, label, min_marks, max_marks, status, sort_order, updated_at";

fn row_to_band(row: &rusqlite::Row<'_>) -> rusqlite::Result<GradeBand> {
    let status_raw: String = row.get(5)?;
    Ok(GradeBand {
        id: row.get(0)?,
        owner: row.get(1)?,
        label: row.get(2)?,
        min_marks: row.get(3)?,
        max_marks: row.get(4)?,
        status: PassStatus::parse(&status_raw).unwrap_or(PassStatus::Pass),
        sort_order: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn now_ts() -> String {
    Utc::now().to_rfc3339()
}

fn insert_band(
    conn: &Connection,
    owner: &str,
    draft: BandDraft,
) -> anyhow::Result<GradeBand> {
    let band = GradeBand {
        id: Uuid::new_v4().to_string(),
        owner: owner.to_string(),
        label: draft.label,
        min_marks: draft.min_marks,
        max_marks: draft.max_marks,
        status: draft.status,
        sort_order: draft.sort_order,
        updated_at: Some(now_ts()),
    };
    conn.execute(
        "INSERT INTO grade_bands(id, owner, label, min_marks, max_marks, status, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &band.id,
            &band.owner,
            &band.label,
            band.min_marks,
            band.max_marks,
            band.status.as_str(),
            band.sort_order,
            &band.updated_at,
        ),
    )
    .context("failed to insert grade band")?;
    Ok(band)
}

impl BandStore for SqliteBandStore<'_> {
    fn list(&self, owner: &str) -> anyhow::Result<Vec<GradeBand>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM grade_bands WHERE owner = ? ORDER BY sort_order, min_marks",
            BAND_COLUMNS
        ))?;
        let bands = stmt
            .query_map([owner], row_to_band)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bands)
    }

    fn get(&self, owner: &str, id: &str) -> anyhow::Result<Option<GradeBand>> {
        let band = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM grade_bands WHERE id = ? AND owner = ?",
                    BAND_COLUMNS
                ),
                (id, owner),
                row_to_band,
            )
            .optional()?;
        Ok(band)
    }

    fn insert(&self, owner: &str, draft: BandDraft) -> anyhow::Result<GradeBand> {
        insert_band(self.conn, owner, draft)
    }

    fn insert_many(&self, owner: &str, drafts: Vec<BandDraft>) -> anyhow::Result<Vec<GradeBand>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut out = Vec::with_capacity(drafts.len());
        for draft in drafts {
            out.push(insert_band(&tx, owner, draft)?);
        }
        tx.commit()?;
        Ok(out)
    }

    fn update(&self, owner: &str, id: &str, draft: BandDraft) -> anyhow::Result<Option<GradeBand>> {
        let changed = self.conn.execute(
            "UPDATE grade_bands
             SET label = ?, min_marks = ?, max_marks = ?, status = ?, sort_order = ?, updated_at = ?
             WHERE id = ? AND owner = ?",
            (
                &draft.label,
                draft.min_marks,
                draft.max_marks,
                draft.status.as_str(),
                draft.sort_order,
                now_ts(),
                id,
                owner,
            ),
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.get(owner, id)
    }

    fn delete(&self, owner: &str, id: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM grade_bands WHERE id = ? AND owner = ?",
            (id, owner),
        )?;
        Ok(changed > 0)
    }

    fn delete_all(&self, owner: &str) -> anyhow::Result<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM grade_bands WHERE owner = ?", [owner])?;
        Ok(changed)
    }

    fn count(&self, owner: &str) -> anyhow::Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM grade_bands WHERE owner = ?",
            [owner],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }
}

#[cfg(test)]
pub use memory::MemoryBandStore;
