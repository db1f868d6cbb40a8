use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "classora.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    // Field-range rules live here as schema constraints; the engine layers
    // its own interval checks on top.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_bands(
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            label TEXT NOT NULL,
            min_marks REAL NOT NULL CHECK(min_marks >= 0 AND min_marks <= 100),
            max_marks REAL NOT NULL CHECK(max_marks >= 0 AND max_marks <= 100),
            status TEXT NOT NULL DEFAULT 'PASS',
            sort_order INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            CHECK(min_marks <= max_marks)
        )",
        [],
    )?;

    // Workspaces created before the updatedAt stamp lack the column.
    ensure_grade_bands_updated_at(&conn)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_bands_owner ON grade_bands(owner)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_bands_owner_min ON grade_bands(owner, min_marks)",
        [],
    )?;

    Ok(conn)
}

fn ensure_grade_bands_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "grade_bands", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE grade_bands ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
