use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::UploadRow;

impl Database {
    pub fn insert_upload(&self, upload: &UploadRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO uploads (id, owner_id, mime, kind, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    upload.id,
                    upload.owner_id,
                    upload.mime,
                    upload.kind,
                    upload.size,
                    upload.sha256,
                    upload.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_upload(&self, id: &str) -> Result<Option<UploadRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, owner_id, mime, kind, size, sha256, created_at FROM uploads WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(UploadRow {
                            id: row.get(0)?,
                            owner_id: row.get(1)?,
                            mime: row.get(2)?,
                            kind: row.get(3)?,
                            size: row.get(4)?,
                            sha256: row.get(5)?,
                            created_at: row.get(6)?,
                        })
                    },
                )
                .optional()?)
        })
    }
}
