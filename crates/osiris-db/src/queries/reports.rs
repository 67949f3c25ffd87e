use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::ReportRow;
use crate::queries::comments::delete_comment_cascade;
use crate::queries::posts::delete_post_cascade;
use crate::queries::{as_params, placeholders};
use crate::{Database, now};

const REPORT_COLUMNS: &str = "id, reporter_id, target_type, target_id, community_id, reason, status, resolved_by, resolution_note, created_at, resolved_at";

impl Database {
    pub fn insert_report(
        &self,
        id: &str,
        reporter_id: &str,
        target_type: &str,
        target_id: &str,
        community_id: Option<&str>,
        reason: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports (id, reporter_id, target_type, target_id, community_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, reporter_id, target_type, target_id, community_id, reason, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_report(&self, id: &str) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| query_report(conn, id))
    }

    pub fn has_pending_report(&self, reporter_id: &str, target_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM reports WHERE reporter_id = ?1 AND target_id = ?2 AND status = 'pending')",
                [reporter_id, target_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Newest first. `communities = None` lists every report; `Some` restricts
    /// to reports filed inside those communities.
    pub fn list_reports(&self, status: Option<&str>, communities: Option<&[String]>) -> Result<Vec<ReportRow>> {
        if let Some(ids) = communities {
            if ids.is_empty() {
                return Ok(vec![]);
            }
        }

        self.with_conn(|conn| {
            let mut values: Vec<String> = communities.map(|ids| ids.to_vec()).unwrap_or_default();
            let mut clauses = Vec::new();
            if !values.is_empty() {
                clauses.push(format!("community_id IN ({})", placeholders(values.len())));
            }
            if let Some(status) = status {
                values.push(status.to_string());
                clauses.push(format!("status = ?{}", values.len()));
            }
            let filter = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };
            let sql = format!(
                "SELECT {} FROM reports {} ORDER BY created_at DESC, rowid DESC",
                REPORT_COLUMNS, filter
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(&values).as_slice(), map_report)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Resolve a pending report, optionally deleting its target with the usual
    /// cascade. Every other pending report on the same target is resolved with it.
    /// Returns the reports that changed state.
    pub fn resolve_report(
        &self,
        id: &str,
        resolver_id: &str,
        note: Option<&str>,
        delete_target: bool,
    ) -> Result<Vec<ReportRow>> {
        self.with_tx(|conn| {
            let Some(report) = query_report(conn, id)? else {
                bail!("report {} not found", id);
            };
            if report.status != "pending" {
                bail!("report {} is already {}", id, report.status);
            }

            if delete_target {
                match report.target_type.as_str() {
                    "comment" => {
                        delete_comment_cascade(conn, &report.target_id)?;
                    }
                    _ => {
                        delete_post_cascade(conn, &report.target_id)?;
                    }
                }
            }

            let affected: Vec<String> = {
                let mut stmt = conn.prepare(
                    "SELECT id FROM reports WHERE target_id = ?1 AND status = 'pending' ORDER BY created_at",
                )?;
                stmt.query_map([&report.target_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            let resolved_at = now();
            conn.execute(
                "UPDATE reports SET status = 'resolved', resolved_by = ?2, resolution_note = ?3, resolved_at = ?4
                 WHERE target_id = ?1 AND status = 'pending'",
                rusqlite::params![report.target_id, resolver_id, note, resolved_at],
            )?;

            let mut changed = Vec::with_capacity(affected.len());
            for report_id in &affected {
                if let Some(row) = query_report(conn, report_id)? {
                    changed.push(row);
                }
            }
            Ok(changed)
        })
    }

    /// Returns false unless the report was pending.
    pub fn reject_report(&self, id: &str, resolver_id: &str, note: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE reports SET status = 'rejected', resolved_by = ?2, resolution_note = ?3, resolved_at = ?4
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id, resolver_id, note, now()],
            )?;
            Ok(updated > 0)
        })
    }
}

fn query_report(conn: &Connection, id: &str) -> Result<Option<ReportRow>> {
    let sql = format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_report).optional()?)
}

fn map_report(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        target_type: row.get(2)?,
        target_id: row.get(3)?,
        community_id: row.get(4)?,
        reason: row.get(5)?,
        status: row.get(6)?,
        resolved_by: row.get(7)?,
        resolution_note: row.get(8)?,
        created_at: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    fn report(db: &Database, reporter: &str, target_type: &str, target: &str, community: Option<&str>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.insert_report(&id, reporter, target_type, target, community, "rude").unwrap();
        id
    }

    #[test]
    fn resolving_with_delete_cascades_and_closes_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "author");
        let a = fixtures::user(&db, "a");
        let b = fixtures::user(&db, "b");
        let post = fixtures::post(&db, &author, None);
        fixtures::comment(&db, &post, &a, None);
        let first = report(&db, &a, "post", &post, None);
        report(&db, &b, "post", &post, None);

        let changed = db.resolve_report(&first, &author, Some("removed"), true).unwrap();
        assert_eq!(changed.len(), 2);
        assert!(changed.iter().all(|r| r.status == "resolved"));
        assert!(db.get_post(&post, None).unwrap().is_none());
        assert!(db.list_comments(&post, None).unwrap().is_empty());

        assert!(db.resolve_report(&first, &author, None, false).is_err());
    }

    #[test]
    fn reject_only_applies_to_pending() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "author");
        let a = fixtures::user(&db, "a");
        let post = fixtures::post(&db, &author, None);
        let id = report(&db, &a, "post", &post, None);

        assert!(db.has_pending_report(&a, &post).unwrap());
        assert!(db.reject_report(&id, &author, None).unwrap());
        assert!(!db.reject_report(&id, &author, None).unwrap());
        assert!(!db.has_pending_report(&a, &post).unwrap());
        assert!(db.get_post(&post, None).unwrap().is_some());
    }

    #[test]
    fn listing_filters_by_community_and_status() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "author");
        let a = fixtures::user(&db, "a");
        let post = fixtures::post(&db, &author, None);
        report(&db, &a, "post", &post, Some("c1"));
        let other = report(&db, &a, "comment", "x", Some("c2"));
        db.reject_report(&other, &author, None).unwrap();

        assert_eq!(db.list_reports(None, None).unwrap().len(), 2);
        assert_eq!(db.list_reports(None, Some(&["c1".to_string()])).unwrap().len(), 1);
        assert_eq!(db.list_reports(Some("rejected"), None).unwrap().len(), 1);
        assert!(db.list_reports(Some("pending"), Some(&["c2".to_string()])).unwrap().is_empty());
        assert!(db.list_reports(None, Some(&[])).unwrap().is_empty());
    }
}
