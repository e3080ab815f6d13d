use rusqlite::params;
use uuid::Uuid;

use super::*;

impl EnrichmentDb {
    /// Append an entry to the `enrichment_log` audit trail.
    pub fn insert_enrichment_log(
        &self,
        entity_type: &str,
        entity_id: &str,
        source: &str,
        outcome: &str,
        fields_updated: &[String],
        raw_payload: Option<&str>,
    ) -> Result<(), DbError> {
        let id = format!("el-{}", Uuid::new_v4());
        let fields_json = serde_json::to_string(fields_updated).unwrap_or_else(|_| "[]".to_string());

        self.conn.execute(
            "INSERT INTO enrichment_log
                (id, entity_type, entity_id, source, outcome, fields_updated, raw_payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                entity_type,
                entity_id,
                source,
                outcome,
                fields_json,
                raw_payload,
                crate::util::now_timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Audit entries for one entity, oldest first.
    pub fn list_enrichment_log(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<DbEnrichmentLogEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, source, outcome, fields_updated, raw_payload, created_at
             FROM enrichment_log
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![entity_type, entity_id], |row| {
            let fields_json: String = row.get(5)?;
            Ok(DbEnrichmentLogEntry {
                id: row.get(0)?,
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
                source: row.get(3)?,
                outcome: row.get(4)?,
                fields_updated: serde_json::from_str(&fields_json).unwrap_or_default(),
                raw_payload: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
