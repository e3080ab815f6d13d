use rusqlite::{params, OptionalExtension};

use super::*;
use crate::util::email_domain;

const PERSON_COLUMNS: &str = "id, owner_id, email, display_name, organization_domain, external_id,
     last_enriched_at, title, headline, profile_url, photo_url, city, region, country,
     last_seen, updated_at";

impl EnrichmentDb {
    // =========================================================================
    // People
    // =========================================================================

    /// Insert or refresh a person row on behalf of calendar sync.
    ///
    /// Only identity fields (name, domain, last_seen) are touched on conflict;
    /// enrichment fields belong to the pipeline. A missing domain is taken from
    /// the email, and the referenced organization row is created on demand.
    /// Returns true if the person was newly inserted.
    pub fn upsert_person(&self, person: &DbPerson) -> Result<bool, DbError> {
        let existed: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM people WHERE id = ?1)",
            params![person.id],
            |row| row.get(0),
        )?;

        let domain = person
            .organization_domain
            .clone()
            .or_else(|| email_domain(&person.email));
        if let Some(domain) = domain.as_deref() {
            self.upsert_organization(domain, None)?;
        }

        self.conn.execute(
            "INSERT INTO people (
                id, owner_id, email, display_name, organization_domain, external_id,
                last_enriched_at, title, headline, profile_url, photo_url, city, region,
                country, last_seen, updated_at
             ) VALUES (?1, ?2, LOWER(?3), ?4, LOWER(?5), ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                       ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, people.display_name),
                organization_domain = COALESCE(excluded.organization_domain, people.organization_domain),
                last_seen = CASE
                    WHEN excluded.last_seen > COALESCE(people.last_seen, '') THEN excluded.last_seen
                    ELSE people.last_seen
                END,
                updated_at = excluded.updated_at",
            params![
                person.id,
                person.owner_id,
                person.email,
                person.display_name,
                domain,
                person.external_id,
                person.last_enriched_at,
                person.title,
                person.headline,
                person.profile_url,
                person.photo_url,
                person.city,
                person.region,
                person.country,
                person.last_seen,
                person.updated_at,
            ],
        )?;
        Ok(!existed)
    }

    pub fn get_person(&self, id: &str) -> Result<Option<DbPerson>, DbError> {
        let sql = format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::map_person_row)
            .optional()?)
    }

    /// All people owned by `owner_id`, most recently seen first.
    pub fn list_people_for_owner(&self, owner_id: &str) -> Result<Vec<DbPerson>, DbError> {
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM people
             WHERE owner_id = ?1
             ORDER BY last_seen IS NULL, last_seen DESC, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id], Self::map_person_row)?;
        let mut people = Vec::new();
        for row in rows {
            people.push(row?);
        }
        Ok(people)
    }

    /// Find a successfully matched person with this email under any owner.
    ///
    /// `exclude_id` keeps a record from answering for itself. When
    /// `enriched_since` is set, only matches stamped at or after that
    /// timestamp qualify. The most recent match wins.
    pub fn find_matched_person_by_email(
        &self,
        email: &str,
        exclude_id: &str,
        enriched_since: Option<&str>,
    ) -> Result<Option<DbPerson>, DbError> {
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM people
             WHERE email = LOWER(?1) AND id != ?2
               AND external_id IS NOT NULL
               AND last_enriched_at IS NOT NULL
               AND (?3 IS NULL OR last_enriched_at >= ?3)
             ORDER BY last_enriched_at DESC
             LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![email, exclude_id, enriched_since], Self::map_person_row)
            .optional()?)
    }

    /// Find a durable negative entry (attempted, no match) for this email under any owner.
    pub fn find_no_match_person_by_email(
        &self,
        email: &str,
        exclude_id: &str,
        attempted_since: Option<&str>,
    ) -> Result<Option<DbPerson>, DbError> {
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM people
             WHERE email = LOWER(?1) AND id != ?2
               AND external_id IS NULL
               AND last_enriched_at IS NOT NULL
               AND (?3 IS NULL OR last_enriched_at >= ?3)
             ORDER BY last_enriched_at DESC
             LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![email, exclude_id, attempted_since], Self::map_person_row)
            .optional()?)
    }

    /// Persist enrichment fields and the attempt stamp for one person.
    pub fn update_person_enrichment(&self, person: &DbPerson) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE people SET
                external_id = ?2,
                last_enriched_at = ?3,
                title = ?4,
                headline = ?5,
                profile_url = ?6,
                photo_url = ?7,
                city = ?8,
                region = ?9,
                country = ?10,
                updated_at = ?11
             WHERE id = ?1",
            params![
                person.id,
                person.external_id,
                person.last_enriched_at,
                person.title,
                person.headline,
                person.profile_url,
                person.photo_url,
                person.city,
                person.region,
                person.country,
                crate::util::now_timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Mark a person attempted without touching any profile field.
    pub fn stamp_person_attempted(&self, person_id: &str, attempted_at: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE people SET last_enriched_at = ?2, updated_at = ?2 WHERE id = ?1",
            params![person_id, attempted_at],
        )?;
        Ok(())
    }

    pub fn enrichment_coverage(&self, owner_id: &str) -> Result<EnrichmentCoverage, DbError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(last_enriched_at IS NULL), 0),
                    COALESCE(SUM(last_enriched_at IS NOT NULL AND external_id IS NOT NULL), 0),
                    COALESCE(SUM(last_enriched_at IS NOT NULL AND external_id IS NULL), 0)
             FROM people WHERE owner_id = ?1",
            params![owner_id],
            |row| {
                Ok(EnrichmentCoverage {
                    total: row.get(0)?,
                    never_attempted: row.get(1)?,
                    matched: row.get(2)?,
                    no_match: row.get(3)?,
                })
            },
        )?)
    }

    fn map_person_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbPerson> {
        Ok(DbPerson {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            email: row.get(2)?,
            display_name: row.get(3)?,
            organization_domain: row.get(4)?,
            external_id: row.get(5)?,
            last_enriched_at: row.get(6)?,
            title: row.get(7)?,
            headline: row.get(8)?,
            profile_url: row.get(9)?,
            photo_url: row.get(10)?,
            city: row.get(11)?,
            region: row.get(12)?,
            country: row.get(13)?,
            last_seen: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}
