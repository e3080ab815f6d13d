use rusqlite::{params, OptionalExtension};

use super::*;

impl EnrichmentDb {
    // =========================================================================
    // Organizations
    // =========================================================================

    /// Ensure an organization row exists for `domain`. Returns true if it was created.
    ///
    /// An existing row keeps its name unless it had none.
    pub fn upsert_organization(&self, domain: &str, name: Option<&str>) -> Result<bool, DbError> {
        let inserted = self.conn.execute(
            "INSERT INTO organizations (domain, name, updated_at)
             VALUES (LOWER(?1), ?2, ?3)
             ON CONFLICT(domain) DO NOTHING",
            params![domain, name, crate::util::now_timestamp()],
        )?;
        if inserted == 0 && name.is_some() {
            self.conn.execute(
                "UPDATE organizations SET name = ?2 WHERE domain = LOWER(?1) AND name IS NULL",
                params![domain, name],
            )?;
        }
        Ok(inserted > 0)
    }

    pub fn get_organization(&self, domain: &str) -> Result<Option<DbOrganization>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT domain, name, external_id, last_enriched_at, industry, employee_count,
                        founded_year, funding_stage, last_funding_date, annual_revenue,
                        city, region, country, description, updated_at
                 FROM organizations WHERE domain = LOWER(?1)",
                params![domain],
                |row| {
                    Ok(DbOrganization {
                        domain: row.get(0)?,
                        name: row.get(1)?,
                        external_id: row.get(2)?,
                        last_enriched_at: row.get(3)?,
                        industry: row.get(4)?,
                        employee_count: row.get(5)?,
                        founded_year: row.get(6)?,
                        funding_stage: row.get(7)?,
                        last_funding_date: row.get(8)?,
                        annual_revenue: row.get(9)?,
                        city: row.get(10)?,
                        region: row.get(11)?,
                        country: row.get(12)?,
                        description: row.get(13)?,
                        updated_at: row.get(14)?,
                    })
                },
            )
            .optional()?)
    }

    /// Persist firmographics and the attempt stamp for one organization.
    pub fn update_organization_enrichment(&self, org: &DbOrganization) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE organizations SET
                name = ?2,
                external_id = ?3,
                last_enriched_at = ?4,
                industry = ?5,
                employee_count = ?6,
                founded_year = ?7,
                funding_stage = ?8,
                last_funding_date = ?9,
                annual_revenue = ?10,
                city = ?11,
                region = ?12,
                country = ?13,
                description = ?14,
                updated_at = ?15
             WHERE domain = ?1",
            params![
                org.domain,
                org.name,
                org.external_id,
                org.last_enriched_at,
                org.industry,
                org.employee_count,
                org.founded_year,
                org.funding_stage,
                org.last_funding_date,
                org.annual_revenue,
                org.city,
                org.region,
                org.country,
                org.description,
                crate::util::now_timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Mark an organization attempted (negative cache) without touching firmographics.
    pub fn stamp_organization_attempted(&self, domain: &str, attempted_at: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE organizations SET last_enriched_at = ?2, updated_at = ?2 WHERE domain = LOWER(?1)",
            params![domain, attempted_at],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;

    #[test]
    fn test_upsert_organization_is_idempotent() {
        let db = test_db();
        assert!(db.upsert_organization("Acme.com", None).expect("insert"));
        assert!(!db.upsert_organization("acme.com", Some("Acme")).expect("second"));

        let org = db.get_organization("ACME.COM").expect("query").expect("exists");
        assert_eq!(org.domain, "acme.com");
        assert_eq!(org.name.as_deref(), Some("Acme"));
        assert!(org.last_enriched_at.is_none());
    }

    #[test]
    fn test_update_and_stamp_organization() {
        let db = test_db();
        db.upsert_organization("acme.com", Some("Acme")).expect("insert");

        db.stamp_organization_attempted("acme.com", "2026-02-01T00:00:00.000Z")
            .expect("stamp");
        let org = db.get_organization("acme.com").expect("query").expect("exists");
        assert_eq!(org.last_enriched_at.as_deref(), Some("2026-02-01T00:00:00.000Z"));
        assert!(org.external_id.is_none());
        assert!(!org.has_firmographics());

        let mut enriched = org.clone();
        enriched.external_id = Some("org-1".to_string());
        enriched.industry = Some("Software".to_string());
        enriched.employee_count = Some(250);
        db.update_organization_enrichment(&enriched).expect("update");

        let org = db.get_organization("acme.com").expect("query").expect("exists");
        assert!(org.has_firmographics());
        assert_eq!(org.employee_count, Some(250));
    }
}
