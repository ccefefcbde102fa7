use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::features::{Donation, DonorRecord};
use crate::segments::{Criteria, SegmentSuggestion};

pub const DONATION_COMPLETED: &str = "completed";
pub const SUBSCRIPTION_ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonorStats {
    pub organization_count: u32,
    pub donor_count: u32,
    pub donation_count: u32,
    pub suggestion_count: u32,
}

/// Donor store backed by SQLite.
pub struct DonorDB {
    conn: Connection,
}

const DONOR_COLUMNS: &str = "d.id, d.organization_id, d.email, d.is_active, d.last_donation_date, \
     d.first_donation_date, d.donation_count, d.total_donations, d.score, d.churn_probability, \
     EXISTS(SELECT 1 FROM subscriptions s WHERE s.donor_id = d.id AND s.status = 'active')";

impl DonorDB {
    /// Create a new in-memory database
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open (or create) a database file
    pub fn open(path: &str) -> Result<Self> {
        let conn =
            Connection::open(path).context(format!("Failed to open database at {}", path))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS donors (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                email TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_donation_date TEXT,
                first_donation_date TEXT,
                donation_count INTEGER,
                total_donations REAL,
                score REAL,
                churn_probability REAL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id)
            );

            CREATE TABLE IF NOT EXISTS donations (
                id TEXT PRIMARY KEY,
                donor_id TEXT NOT NULL,
                amount REAL NOT NULL,
                status TEXT NOT NULL,
                donated_at TEXT NOT NULL,
                FOREIGN KEY (donor_id) REFERENCES donors(id)
            );

            CREATE TABLE IF NOT EXISTS subscriptions (
                id TEXT PRIMARY KEY,
                donor_id TEXT NOT NULL,
                status TEXT NOT NULL,
                FOREIGN KEY (donor_id) REFERENCES donors(id)
            );

            CREATE TABLE IF NOT EXISTS segment_suggestions (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                criteria TEXT NOT NULL,
                donor_count INTEGER NOT NULL,
                cluster_id TEXT NOT NULL,
                confidence REAL NOT NULL,
                is_accepted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id)
            );

            CREATE INDEX IF NOT EXISTS idx_donors_org ON donors(organization_id);
            CREATE INDEX IF NOT EXISTS idx_donations_donor ON donations(donor_id);
            CREATE INDEX IF NOT EXISTS idx_subscriptions_donor ON subscriptions(donor_id);
            CREATE INDEX IF NOT EXISTS idx_suggestions_org ON segment_suggestions(organization_id);
            "#,
            )
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    pub fn insert_organization(&self, org: &Organization) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO organizations (id, name) VALUES (?1, ?2)",
                params![org.id, org.name],
            )
            .context(format!("Failed to insert organization: {}", org.id))?;
        Ok(())
    }

    pub fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        self.conn
            .query_row(
                "SELECT id, name FROM organizations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Organization {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .context(format!("Failed to query organization: {}", id))
    }

    /// Insert the donor row. Donations and subscriptions are stored separately.
    pub fn insert_donor(&self, donor: &DonorRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO donors (id, organization_id, email, is_active, last_donation_date, first_donation_date, donation_count, total_donations, score, churn_probability) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    donor.id,
                    donor.organization_id,
                    donor.email,
                    donor.is_active,
                    donor.last_donation_date,
                    donor.first_donation_date,
                    donor.donation_count,
                    donor.total_donations,
                    donor.score,
                    donor.churn_probability
                ],
            )
            .context(format!("Failed to insert donor: {}", donor.id))?;
        Ok(())
    }

    pub fn insert_donation(&self, donor_id: &str, donation: &Donation, status: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO donations (id, donor_id, amount, status, donated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![donation.id, donor_id, donation.amount, status, donation.donated_at],
            )
            .context(format!("Failed to insert donation: {}", donation.id))?;
        Ok(())
    }

    pub fn insert_subscription(&self, id: &str, donor_id: &str, status: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO subscriptions (id, donor_id, status) VALUES (?1, ?2, ?3)",
                params![id, donor_id, status],
            )
            .context(format!("Failed to insert subscription: {}", id))?;
        Ok(())
    }

    /// Active donors of an organization, each with its completed donations.
    pub fn active_donors(&self, organization_id: &str) -> Result<Vec<DonorRecord>> {
        self.load_donors(Some(organization_id), true)
    }

    /// All donors, optionally restricted to one organization.
    pub fn donors(&self, organization_id: Option<&str>) -> Result<Vec<DonorRecord>> {
        self.load_donors(organization_id, false)
    }

    pub fn get_donor(&self, id: &str) -> Result<Option<DonorRecord>> {
        let sql = format!("SELECT {} FROM donors d WHERE d.id = ?1", DONOR_COLUMNS);
        let donor = self
            .conn
            .query_row(&sql, params![id], donor_from_row)
            .optional()
            .context(format!("Failed to query donor: {}", id))?;

        match donor {
            Some(mut donor) => {
                let mut donations = self.completed_donations(Some(&donor.organization_id))?;
                donor.donations = donations.remove(&donor.id).unwrap_or_default();
                Ok(Some(donor))
            }
            None => Ok(None),
        }
    }

    fn load_donors(
        &self,
        organization_id: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<DonorRecord>> {
        let sql = format!(
            "SELECT {} FROM donors d WHERE (?1 IS NULL OR d.organization_id = ?1) AND (?2 = 0 OR d.is_active = 1) ORDER BY d.rowid",
            DONOR_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare statement")?;

        let mut donors = stmt
            .query_map(params![organization_id, active_only], donor_from_row)
            .context("Failed to query donors")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect donors")?;

        let mut donations = self.completed_donations(organization_id)?;
        for donor in &mut donors {
            donor.donations = donations.remove(&donor.id).unwrap_or_default();
        }

        Ok(donors)
    }

    /// Completed donations grouped by donor, newest first.
    fn completed_donations(
        &self,
        organization_id: Option<&str>,
    ) -> Result<HashMap<String, Vec<Donation>>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT dn.donor_id, dn.id, dn.amount, dn.donated_at FROM donations dn \
                 JOIN donors d ON d.id = dn.donor_id \
                 WHERE dn.status = ?1 AND (?2 IS NULL OR d.organization_id = ?2) \
                 ORDER BY dn.donated_at DESC",
            )
            .context("Failed to prepare statement")?;

        let rows = stmt
            .query_map(params![DONATION_COMPLETED, organization_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Donation {
                        id: row.get(1)?,
                        amount: row.get(2)?,
                        donated_at: row.get(3)?,
                    },
                ))
            })
            .context("Failed to query donations")?;

        let mut grouped: HashMap<String, Vec<Donation>> = HashMap::new();
        for row in rows {
            let (donor_id, donation) = row.context("Failed to read donation")?;
            grouped.entry(donor_id).or_default().push(donation);
        }

        Ok(grouped)
    }

    /// Write propensity scores in one transaction.
    pub fn update_scores(&mut self, scores: &[(String, f64)]) -> Result<()> {
        self.update_column("score", scores)
    }

    /// Write churn probabilities in one transaction.
    pub fn update_churn_probabilities(&mut self, probabilities: &[(String, f64)]) -> Result<()> {
        self.update_column("churn_probability", probabilities)
    }

    fn update_column(&mut self, column: &str, values: &[(String, f64)]) -> Result<()> {
        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        {
            let sql = format!("UPDATE donors SET {} = ?1 WHERE id = ?2", column);
            let mut stmt = tx.prepare(&sql).context("Failed to prepare statement")?;
            for (donor_id, value) in values {
                stmt.execute(params![value, donor_id])
                    .context(format!("Failed to update {} for donor: {}", column, donor_id))?;
            }
        }
        tx.commit().context(format!("Failed to commit {} updates", column))?;
        Ok(())
    }

    /// Replace every unaccepted suggestion of the organization with
    /// `suggestions`. Delete and insert share one transaction, so a failure
    /// keeps the previous batch.
    pub fn replace_suggestions(
        &mut self,
        organization_id: &str,
        suggestions: &[SegmentSuggestion],
    ) -> Result<usize> {
        let tx = self.conn.transaction().context("Failed to begin transaction")?;

        let deleted = tx
            .execute(
                "DELETE FROM segment_suggestions WHERE organization_id = ?1 AND is_accepted = 0",
                params![organization_id],
            )
            .context(format!("Failed to delete suggestions for organization: {}", organization_id))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO segment_suggestions (id, organization_id, name, description, criteria, donor_count, cluster_id, confidence, is_accepted, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .context("Failed to prepare statement")?;

            for s in suggestions {
                let criteria =
                    serde_json::to_string(&s.criteria).context("Failed to serialize criteria")?;
                stmt.execute(params![
                    s.id,
                    s.organization_id,
                    s.name,
                    s.description,
                    criteria,
                    s.donor_count,
                    s.cluster_id,
                    s.confidence,
                    s.is_accepted,
                    s.created_at
                ])
                .context(format!("Failed to insert suggestion: {}", s.name))?;
            }
        }

        tx.commit().context("Failed to commit suggestions")?;
        Ok(deleted)
    }

    pub fn list_suggestions(&self, organization_id: &str) -> Result<Vec<SegmentSuggestion>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, organization_id, name, description, criteria, donor_count, cluster_id, confidence, is_accepted, created_at FROM segment_suggestions WHERE organization_id = ?1 ORDER BY created_at, cluster_id",
            )
            .context("Failed to prepare statement")?;

        let rows = stmt
            .query_map(params![organization_id], |row| {
                Ok((
                    row.get::<_, String>(4)?,
                    SegmentSuggestion {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        name: row.get(2)?,
                        description: row.get(3)?,
                        criteria: Criteria::default(),
                        donor_count: row.get(5)?,
                        cluster_id: row.get(6)?,
                        confidence: row.get(7)?,
                        is_accepted: row.get(8)?,
                        created_at: row.get::<_, DateTime<Utc>>(9)?,
                    },
                ))
            })
            .context("Failed to query suggestions")?;

        let mut suggestions = Vec::new();
        for row in rows {
            let (criteria, mut suggestion) = row.context("Failed to read suggestion")?;
            suggestion.criteria = serde_json::from_str(&criteria)
                .context(format!("Invalid criteria on suggestion: {}", suggestion.id))?;
            suggestions.push(suggestion);
        }

        Ok(suggestions)
    }

    pub fn get_stats(&self) -> Result<DonorStats> {
        let count = |table: &str| -> Result<u32> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .context(format!("Failed to count {}", table))
        };

        Ok(DonorStats {
            organization_count: count("organizations")?,
            donor_count: count("donors")?,
            donation_count: count("donations")?,
            suggestion_count: count("segment_suggestions")?,
        })
    }
}

fn donor_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DonorRecord> {
    Ok(DonorRecord {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        email: row.get(2)?,
        is_active: row.get(3)?,
        last_donation_date: row.get(4)?,
        first_donation_date: row.get(5)?,
        donation_count: row.get(6)?,
        total_donations: row.get(7)?,
        score: row.get(8)?,
        churn_probability: row.get(9)?,
        donations: Vec::new(),
        has_active_subscription: row.get(10)?,
    })
}
