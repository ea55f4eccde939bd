use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::info;

use crate::error::is_unique_violation;
use crate::geo::{self, GeoPoint};
use crate::models::{DeleteOutcome, HazardRow, NewHazard, UserRow, VerificationRow, VerifyOutcome};
use crate::{CommitGate, Database, Result, StoreError};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, points, avatar, created_at, updated_at";

// Reporter username is joined so reads never need a second query.
const HAZARD_SELECT: &str = "
    SELECT h.id, h.user_id, h.type, h.severity, h.latitude, h.longitude,
           h.description, h.image_url, h.is_verified, h.verify_count,
           u.username, h.created_at, h.updated_at
    FROM hazards h
    LEFT JOIN users u ON u.id = h.user_id";

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

impl Database {
    // -- Users --

    /// Inserts a user. Fails with [`StoreError::Conflict`] when the username
    /// or email is already taken.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        gate: &CommitGate,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            gate.check()?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict("Email or username already exists".into())
                } else {
                    e.into()
                }
            })?;

            let row = query_user(&tx, "id", id)?
                .ok_or_else(|| StoreError::Corrupt(format!("user '{}' vanished after insert", id)))?;
            gate.commit(tx)?;
            Ok(row)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Hazards --

    /// Persists a new hazard with `is_verified = 0` and `verify_count = 0`.
    /// The spatial index row is written by trigger in the same statement.
    pub fn insert_hazard(&self, new: &NewHazard<'_>, gate: &CommitGate) -> Result<HazardRow> {
        self.with_conn_mut(|conn| {
            gate.check()?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO hazards (id, user_id, type, severity, latitude, longitude, description, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.id,
                    new.user_id,
                    new.hazard_type.as_str(),
                    new.severity.as_str(),
                    new.latitude,
                    new.longitude,
                    new.description,
                    new.image_url,
                ],
            )?;

            let row = query_hazard(&tx, new.id)?.ok_or_else(|| {
                StoreError::Corrupt(format!("hazard '{}' vanished after insert", new.id))
            })?;
            gate.commit(tx)?;
            Ok(row)
        })
    }

    pub fn get_hazard(&self, id: &str) -> Result<Option<HazardRow>> {
        self.with_conn(|conn| query_hazard(conn, id))
    }

    /// Hazards within `radius_km` of `center` by great-circle distance,
    /// nearest first, at most `limit` of them.
    pub fn nearby_hazards(
        &self,
        center: GeoPoint,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<(HazardRow, f64)>> {
        let boxes = geo::search_boxes(center, radius_km);

        let mut found = self.with_conn(|conn| {
            let sql = format!(
                "{HAZARD_SELECT}
                 JOIN hazard_locations l ON l.seq = h.seq
                 WHERE l.max_lat >= ?1 AND l.min_lat <= ?2
                   AND l.max_lon >= ?3 AND l.min_lon <= ?4"
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut seen = HashSet::new();
            let mut found = Vec::new();
            for b in &boxes {
                let rows = stmt
                    .query_map(
                        params![b.min_lat, b.max_lat, b.min_lon, b.max_lon],
                        hazard_from_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                for row in rows {
                    if !seen.insert(row.id.clone()) {
                        continue;
                    }
                    let point = GeoPoint {
                        lat: row.latitude,
                        lon: row.longitude,
                    };
                    let distance = center.distance_km(&point);
                    if distance <= radius_km {
                        found.push((row, distance));
                    }
                }
            }
            Ok(found)
        })?;

        found.sort_by(|(a, da), (b, db)| {
            da.total_cmp(db)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        found.truncate(limit);
        Ok(found)
    }

    /// Deletes a hazard if `requester_id` reported it. Ledger rows cascade.
    pub fn delete_hazard(&self, id: &str, requester_id: &str, gate: &CommitGate) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            gate.check()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let owner: Option<String> = tx
                .query_row("SELECT user_id FROM hazards WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            let outcome = match owner {
                None => DeleteOutcome::NotFound,
                Some(owner) if owner != requester_id => DeleteOutcome::NotOwner,
                Some(_) => {
                    tx.execute("DELETE FROM hazards WHERE id = ?1", [id])?;
                    DeleteOutcome::Deleted
                }
            };

            gate.commit(tx)?;
            Ok(outcome)
        })
    }

    // -- Verification ledger --

    /// Records `observer_id`'s vote on a hazard.
    ///
    /// A repeated vote from the same observer changes nothing and reports
    /// `recorded = false`. A first vote increments `verify_count` and, once
    /// the count reaches `threshold`, sets `is_verified`. Ledger insert and
    /// counter update share one IMMEDIATE transaction, so concurrent votes
    /// serialize on the write lock and each observer counts exactly once.
    pub fn verify_hazard(
        &self,
        hazard_id: &str,
        observer_id: &str,
        threshold: u32,
        gate: &CommitGate,
    ) -> Result<VerifyOutcome> {
        self.with_conn_mut(|conn| {
            gate.check()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let was_verified: bool = tx
                .query_row(
                    "SELECT is_verified FROM hazards WHERE id = ?1",
                    [hazard_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound)?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO hazard_verifications (hazard_id, user_id) VALUES (?1, ?2)",
                (hazard_id, observer_id),
            )?;

            if inserted == 1 {
                tx.execute(
                    &format!(
                        "UPDATE hazards
                         SET verify_count = verify_count + 1,
                             is_verified = CASE
                                 WHEN is_verified = 1 OR verify_count + 1 >= ?2 THEN 1
                                 ELSE 0
                             END,
                             updated_at = {NOW}
                         WHERE id = ?1"
                    ),
                    params![hazard_id, threshold],
                )?;
            }

            let (verify_count, verified): (u32, bool) = tx.query_row(
                "SELECT verify_count, is_verified FROM hazards WHERE id = ?1",
                [hazard_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            gate.commit(tx)?;

            let newly_confirmed = verified && !was_verified;
            if newly_confirmed {
                info!("Hazard {} confirmed after {} verifications", hazard_id, verify_count);
            }

            Ok(VerifyOutcome {
                recorded: inserted == 1,
                verify_count,
                verified,
                newly_confirmed,
            })
        })
    }

    /// Ledger entries for a hazard, oldest first.
    pub fn get_verifications(&self, hazard_id: &str) -> Result<Vec<VerificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT hazard_id, user_id, created_at FROM hazard_verifications
                 WHERE hazard_id = ?1
                 ORDER BY created_at, user_id",
            )?;

            let rows = stmt
                .query_map([hazard_id], |row| {
                    Ok(VerificationRow {
                        hazard_id: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// `column` is always a literal chosen by this module, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                points: row.get(4)?,
                avatar: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_hazard(conn: &Connection, id: &str) -> Result<Option<HazardRow>> {
    let mut stmt = conn.prepare(&format!("{HAZARD_SELECT} WHERE h.id = ?1"))?;
    Ok(stmt.query_row([id], hazard_from_row).optional()?)
}

fn hazard_from_row(row: &Row<'_>) -> rusqlite::Result<HazardRow> {
    Ok(HazardRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        hazard_type: row.get(2)?,
        severity: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        description: row.get(6)?,
        image_url: row.get(7)?,
        is_verified: row.get(8)?,
        verify_count: row.get(9)?,
        reported_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
