use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Rolls back on drop if any statement fails.
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                points          INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
                avatar          TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE hazards (
                seq             INTEGER PRIMARY KEY,
                id              TEXT NOT NULL UNIQUE,
                user_id         TEXT NOT NULL REFERENCES users(id),
                type            TEXT NOT NULL
                                CHECK (type IN ('pothole', 'debris', 'accident', 'construction', 'other')),
                severity        TEXT NOT NULL CHECK (severity IN ('low', 'medium', 'high')),
                latitude        REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
                longitude       REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
                description     TEXT,
                image_url       TEXT,
                is_verified     INTEGER NOT NULL DEFAULT 0,
                verify_count    INTEGER NOT NULL DEFAULT 0 CHECK (verify_count >= 0),
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_hazards_user ON hazards(user_id);

            -- Spatial index: one degenerate box per hazard, keyed by hazards.seq
            CREATE VIRTUAL TABLE hazard_locations USING rtree(
                seq,
                min_lat, max_lat,
                min_lon, max_lon
            );

            CREATE TRIGGER hazards_index_insert AFTER INSERT ON hazards
            BEGIN
                INSERT INTO hazard_locations (seq, min_lat, max_lat, min_lon, max_lon)
                    VALUES (NEW.seq, NEW.latitude, NEW.latitude, NEW.longitude, NEW.longitude);
            END;

            CREATE TRIGGER hazards_index_delete AFTER DELETE ON hazards
            BEGIN
                DELETE FROM hazard_locations WHERE seq = OLD.seq;
            END;

            -- Confirmation never goes back to false
            CREATE TRIGGER hazards_confirmation_monotonic
            BEFORE UPDATE OF is_verified ON hazards
            WHEN OLD.is_verified = 1 AND NEW.is_verified = 0
            BEGIN
                SELECT RAISE(ABORT, 'hazard confirmation cannot be revoked');
            END;

            CREATE TABLE hazard_verifications (
                hazard_id       TEXT NOT NULL REFERENCES hazards(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (hazard_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
