//! SQL schema for the Reef SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS profiles (
    uid                   TEXT PRIMARY KEY,
    display_name          TEXT,
    email                 TEXT,
    created_at            TEXT NOT NULL,
    lifetime_points       INTEGER NOT NULL DEFAULT 0 CHECK (lifetime_points >= 0),
    redeemable_points     INTEGER NOT NULL DEFAULT 0 CHECK (redeemable_points >= 0),
    join_date             TEXT,            -- NULL until enrolled in loyalty
    last_expiration_check TEXT
);

CREATE TABLE IF NOT EXISTS yearly_points (
    uid    TEXT    NOT NULL REFERENCES profiles(uid),
    year   INTEGER NOT NULL,
    points INTEGER NOT NULL CHECK (points >= 0),
    PRIMARY KEY (uid, year)
);

-- Written by the yearly check only; rows are never updated or deleted.
CREATE TABLE IF NOT EXISTS points_expirations (
    uid            TEXT    NOT NULL REFERENCES profiles(uid),
    year           INTEGER NOT NULL,
    points_reduced INTEGER NOT NULL,
    reason         TEXT    NOT NULL,
    recorded_at    TEXT    NOT NULL,
    PRIMARY KEY (uid, year)
);

CREATE TABLE IF NOT EXISTS access_grants (
    uid        TEXT    NOT NULL REFERENCES profiles(uid),
    capability TEXT    NOT NULL,   -- 'loyalty' | 'instructor' | 'team' | 'management'
    has_access INTEGER NOT NULL,
    granted_at TEXT    NOT NULL,
    granted_by TEXT    NOT NULL,
    PRIMARY KEY (uid, capability)
);

CREATE INDEX IF NOT EXISTS profiles_join_idx    ON profiles(join_date);
CREATE INDEX IF NOT EXISTS profiles_created_idx ON profiles(created_at);

PRAGMA user_version = 1;
";
