//! SQL schema for the SQLite period store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per calendar month. Rows are updated in place, never deleted.
CREATE TABLE IF NOT EXISTS solar_generation_data (
    period_year         INTEGER NOT NULL,
    period_month        INTEGER NOT NULL CHECK (period_month BETWEEN 1 AND 12),
    generation_gwh      REAL    NOT NULL,
    mom_pct             REAL,
    yoy_pct             REAL,
    rolling_12m_gwh     REAL,
    capacity_factor_pct REAL,
    momentum_score      INTEGER,
    data_source         TEXT    NOT NULL DEFAULT 'manual',
    is_revised          INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT    NOT NULL,   -- RFC 3339 UTC; kept on update
    updated_at          TEXT    NOT NULL,
    PRIMARY KEY (period_year, period_month)
);

CREATE TABLE IF NOT EXISTS solar_capacity_data (
    period_year          INTEGER NOT NULL,
    period_month         INTEGER NOT NULL CHECK (period_month BETWEEN 1 AND 12),
    capacity_gw          REAL    NOT NULL,
    monthly_addition_gw  REAL,
    rolling_12m_added_gw REAL,
    build_pace_gw_yr     REAL,
    data_source          TEXT    NOT NULL DEFAULT 'manual',
    is_revised           INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT    NOT NULL,
    updated_at           TEXT    NOT NULL,
    PRIMARY KEY (period_year, period_month)
);

-- Append-only audit trail of revised values.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS solar_revision_log (
    revision_id  TEXT    PRIMARY KEY,
    table_name   TEXT    NOT NULL,   -- 'solar_generation_data' | 'solar_capacity_data'
    period_year  INTEGER NOT NULL,
    period_month INTEGER NOT NULL,
    field_name   TEXT    NOT NULL,
    old_value    TEXT,
    new_value    TEXT,
    reason       TEXT    NOT NULL DEFAULT '',
    created_at   TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS bulletin_drafts (
    draft_id     TEXT    PRIMARY KEY,
    kind         TEXT    NOT NULL,   -- 'generation' | 'capacity'
    period_year  INTEGER NOT NULL,
    period_month INTEGER NOT NULL,
    title        TEXT    NOT NULL,
    created_at   TEXT    NOT NULL,
    UNIQUE (kind, period_year, period_month)
);

CREATE TABLE IF NOT EXISTS bulletin_meta (
    draft_id   TEXT NOT NULL REFERENCES bulletin_drafts(draft_id),
    meta_key   TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    PRIMARY KEY (draft_id, meta_key)
);

CREATE INDEX IF NOT EXISTS revision_period_idx
    ON solar_revision_log(table_name, period_year, period_month);

PRAGMA user_version = 1;
";
