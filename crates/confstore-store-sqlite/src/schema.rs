//! SQL schema for the confstore SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS namespaces (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL,
    deleted_at  TEXT
);

-- Names are only reserved while the namespace is active.
CREATE UNIQUE INDEX IF NOT EXISTS namespaces_active_name_idx
    ON namespaces(name) WHERE deleted_at IS NULL;

-- Schema rows are immutable apart from deleted_at. An edit inserts the next
-- version under the same name.
CREATE TABLE IF NOT EXISTS schemas (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    version     INTEGER NOT NULL CHECK (version >= 1),
    structure   TEXT NOT NULL,   -- JSON document
    description TEXT,
    created_at  TEXT NOT NULL,
    deleted_at  TEXT,
    UNIQUE (name, version)
);

CREATE TABLE IF NOT EXISTS config_entries (
    id           TEXT PRIMARY KEY,
    namespace_id TEXT NOT NULL REFERENCES namespaces(id),
    schema_id    TEXT NOT NULL REFERENCES schemas(id),
    key          TEXT NOT NULL,
    value        TEXT NOT NULL,   -- JSON document
    version      INTEGER NOT NULL CHECK (version >= 1),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    deleted_at   TEXT
);

-- A deleted entry frees its key for reuse.
CREATE UNIQUE INDEX IF NOT EXISTS config_entries_active_key_idx
    ON config_entries(namespace_id, key) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS config_entries_schema_idx ON config_entries(schema_id);

-- Strictly append-only: one row per accepted create or update.
CREATE TABLE IF NOT EXISTS config_history (
    id              TEXT PRIMARY KEY,
    config_entry_id TEXT NOT NULL REFERENCES config_entries(id),
    value           TEXT NOT NULL,
    version         INTEGER NOT NULL,
    changed_at      TEXT NOT NULL,
    UNIQUE (config_entry_id, version)
);

PRAGMA user_version = 1;
";
