//! [`SqliteStore`]: the SQLite implementation of [`ConfigStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use confstore_core::{
  Error as CoreError,
  entry::{ConfigEntry, ConfigUpdate, HistoryRecord, NewConfigEntry},
  namespace::{Namespace, NewNamespace},
  schema::{NewSchema, SchemaDefinition, SchemaRevision, check_structure, check_value},
  store::{ConfigQuery, ConfigStore},
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    CONFIG_COLUMNS, HISTORY_COLUMNS, NAMESPACE_COLUMNS, RawConfigEntry, RawHistoryRecord,
    RawNamespace, RawSchema, SCHEMA_COLUMNS, decode_json, encode_dt, encode_json, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A config store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection handle is reference-counted and all
/// clones share one database thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row lookups ─────────────────────────────────────────────────────────────

fn namespace_row(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawNamespace>> {
  conn
    .query_row(
      &format!("SELECT {NAMESPACE_COLUMNS} FROM namespaces WHERE id = ?1"),
      params![id],
      RawNamespace::from_row,
    )
    .optional()
}

fn schema_row(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawSchema>> {
  conn
    .query_row(
      &format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE id = ?1"),
      params![id],
      RawSchema::from_row,
    )
    .optional()
}

fn config_row(
  conn: &Connection,
  id: &str,
  include_deleted: bool,
) -> rusqlite::Result<Option<RawConfigEntry>> {
  conn
    .query_row(
      &format!(
        "SELECT {CONFIG_COLUMNS} FROM config_entries
         WHERE id = ?1 AND (?2 OR deleted_at IS NULL)"
      ),
      params![id, include_deleted],
      RawConfigEntry::from_row,
    )
    .optional()
}

/// Set `deleted_at` on an active row. Returns `false` if there was none.
fn soft_delete(conn: &Connection, table: &str, id: &str, at: &str) -> rusqlite::Result<bool> {
  let changed = conn.execute(
    &format!("UPDATE {table} SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL"),
    params![id, at],
  )?;
  Ok(changed == 1)
}

fn append_history(
  conn: &Connection,
  config_id: &str,
  value: &str,
  version: u32,
  at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO config_history (id, config_entry_id, value, version, changed_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![encode_uuid(Uuid::new_v4()), config_id, value, version, at],
  )?;
  Ok(())
}

// ─── Write transactions ──────────────────────────────────────────────────────
//
// Each runs on the database thread inside one IMMEDIATE transaction, so the
// read-validate-write-append sequence cannot interleave with another writer.

fn insert_revision(
  conn: &mut Connection,
  base_id: Uuid,
  revision: SchemaRevision,
  now: DateTime<Utc>,
) -> Result<SchemaDefinition> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let base = schema_row(&tx, &encode_uuid(base_id))?
    .filter(|row| row.deleted_at.is_none())
    .ok_or(CoreError::SchemaNotFound(base_id))?;
  let latest: u32 = tx.query_row(
    "SELECT MAX(version) FROM schemas WHERE name = ?1",
    params![base.name],
    |row| row.get(0),
  )?;

  let next = SchemaDefinition {
    id:          Uuid::new_v4(),
    name:        base.name,
    version:     latest + 1,
    structure:   revision.structure,
    description: revision.description.or(base.description),
    created_at:  now,
    deleted_at:  None,
  };

  tx.execute(
    "INSERT INTO schemas (id, name, version, structure, description, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(next.id),
      next.name,
      next.version,
      encode_json(&next.structure)?,
      next.description,
      encode_dt(now),
    ],
  )?;
  tx.commit()?;
  Ok(next)
}

fn insert_config(
  conn: &mut Connection,
  input: NewConfigEntry,
  now: DateTime<Utc>,
) -> Result<ConfigEntry> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let ns_id = encode_uuid(input.namespace_id);
  let schema_id = encode_uuid(input.schema_id);

  namespace_row(&tx, &ns_id)?
    .filter(|row| row.deleted_at.is_none())
    .ok_or_else(|| CoreError::NamespaceNotFound(input.namespace_id.to_string()))?;
  let schema = schema_row(&tx, &schema_id)?
    .filter(|row| row.deleted_at.is_none())
    .ok_or(CoreError::SchemaNotFound(input.schema_id))?;

  let taken: bool = tx.query_row(
    "SELECT EXISTS (SELECT 1 FROM config_entries
                    WHERE namespace_id = ?1 AND key = ?2 AND deleted_at IS NULL)",
    params![ns_id, input.key],
    |row| row.get(0),
  )?;
  if taken {
    return Err(
      CoreError::DuplicateKey { namespace_id: input.namespace_id, key: input.key }.into(),
    );
  }

  check_value(&decode_json(&schema.structure)?, &input.value)?;

  let entry = ConfigEntry {
    id:           Uuid::new_v4(),
    namespace_id: input.namespace_id,
    schema_id:    input.schema_id,
    key:          input.key,
    value:        input.value,
    version:      1,
    created_at:   now,
    updated_at:   now,
    deleted_at:   None,
  };
  let id = encode_uuid(entry.id);
  let value = encode_json(&entry.value)?;
  let at = encode_dt(now);

  tx.execute(
    "INSERT INTO config_entries
       (id, namespace_id, schema_id, key, value, version, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
    params![id, ns_id, schema_id, entry.key, value, at],
  )?;
  append_history(&tx, &id, &value, 1, &at)?;
  tx.commit()?;
  Ok(entry)
}

fn apply_update(
  conn: &mut Connection,
  id: Uuid,
  update: ConfigUpdate,
  now: DateTime<Utc>,
) -> Result<ConfigEntry> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let id_str = encode_uuid(id);

  let current = config_row(&tx, &id_str, false)?
    .ok_or(CoreError::ConfigNotFound(id))?
    .into_entry()?;
  if let Some(expected) = update.expected_version
    && expected != current.version
  {
    return Err(CoreError::VersionConflict { id, expected, current: current.version }.into());
  }

  // Deleted schemas still govern the entries bound to them.
  let schema = schema_row(&tx, &encode_uuid(current.schema_id))?
    .ok_or(CoreError::SchemaNotFound(current.schema_id))?;
  check_value(&decode_json(&schema.structure)?, &update.value)?;

  let version = current.version + 1;
  let value = encode_json(&update.value)?;
  let at = encode_dt(now);

  tx.execute(
    "UPDATE config_entries SET value = ?2, version = ?3, updated_at = ?4
     WHERE id = ?1 AND version = ?5",
    params![id_str, value, version, at, current.version],
  )?;
  append_history(&tx, &id_str, &value, version, &at)?;
  tx.commit()?;

  Ok(ConfigEntry { value: update.value, version, updated_at: now, ..current })
}

fn log_rejection<T>(result: &Result<T>, what: &str) {
  if let Err(Error::Core(CoreError::Validation(errors))) = result {
    warn!(violations = errors.len(), "{what} rejected: {errors}");
  }
}

// ─── ConfigStore impl ────────────────────────────────────────────────────────

impl ConfigStore for SqliteStore {
  type Error = Error;

  // ── Namespaces ────────────────────────────────────────────────────────────

  async fn create_namespace(&self, input: NewNamespace) -> Result<Namespace> {
    let namespace = Namespace {
      id:          Uuid::new_v4(),
      name:        input.name,
      description: input.description,
      created_at:  Utc::now(),
      deleted_at:  None,
    };

    let id_str = encode_uuid(namespace.id);
    let name = namespace.name.clone();
    let description = namespace.description.clone();
    let at_str = encode_dt(namespace.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM namespaces WHERE name = ?1 AND deleted_at IS NULL)",
          params![name],
          |row| row.get(0),
        )?;
        if taken {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO namespaces (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
          params![id_str, name, description, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(CoreError::DuplicateNamespace(namespace.name).into());
    }
    info!(namespace_id = %namespace.id, name = %namespace.name, "namespace created");
    Ok(namespace)
  }

  async fn get_namespace(&self, id: Uuid) -> Result<Option<Namespace>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(namespace_row(conn, &id_str)?))
      .await?;
    raw.map(RawNamespace::into_namespace).transpose()
  }

  async fn get_namespace_by_name(&self, name: &str) -> Result<Option<Namespace>> {
    let name = name.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {NAMESPACE_COLUMNS} FROM namespaces
                 WHERE name = ?1 AND deleted_at IS NULL"
              ),
              params![name],
              RawNamespace::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawNamespace::into_namespace).transpose()
  }

  async fn list_namespaces(&self, include_deleted: bool) -> Result<Vec<Namespace>> {
    let raws: Vec<RawNamespace> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NAMESPACE_COLUMNS} FROM namespaces
           WHERE ?1 OR deleted_at IS NULL
           ORDER BY name, created_at"
        ))?;
        let rows = stmt
          .query_map(params![include_deleted], RawNamespace::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawNamespace::into_namespace).collect()
  }

  async fn delete_namespace(&self, id: Uuid) -> Result<Namespace> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());
    let raw = self
      .conn
      .call(move |conn| {
        if !soft_delete(conn, "namespaces", &id_str, &at_str)? {
          return Ok(None);
        }
        Ok(namespace_row(conn, &id_str)?)
      })
      .await?;
    let namespace = raw
      .ok_or_else(|| CoreError::NamespaceNotFound(id.to_string()))?
      .into_namespace()?;
    info!(namespace_id = %id, "namespace deleted");
    Ok(namespace)
  }

  // ── Schemas ───────────────────────────────────────────────────────────────

  async fn create_schema(&self, input: NewSchema) -> Result<SchemaDefinition> {
    check_structure(&input.structure)?;

    let mut schema = SchemaDefinition {
      id:          Uuid::new_v4(),
      name:        input.name,
      version:     1,
      structure:   input.structure,
      description: input.description,
      created_at:  Utc::now(),
      deleted_at:  None,
    };

    let id_str = encode_uuid(schema.id);
    let name = schema.name.clone();
    let structure = encode_json(&schema.structure)?;
    let description = schema.description.clone();
    let at_str = encode_dt(schema.created_at);

    let inserted: Option<u32> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (active, latest): (bool, u32) = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM schemas WHERE name = ?1 AND deleted_at IS NULL),
                  COALESCE(MAX(version), 0)
           FROM schemas WHERE name = ?1",
          params![name],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if active {
          return Ok(None);
        }
        let version = latest + 1;
        tx.execute(
          "INSERT INTO schemas (id, name, version, structure, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![id_str, name, version, structure, description, at_str],
        )?;
        tx.commit()?;
        Ok(Some(version))
      })
      .await?;

    let Some(version) = inserted else {
      return Err(CoreError::DuplicateSchemaName(schema.name).into());
    };
    schema.version = version;
    info!(schema_id = %schema.id, name = %schema.name, version, "schema created");
    Ok(schema)
  }

  async fn revise_schema(
    &self,
    base_id: Uuid,
    revision: SchemaRevision,
  ) -> Result<SchemaDefinition> {
    check_structure(&revision.structure)?;
    let now = Utc::now();

    let schema = self
      .conn
      .call(move |conn| Ok(insert_revision(conn, base_id, revision, now)))
      .await??;

    info!(
      schema_id = %schema.id,
      name = %schema.name,
      version = schema.version,
      "schema version published"
    );
    Ok(schema)
  }

  async fn get_schema(&self, id: Uuid) -> Result<Option<SchemaDefinition>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(schema_row(conn, &id_str)?))
      .await?;
    raw.map(RawSchema::into_schema).transpose()
  }

  async fn list_schemas(&self, include_deleted: bool) -> Result<Vec<SchemaDefinition>> {
    let raws: Vec<RawSchema> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SCHEMA_COLUMNS} FROM schemas
           WHERE ?1 OR deleted_at IS NULL
           ORDER BY name, version DESC"
        ))?;
        let rows = stmt
          .query_map(params![include_deleted], RawSchema::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawSchema::into_schema).collect()
  }

  async fn list_schema_versions(&self, name: &str) -> Result<Vec<SchemaDefinition>> {
    let name = name.to_owned();
    let raws: Vec<RawSchema> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SCHEMA_COLUMNS} FROM schemas WHERE name = ?1 ORDER BY version DESC"
        ))?;
        let rows = stmt
          .query_map(params![name], RawSchema::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawSchema::into_schema).collect()
  }

  async fn delete_schema(&self, id: Uuid) -> Result<SchemaDefinition> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());
    let raw = self
      .conn
      .call(move |conn| {
        if !soft_delete(conn, "schemas", &id_str, &at_str)? {
          return Ok(None);
        }
        Ok(schema_row(conn, &id_str)?)
      })
      .await?;
    let schema = raw.ok_or(CoreError::SchemaNotFound(id))?.into_schema()?;
    info!(schema_id = %id, "schema deleted");
    Ok(schema)
  }

  // ── Config entries ────────────────────────────────────────────────────────

  async fn create_config(&self, input: NewConfigEntry) -> Result<ConfigEntry> {
    let now = Utc::now();
    let result = self
      .conn
      .call(move |conn| Ok(insert_config(conn, input, now)))
      .await?;
    log_rejection(&result, "config create");

    let entry = result?;
    info!(config_id = %entry.id, key = %entry.key, "config entry created");
    Ok(entry)
  }

  async fn update_config(&self, id: Uuid, update: ConfigUpdate) -> Result<ConfigEntry> {
    let now = Utc::now();
    let result = self
      .conn
      .call(move |conn| Ok(apply_update(conn, id, update, now)))
      .await?;
    log_rejection(&result, "config update");

    let entry = result?;
    info!(config_id = %entry.id, version = entry.version, "config entry updated");
    Ok(entry)
  }

  async fn delete_config(&self, id: Uuid) -> Result<ConfigEntry> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());
    let raw = self
      .conn
      .call(move |conn| {
        if !soft_delete(conn, "config_entries", &id_str, &at_str)? {
          return Ok(None);
        }
        Ok(config_row(conn, &id_str, true)?)
      })
      .await?;
    let entry = raw.ok_or(CoreError::ConfigNotFound(id))?.into_entry()?;
    info!(config_id = %id, key = %entry.key, "config entry deleted");
    Ok(entry)
  }

  async fn get_config(&self, id: Uuid, include_deleted: bool) -> Result<Option<ConfigEntry>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(config_row(conn, &id_str, include_deleted)?))
      .await?;
    raw.map(RawConfigEntry::into_entry).transpose()
  }

  async fn get_config_by_key(&self, namespace_id: Uuid, key: &str) -> Result<Option<ConfigEntry>> {
    let ns_str = encode_uuid(namespace_id);
    let key = key.to_owned();
    debug!(%namespace_id, key = %key, "config lookup by key");
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CONFIG_COLUMNS} FROM config_entries
                 WHERE namespace_id = ?1 AND key = ?2 AND deleted_at IS NULL"
              ),
              params![ns_str, key],
              RawConfigEntry::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawConfigEntry::into_entry).transpose()
  }

  async fn list_configs(&self, query: &ConfigQuery) -> Result<Vec<ConfigEntry>> {
    let ns_str = query.namespace_id.map(encode_uuid);
    let schema_str = query.schema_id.map(encode_uuid);
    let include_deleted = query.include_deleted;
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);

    let raws: Vec<RawConfigEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONFIG_COLUMNS} FROM config_entries
           WHERE (?1 IS NULL OR namespace_id = ?1)
             AND (?2 IS NULL OR schema_id = ?2)
             AND (?3 OR deleted_at IS NULL)
           ORDER BY key, created_at
           LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
          .query_map(
            params![ns_str, schema_str, include_deleted, limit, offset],
            RawConfigEntry::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawConfigEntry::into_entry).collect()
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn history(&self, config_id: Uuid) -> Result<Vec<HistoryRecord>> {
    let id_str = encode_uuid(config_id);
    let raws: Option<Vec<RawHistoryRecord>> = self
      .conn
      .call(move |conn| {
        if config_row(conn, &id_str, true)?.is_none() {
          return Ok(None);
        }
        let mut stmt = conn.prepare(&format!(
          "SELECT {HISTORY_COLUMNS} FROM config_history
           WHERE config_entry_id = ?1 ORDER BY version"
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawHistoryRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;
    raws
      .ok_or(CoreError::ConfigNotFound(config_id))?
      .into_iter()
      .map(RawHistoryRecord::into_record)
      .collect()
  }

  async fn history_version(
    &self,
    config_id: Uuid,
    version: u32,
  ) -> Result<Option<HistoryRecord>> {
    let id_str = encode_uuid(config_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {HISTORY_COLUMNS} FROM config_history
                 WHERE config_entry_id = ?1 AND version = ?2"
              ),
              params![id_str, version],
              RawHistoryRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawHistoryRecord::into_record).transpose()
  }
}
