use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{StoreBackend, StoreSettings};
use crate::slots::SlotCollection;
use crate::validate_source_id;

/// Durable slot layouts, one collection per video source.
///
/// `load` never reports a missing layout: the store creates, persists and
/// returns an empty collection instead. `save` overwrites the whole layout.
/// A single writer per source id is assumed.
pub trait SlotStore: Send {
    fn load(&mut self, source_id: &str) -> Result<SlotCollection>;

    fn save(&mut self, slots: &SlotCollection, source_id: &str) -> Result<()>;

    /// Human-readable location, for logs.
    fn location(&self, source_id: &str) -> String;
}

/// Opens the store selected by configuration.
pub fn open_store(settings: &StoreSettings) -> Result<Box<dyn SlotStore>> {
    let store: Box<dyn SlotStore> = match settings.backend {
        StoreBackend::File => Box::new(FileSlotStore::open(&settings.root)?),
        StoreBackend::Sqlite => Box::new(SqliteSlotStore::open(
            &settings.root.join(SQLITE_DB_NAME).to_string_lossy(),
        )?),
    };
    Ok(store)
}

pub const SQLITE_DB_NAME: &str = "slots.db";

fn encode(slots: &SlotCollection) -> Result<String> {
    serde_json::to_string(slots).context("serialize slot layout")
}

fn decode(raw: &str, origin: &str) -> Result<SlotCollection> {
    serde_json::from_str(raw).map_err(|e| anyhow!("corrupt slot layout {}: {}", origin, e))
}

// ----------------------------------------------------------------------------
// File store: <root>/<source_id>.json
// ----------------------------------------------------------------------------

pub struct FileSlotStore {
    root: PathBuf,
}

impl FileSlotStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create slot store root {}", root.display()))?;
        log::info!("slot store: file backend at {}", root.display());
        Ok(Self { root })
    }

    pub fn path_for(&self, source_id: &str) -> Result<PathBuf> {
        validate_source_id(source_id)?;
        Ok(self.root.join(format!("{}.json", source_id)))
    }
}

impl SlotStore for FileSlotStore {
    fn load(&mut self, source_id: &str) -> Result<SlotCollection> {
        let path = self.path_for(source_id)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "no slot layout for source {}; initializing {}",
                    source_id,
                    path.display()
                );
                let empty = SlotCollection::new();
                self.save(&empty, source_id)?;
                return Ok(empty);
            }
            Err(e) => {
                return Err(anyhow!(
                    "failed to read slot layout {}: {}",
                    path.display(),
                    e
                ))
            }
        };
        decode(&raw, &path.display().to_string())
    }

    fn save(&mut self, slots: &SlotCollection, source_id: &str) -> Result<()> {
        let path = self.path_for(source_id)?;
        let json = encode(slots)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write slot layout {}", path.display()))?;
        Ok(())
    }

    fn location(&self, source_id: &str) -> String {
        self.root
            .join(format!("{}.json", source_id))
            .display()
            .to_string()
    }
}

// ----------------------------------------------------------------------------
// SQLite store: one row per source id
// ----------------------------------------------------------------------------

pub struct SqliteSlotStore {
    conn: Connection,
    db_path: String,
}

impl SqliteSlotStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open slot database {}", db_path))?;
        let mut store = Self {
            conn,
            db_path: db_path.to_string(),
        };
        store.ensure_schema()?;
        log::info!("slot store: sqlite backend at {}", db_path);
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slot_layouts (
              source_id TEXT PRIMARY KEY,
              slots_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl SlotStore for SqliteSlotStore {
    fn load(&mut self, source_id: &str) -> Result<SlotCollection> {
        validate_source_id(source_id)?;
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT slots_json FROM slot_layouts WHERE source_id = ?1",
                params![source_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => decode(&raw, &self.location(source_id)),
            None => {
                log::info!("no slot layout for source {}; initializing row", source_id);
                let empty = SlotCollection::new();
                self.save(&empty, source_id)?;
                Ok(empty)
            }
        }
    }

    fn save(&mut self, slots: &SlotCollection, source_id: &str) -> Result<()> {
        validate_source_id(source_id)?;
        let json = encode(slots)?;
        self.conn.execute(
            r#"
            INSERT INTO slot_layouts(source_id, slots_json) VALUES (?1, ?2)
            ON CONFLICT(source_id) DO UPDATE SET slots_json = excluded.slots_json
            "#,
            params![source_id, json],
        )?;
        Ok(())
    }

    fn location(&self, source_id: &str) -> String {
        format!("{}#{}", self.db_path, source_id)
    }
}

// ----------------------------------------------------------------------------
// In-memory store (tests, dry runs)
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct InMemorySlotStore {
    layouts: HashMap<String, String>,
    save_count: usize,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far, including self-healing initialisation.
    pub fn save_count(&self) -> usize {
        self.save_count
    }

    /// Raw persisted JSON for a source, if any.
    pub fn persisted(&self, source_id: &str) -> Option<&str> {
        self.layouts.get(source_id).map(String::as_str)
    }
}

impl SlotStore for InMemorySlotStore {
    fn load(&mut self, source_id: &str) -> Result<SlotCollection> {
        validate_source_id(source_id)?;
        if let Some(raw) = self.layouts.get(source_id) {
            return decode(raw, &self.location(source_id));
        }
        let empty = SlotCollection::new();
        self.save(&empty, source_id)?;
        Ok(empty)
    }

    fn save(&mut self, slots: &SlotCollection, source_id: &str) -> Result<()> {
        validate_source_id(source_id)?;
        self.layouts.insert(source_id.to_string(), encode(slots)?);
        self.save_count += 1;
        Ok(())
    }

    fn location(&self, source_id: &str) -> String {
        format!("memory://{}", source_id)
    }
}
