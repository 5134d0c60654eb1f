//! Preference store: owns the schema, drives the codecs, manages the
//! on-disk file lifecycle.
//!
//! # File Lifecycle
//!
//! Load walks the candidate suffix list in priority order; the first
//! existing file is authoritative (never merged with older candidates).
//! `.json` selects the markup codec, every other suffix the flat-text
//! codec; both feed the same version-aware walk. Any load failure other
//! than "no candidate exists" is logged and leaves every setting at its
//! compiled-in default — a half-decoded file is never applied.
//!
//! Save serializes the full current field set at the current version to a
//! temporary next to the target, then renames it into place, so a reader
//! observes either the fully-old or the fully-new file. The first save
//! failure raises one warning through the registered warning sink and
//! puts the store into a degraded state; repeats stay silent until a save
//! succeeds again.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;

use crate::error::PrefsError;
use crate::flat;
use crate::schema::Schema;

/// Base name of the preference file inside the config directory.
pub const PREFS_BASENAME: &str = "preferences";

/// Candidate suffixes, in priority order. `.json` is the format saves
/// write; the others are read-only historical generations.
pub const PREFS_SUFFIXES: &[&str] = &[".json", ".cfg", ""];

/// Override entry key that old releases wrote for unclassifiable windows.
/// Rewritten to the empty key on every load.
const LEGACY_SENTINEL_KEY: &str = "(window manager frame)";

/// Side-channel for the one user-visible save warning.
pub type WarningSink = Box<dyn FnMut(&str)>;

/// Owns every setting and the persisted file.
///
/// Constructed explicitly and handed to consumers; there is no process
/// global. Intended order: construct, [`load`](PrefStore::load), hand out
/// cell handles, periodic [`trigger_save`](PrefStore::trigger_save),
/// final save on exit.
pub struct PrefStore {
    config_dir: PathBuf,
    schema: Schema,
    dirty: Rc<Cell<bool>>,
    /// False while in the degraded state after a failed save.
    good_state: bool,
    warning_sink: Option<WarningSink>,
}

impl PrefStore {
    /// Create a store over `config_dir` with every setting at its
    /// compiled-in default.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let schema = Schema::default();
        let dirty = Rc::new(Cell::new(false));
        {
            let dirty = Rc::clone(&dirty);
            schema.watch_all(move || dirty.set(true));
        }
        Self {
            config_dir: config_dir.into(),
            schema,
            dirty,
            good_state: true,
            warning_sink: None,
        }
    }

    /// Create a store over the user's config directory.
    pub fn for_user() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gestured");
        Self::new(dir)
    }

    /// The settings owned by this store.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Register the receiver for the one-shot save-failure warning.
    pub fn set_warning_sink(&mut self, sink: WarningSink) {
        self.warning_sink = Some(sink);
    }

    /// True if a setting changed since the last successful save.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn candidate_path(&self, suffix: &str) -> PathBuf {
        self.config_dir.join(format!("{PREFS_BASENAME}{suffix}"))
    }

    /// Load settings from the newest readable persisted file.
    ///
    /// Failures fall back to defaults and are logged, never surfaced; a
    /// missing file is the normal first run.
    pub fn load(&mut self) {
        for suffix in PREFS_SUFFIXES {
            let path = self.candidate_path(suffix);
            if !path.is_file() {
                continue;
            }
            match load_candidate(&path, suffix) {
                Ok(loaded) => {
                    self.schema.adopt(&loaded);
                    log::debug!("loaded preferences from {}", path.display());
                }
                Err(e) => {
                    log::warn!("could not read preferences from {}: {e}", path.display());
                }
            }
            // first existing candidate is authoritative either way
            break;
        }
        self.migrate_sentinel_key();
        self.dirty.set(false);
    }

    /// Rewrite the legacy override sentinel to the empty key. Runs after
    /// every load; a later save simply writes the current key.
    fn migrate_sentinel_key(&self) {
        let mut table = self.schema.exceptions.get();
        if let Some(binding) = table.remove(LEGACY_SENTINEL_KEY) {
            table.insert(String::new(), binding);
            self.schema.exceptions.set(table);
        }
    }

    /// Serialize the current field set and atomically replace the target
    /// file. Safe to call from any recurring trigger; cheap when nothing
    /// changed is the caller's concern (see [`save_if_dirty`](Self::save_if_dirty)).
    pub fn trigger_save(&mut self) {
        match self.write_current() {
            Ok(()) => {
                self.dirty.set(false);
                if !self.good_state {
                    log::info!("preference saving recovered");
                }
                self.good_state = true;
                log::debug!("saved preferences");
            }
            Err(e) => {
                log::warn!("could not save preferences: {e}");
                if !self.good_state {
                    return;
                }
                self.good_state = false;
                let message = format!(
                    "Couldn't save preferences. Your changes will be lost. \
                     Make sure that \"{}\" is a directory and that you have \
                     write access to it.",
                    self.config_dir.display()
                );
                if let Some(sink) = self.warning_sink.as_mut() {
                    sink(&message);
                }
            }
        }
    }

    /// Save only if a setting changed since the last save. This is the
    /// entry point a periodic timer drives.
    pub fn save_if_dirty(&mut self) {
        if self.dirty.get() {
            self.trigger_save();
        }
    }

    fn write_current(&mut self) -> Result<(), PrefsError> {
        fs::create_dir_all(&self.config_dir).map_err(PrefsError::io)?;
        let target = self.candidate_path(PREFS_SUFFIXES[0]);
        let tmp = self.config_dir.join(format!("{PREFS_BASENAME}.tmp"));

        let tree = self.schema.encode();
        let text = serde_json::to_string_pretty(&tree)
            .map_err(|e| PrefsError::Io(e.to_string()))?;
        fs::write(&tmp, text).map_err(PrefsError::io)?;
        fs::rename(&tmp, &target).map_err(PrefsError::io)?;
        Ok(())
    }
}

/// Read and decode one candidate file into a fresh schema.
fn load_candidate(path: &Path, suffix: &str) -> Result<Schema, PrefsError> {
    let text = fs::read_to_string(path).map_err(PrefsError::io)?;
    let root: Value = if suffix == ".json" {
        serde_json::from_str(&text).map_err(|e| PrefsError::Parse(e.to_string()))?
    } else {
        flat::parse(&text)?
    };
    let mut schema = Schema::default();
    schema.decode(&root)?;
    Ok(schema)
}
