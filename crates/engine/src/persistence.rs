use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::dialog::{DialogCursor, DialogLibrary, DialogScript, Message, NextLine, ShuffleBag};

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMessage {
    pub text: String,
    #[serde(rename = "requiresTurnHead", default)]
    pub requires_turn_head: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedScript {
    pub messages: Vec<SavedMessage>,
    pub play_once: bool,
    pub next_index: i64,
    pub curr_index: i64,
}

/// Dialog progress for one NPC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NpcDialogSave {
    pub dialog_list: Vec<SavedScript>,
    /// Signed so a negative entry is dropped on restore instead of failing the parse.
    pub dialog_shuffle: Vec<i64>,
    pub dialog_version_id: i32,
    /// Script the NPC was partway through, so the next pulse resumes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_active: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveGame {
    pub save_version: u32,
    /// Keyed by the NPC's spawn key.
    pub npcs: BTreeMap<String, NpcDialogSave>,
}

impl Default for SaveGame {
    fn default() -> Self {
        Self {
            save_version: SAVE_VERSION,
            npcs: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse save json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
}

impl NpcDialogSave {
    pub fn capture(library: &DialogLibrary) -> Self {
        let dialog_list = library
            .scripts()
            .iter()
            .map(|script| {
                let len = script.messages().len();
                let cursor = script.cursor();
                SavedScript {
                    messages: script
                        .messages()
                        .iter()
                        .map(|message| SavedMessage {
                            text: message.text.clone(),
                            requires_turn_head: message.requires_turn_head,
                        })
                        .collect(),
                    play_once: script.play_once(),
                    next_index: cursor.next.to_stored(len),
                    curr_index: cursor.current.map_or(-1, |index| index as i64),
                }
            })
            .collect();

        Self {
            dialog_list,
            dialog_shuffle: library
                .bag()
                .remaining()
                .iter()
                .map(|&index| index as i64)
                .collect(),
            dialog_version_id: library.version_id(),
            dialog_active: library.active(),
        }
    }

    /// Rebuilds a library, clamping cursors and bag entries that do not fit
    /// the saved scripts. `npc_key` only labels errors and warnings.
    pub fn restore(&self, npc_key: &str) -> Result<DialogLibrary, PersistenceError> {
        let mut clamped = 0usize;
        let mut scripts = Vec::with_capacity(self.dialog_list.len());

        for (idx, saved) in self.dialog_list.iter().enumerate() {
            if saved.messages.is_empty() {
                return Err(validation_err(
                    &format!("npcs.{npc_key}.dialog_list[{idx}].messages"),
                    "script must contain at least one message",
                ));
            }
            let len = saved.messages.len();
            let (next, next_clamped) = sanitize_next(saved.next_index, len, saved.play_once);
            let (current, current_clamped) = sanitize_current(saved.curr_index, len);
            clamped += usize::from(next_clamped) + usize::from(current_clamped);

            let messages = saved
                .messages
                .iter()
                .map(|message| Message::new(message.text.clone(), message.requires_turn_head))
                .collect();
            scripts.push(DialogScript::with_cursor(
                messages,
                saved.play_once,
                DialogCursor { next, current },
            ));
        }

        let remaining: Vec<usize> = self
            .dialog_shuffle
            .iter()
            .filter_map(|&raw| usize::try_from(raw).ok())
            .collect();
        let negative = self.dialog_shuffle.len() - remaining.len();
        let mut bag = ShuffleBag::from_remaining(remaining);
        let dropped = negative + bag.retain_valid(&scripts);
        let mut library = DialogLibrary::from_parts(scripts, bag, self.dialog_version_id);
        let active_dropped = self
            .dialog_active
            .is_some_and(|index| !library.resume(index));
        if clamped > 0 || dropped > 0 || active_dropped {
            warn!(
                npc = npc_key,
                clamped_cursors = clamped,
                dropped_bag_entries = dropped,
                active_dropped,
                "dialog_save_sanitized"
            );
        }

        Ok(library)
    }
}

/// Resting on a play-once script would replay it, so it reads as exhausted;
/// exhausted on a repeatable script reads as resting.
fn sanitize_next(raw: i64, len: usize, play_once: bool) -> (NextLine, bool) {
    let (next, clamped) = NextLine::from_stored(raw, len);
    match (next, play_once) {
        (NextLine::Resting, true) => (NextLine::Exhausted, true),
        (NextLine::Exhausted, false) => (NextLine::Resting, true),
        _ => (next, clamped),
    }
}

fn sanitize_current(raw: i64, len: usize) -> (Option<usize>, bool) {
    match raw {
        -1 => (None, false),
        raw if raw < -1 => (None, true),
        raw => {
            let index = usize::try_from(raw).unwrap_or(usize::MAX);
            if index > len {
                (Some(len), true)
            } else {
                (Some(index), false)
            }
        }
    }
}

impl SaveGame {
    pub fn save_to_path(&self, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self).map_err(PersistenceError::Encode)?;
        write_save_atomic(path, json.as_bytes()).map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), npcs = self.npcs.len(), "save_written");
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, PersistenceError> {
        let raw = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let save = Self::parse_json(&raw)?;
        save.validate()?;
        info!(path = %path.display(), npcs = save.npcs.len(), "save_loaded");
        Ok(save)
    }

    pub fn parse_json(raw: &str) -> Result<Self, PersistenceError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            PersistenceError::Parse {
                path: if path.is_empty() { ".".to_string() } else { path },
                source: error.into_inner(),
            }
        })
    }

    fn validate(&self) -> Result<(), PersistenceError> {
        if self.save_version != SAVE_VERSION {
            return Err(expected_actual(
                "save_version",
                SAVE_VERSION,
                self.save_version,
            ));
        }
        for (npc_key, npc) in &self.npcs {
            if npc_key.trim().is_empty() {
                return Err(validation_err("npcs", "npc key must be non-empty"));
            }
            if let Some(idx) = npc
                .dialog_list
                .iter()
                .position(|script| script.messages.is_empty())
            {
                return Err(validation_err(
                    &format!("npcs.{npc_key}.dialog_list[{idx}].messages"),
                    "script must contain at least one message",
                ));
            }
        }
        Ok(())
    }
}

fn validation_err(path: &str, message: impl Into<String>) -> PersistenceError {
    PersistenceError::Validation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> PersistenceError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

/// Writes `<name>.tmp` next to `path`, then renames it over `path`.
fn write_save_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, bytes)?;

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }
    }
    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "save".into());
    name.push(".tmp");
    path.with_file_name(name)
}
