//! Everything the user changed that should survive a restart.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::MyResult;
use crate::lights::StripSettings;
use crate::logging::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripRecord {
    pub settings: StripSettings,
    pub current_step: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerRecord {
    pub strips: Vec<StripRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub palette: Vec<[u8; 3]>,
    pub steps_per_transition: usize,
    /// catalog indexes in the auto-cycle
    pub auto_cycle: Vec<usize>,
    pub sensitivity: f32,
    /// by controller index, then strip index
    pub controllers: Vec<ControllerRecord>,
}

impl PersistedState {
    /// nothing saved yet
    pub fn from_config(config: &Config) -> Self {
        Self {
            palette: config.palette.iter().map(|x| [x.r, x.g, x.b]).collect(),
            steps_per_transition: config.steps_per_transition,
            auto_cycle: config.auto_cycle.clone(),
            sensitivity: config.audio.sensitivity,
            controllers: vec![],
        }
    }

    pub fn strip(&self, controller: usize, strip: usize) -> Option<&StripRecord> {
        self.controllers.get(controller)?.strips.get(strip)
    }
}

pub trait SettingsStore: Send + Sync {
    /// `None` when nothing has been saved
    fn load(&self) -> MyResult<Option<PersistedState>>;

    fn save(&self, state: &PersistedState) -> MyResult<()>;
}

/// Keeps settings for as long as the process runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<PersistedState>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(state: Option<PersistedState>) -> Self {
        Self {
            state: Mutex::new(state),
            saves: Mutex::new(0),
        }
    }

    pub fn saves(&self) -> MyResult<usize> {
        Ok(*self.saves.lock()?)
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> MyResult<Option<PersistedState>> {
        Ok(self.state.lock()?.clone())
    }

    fn save(&self, state: &PersistedState) -> MyResult<()> {
        *self.state.lock()? = Some(state.clone());
        *self.saves.lock()? += 1;

        Ok(())
    }
}

/// postcard on disk. Writes go to a temporary file that is renamed over the old one.
pub struct PostcardFileStore {
    path: PathBuf,
}

impl PostcardFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for PostcardFileStore {
    fn load(&self) -> MyResult<Option<PersistedState>> {
        let bytes = match fs::read(&self.path) {
            Ok(x) => x,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("no saved settings at {}", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let state = postcard::from_bytes(&bytes)?;

        debug!("loaded {} bytes of settings", bytes.len());

        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> MyResult<()> {
        let bytes = postcard::to_stdvec(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");

        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;

        debug!("saved {} bytes of settings to {}", bytes.len(), self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::process;

    use super::*;

    fn state() -> PersistedState {
        let mut state = PersistedState::from_config(&Config::default());

        state.controllers.push(ControllerRecord {
            strips: vec![StripRecord {
                settings: StripSettings {
                    mode_index: 3,
                    static_color: Some([1, 2, 3]),
                    ..Default::default()
                },
                current_step: 42,
            }],
        });

        state
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::default();

        assert_eq!(store.load().unwrap(), None);

        store.save(&state()).unwrap();

        assert_eq!(store.load().unwrap(), Some(state()));
        assert_eq!(store.saves().unwrap(), 1);
    }

    #[test_log::test]
    fn test_file_store_survives_a_restart() {
        let dir = std::env::temp_dir().join(format!("moth-lights-test-{}", process::id()));
        let path = dir.join("settings.postcard");

        let store = PostcardFileStore::new(&path);
        assert_eq!(store.load().unwrap(), None);

        store.save(&state()).unwrap();

        let reopened = PostcardFileStore::new(&path);
        let loaded = reopened.load().unwrap().unwrap();

        assert_eq!(loaded, state());
        assert_eq!(loaded.strip(0, 0).unwrap().current_step, 42);
        assert!(loaded.strip(0, 1).is_none());
        assert!(!path.with_extension("tmp").exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_garbage_is_an_error() {
        let path = std::env::temp_dir().join(format!("moth-lights-garbage-{}.postcard", process::id()));
        fs::write(&path, [0xff; 3]).unwrap();

        assert!(PostcardFileStore::new(&path).load().is_err());

        fs::remove_file(path).unwrap();
    }
}
