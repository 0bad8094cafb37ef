use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;

const STORE_FILENAME: &str = "profiles.json";

/// A phone number that has been used to log in on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub phone_number: String,
    pub label: Option<String>,
    /// Milliseconds since the Unix epoch
    pub last_used: i64,
}

pub struct ProfileStore {
    path: PathBuf,
    profiles: Mutex<Vec<Profile>>,
}

impl ProfileStore {
    /// Open the store in `data_dir`, creating the directory if needed
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(STORE_FILENAME);

        let profiles = if path.exists() {
            Self::load_from_disk(&path)?
        } else {
            Vec::new()
        };
        log::debug!("Loaded {} profiles from {}", profiles.len(), path.display());

        Ok(Self {
            path,
            profiles: Mutex::new(profiles),
        })
    }

    fn load_from_disk(path: &Path) -> Result<Vec<Profile>, StoreError> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save_to_disk(path: &Path, profiles: &[Profile]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(profiles)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Profile>> {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a change and persist it
    fn update<F, T>(&self, updater: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Profile>) -> T,
    {
        let mut profiles = self.lock();
        let result = updater(&mut *profiles);
        Self::save_to_disk(&self.path, &profiles)?;
        Ok(result)
    }

    /// Profiles, most recently used first
    pub fn profiles(&self) -> Vec<Profile> {
        let mut profiles = self.lock().clone();
        profiles.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        profiles
    }

    pub fn get(&self, phone_number: &str) -> Option<Profile> {
        self.lock()
            .iter()
            .find(|p| p.phone_number == phone_number)
            .cloned()
    }

    /// Insert or replace the profile for `phone_number`
    pub fn add_profile(&self, phone_number: &str, label: Option<&str>) -> Result<(), StoreError> {
        let profile = Profile {
            phone_number: phone_number.to_string(),
            label: label.map(str::to_string),
            last_used: now_millis(),
        };
        self.update(|profiles| {
            match profiles.iter().position(|p| p.phone_number == phone_number) {
                Some(index) => profiles[index] = profile,
                None => profiles.push(profile),
            }
        })
    }

    /// Returns false if no profile has that number
    pub fn update_last_used(&self, phone_number: &str) -> Result<bool, StoreError> {
        let mut profiles = self.lock();
        let Some(profile) = profiles.iter_mut().find(|p| p.phone_number == phone_number) else {
            return Ok(false);
        };
        profile.last_used = now_millis();
        Self::save_to_disk(&self.path, &profiles)?;
        Ok(true)
    }

    pub fn delete_profile(&self, phone_number: &str) -> Result<(), StoreError> {
        self.update(|profiles| profiles.retain(|p| p.phone_number != phone_number))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
