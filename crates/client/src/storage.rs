//! Session persistence.
//!
//! The bearer token and the signed-in user's profile live under fixed keys
//! as JSON files in one directory:
//!   - Linux: `~/.config/stockmaster/`
//!   - macOS: `~/Library/Application Support/stockmaster/`
//!   - Windows: `%APPDATA%\stockmaster\`
//!
//! or wherever `STOCKMASTER_SESSION_DIR` points.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use stockmaster_shared::User;

pub const TOKEN_KEY: &str = "stockmaster_token";
pub const USER_KEY: &str = "stockmaster_user";

/// Key/value store backed by JSON files in a single directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the platform config directory, falling back to the working directory.
    pub fn in_config_dir() -> Self {
        let dir = dirs::config_dir()
            .map(|d| d.join("stockmaster"))
            .unwrap_or_else(|| PathBuf::from(".stockmaster"));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a value. Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.save_raw(key, &json),
            Err(_) => false,
        }
    }

    /// Load a value. Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.load_raw(key)?;
        serde_json::from_str(&json).ok()
    }

    pub fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.load_raw(key).is_some()
    }

    // --- Session accessors ---

    pub fn token(&self) -> Option<String> {
        self.load::<String>(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Persist the bearer token, or remove it when `None`.
    pub fn set_token(&self, token: Option<&str>) {
        match token {
            Some(token) => {
                if !self.save(TOKEN_KEY, &token) {
                    crate::log_warn!("Failed to persist session token in {}", self.dir.display());
                }
            }
            None => self.remove(TOKEN_KEY),
        }
    }

    pub fn user(&self) -> Option<User> {
        self.load(USER_KEY)
    }

    pub fn set_user(&self, user: &User) {
        if !self.save(USER_KEY, user) {
            crate::log_warn!("Failed to persist user profile in {}", self.dir.display());
        }
    }

    /// Remove the token and the user profile.
    pub fn clear(&self) {
        self.remove(TOKEN_KEY);
        self.remove(USER_KEY);
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() {
            return None;
        }
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(self.dir.join(format!("{}.json", safe_key)))
    }

    fn save_raw(&self, key: &str, value: &str) -> bool {
        let Some(path) = self.file_path(key) else {
            return false;
        };
        if std::fs::create_dir_all(&self.dir).is_err() {
            return false;
        }
        std::fs::write(path, value).is_ok()
    }

    fn load_raw(&self, key: &str) -> Option<String> {
        let path = self.file_path(key)?;
        std::fs::read_to_string(path).ok()
    }
}
