use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// Key under which the Google API key is stored
const API_KEY_KEY: &str = "google_api_key";

/// A small storage for API keys and other sensitive information
///
/// Provides functionality to store, retrieve, and manage secrets
/// in a JSON file located in the user's home directory. The CLI uses it as
/// the last credential fallback after the explicit flag and the
/// environment variable.
#[derive(Debug, Serialize, Deserialize)]
pub struct SecretStore {
    /// Map of secret keys to their values
    secrets: HashMap<String, String>,
    /// Path to the secrets file
    file_path: PathBuf,
}

impl SecretStore {
    /// Creates a new SecretStore instance
    ///
    /// Initializes the store with the default path
    /// (~/.gemini-playground/secrets.json) and loads any existing secrets
    /// from the file.
    pub fn new() -> io::Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Could not find home directory"))?;
        Self::with_path(home_dir.join(".gemini-playground").join("secrets.json"))
    }

    /// Creates a store backed by an explicit file path.
    pub fn with_path(file_path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut store = SecretStore {
            secrets: HashMap::new(),
            file_path,
        };

        store.load()?;
        Ok(store)
    }

    /// Loads secrets from the file system
    fn load(&mut self) -> io::Result<()> {
        match File::open(&self.file_path) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents)?;
                self.secrets = serde_json::from_str(&contents).unwrap_or_default();
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Saves the current secrets to the file system
    fn save(&self) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(&self.secrets)?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Sets a secret value for the given key
    pub fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.secrets.insert(key.to_string(), value.to_string());
        self.save()
    }

    /// Retrieves a secret value for the given key
    pub fn get(&self, key: &str) -> Option<&String> {
        self.secrets.get(key)
    }

    /// Deletes a secret with the given key
    pub fn delete(&mut self, key: &str) -> io::Result<()> {
        self.secrets.remove(key);
        self.save()
    }

    /// Retrieves the stored Google API key, if any
    pub fn api_key(&self) -> Option<&String> {
        self.secrets.get(API_KEY_KEY)
    }

    /// Stores the Google API key for future runs
    pub fn set_api_key(&mut self, value: &str) -> io::Result<()> {
        self.set(API_KEY_KEY, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn api_key_round_trips_through_file() {
        let path = std::env::temp_dir()
            .join("gemini-playground-tests")
            .join(format!("{}.json", Uuid::new_v4()));

        let mut store = SecretStore::with_path(path.clone()).unwrap();
        assert_eq!(store.api_key(), None);
        store.set_api_key("k-123").unwrap();

        let reloaded = SecretStore::with_path(path.clone()).unwrap();
        assert_eq!(reloaded.api_key().map(String::as_str), Some("k-123"));

        let mut store = reloaded;
        store.delete(API_KEY_KEY).unwrap();
        let reloaded = SecretStore::with_path(path).unwrap();
        assert_eq!(reloaded.api_key(), None);
    }
}
