//! Application settings and the business profile.
//!
//! `settings.toml` lives in the platform config directory and only says where
//! the data root is. Everything else (`business.toml`, records, outputs) lives
//! under the data root.

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::BusinessSettings;

pub const DATA_ROOT_ENV: &str = "INVOICE_DESK_DATA_ROOT";
pub const PUBLIC_URL_ENV: &str = "INVOICE_DESK_PUBLIC_URL";

pub const DEFAULT_DATA_ROOT: &str = "~/Documents/Invoices";

/// Seed for `<data_root>/business.toml`.
pub const DEFAULT_BUSINESS_TEMPLATE: &str = include_str!("../business.toml");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    pub data_root: String,
    /// Base URL of the hosted invoice viewer, used for links in emails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl AppSettings {
    /// Apply environment overrides on top of whatever was loaded.
    pub fn with_env(mut self) -> Self {
        if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
            if !root.trim().is_empty() {
                self.data_root = root;
            }
        }
        if let Ok(url) = std::env::var(PUBLIC_URL_ENV) {
            if !url.trim().is_empty() {
                self.public_url = Some(url);
            }
        }
        self
    }

    pub fn root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_root: DEFAULT_DATA_ROOT.to_string(),
            public_url: None,
        }
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-desk", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn load_settings() -> Option<AppSettings> {
    let path = get_config_path();
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

pub fn save_settings(settings: &AppSettings) -> Result<PathBuf> {
    let path = get_config_path();
    fs::write(&path, toml::to_string_pretty(settings)?)?;
    tracing::info!("Saved settings to {}", path.display());
    Ok(path)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

pub fn business_settings_path(root: &Path) -> PathBuf {
    root.join("business.toml")
}

/// Read `business.toml`, writing the embedded default first if it is missing.
pub fn load_business_settings(root: &Path) -> Result<BusinessSettings> {
    let path = business_settings_path(root);
    if path.exists() {
        let content = fs::read_to_string(&path)?;
        return Ok(toml::from_str(&content)?);
    }

    tracing::info!("Initializing default business profile at {}", path.display());
    fs::create_dir_all(root)?;
    fs::write(&path, DEFAULT_BUSINESS_TEMPLATE)?;
    Ok(toml::from_str(DEFAULT_BUSINESS_TEMPLATE)?)
}

pub fn save_business_settings(root: &Path, settings: &BusinessSettings) -> Result<()> {
    fs::create_dir_all(root)?;
    fs::write(business_settings_path(root), toml::to_string_pretty(settings)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home_dir("/srv/invoices"), "/srv/invoices");
    }

    #[test]
    fn business_settings_are_seeded_once() {
        let temp = TempDir::new().unwrap();
        let mut settings = load_business_settings(temp.path()).unwrap();
        assert!(business_settings_path(temp.path()).exists());

        settings.business.name = "Acme Plumbing".into();
        settings.limits.monthly_invoices = Some(3);
        save_business_settings(temp.path(), &settings).unwrap();

        let reloaded = load_business_settings(temp.path()).unwrap();
        assert_eq!(reloaded.business.name, "Acme Plumbing");
        assert_eq!(reloaded.limits.monthly_invoices, Some(3));
    }
}
