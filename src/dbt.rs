//! Connection settings from dbt `profiles.yml`.
//!
//! A source is named `profile` (using the profile's default target) or
//! `profile.target`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{SqlCraftError, SqlCraftResult};

/// One `outputs` entry of a dbt profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DbtSource {
    #[serde(skip)]
    pub profile: String,
    #[serde(skip)]
    pub target: String,
    #[serde(rename = "type")]
    pub db_type: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, alias = "pass")]
    pub password: Option<String>,
    #[serde(default, alias = "dbname")]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

impl DbtSource {
    pub fn name(&self) -> String {
        format!("{}.{}", self.profile, self.target)
    }
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    outputs: BTreeMap<String, DbtSource>,
}

/// `~/.dbt/profiles.yml`.
pub fn default_profiles_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".dbt").join("profiles.yml"))
}

fn config_error(path: &Path, message: impl std::fmt::Display) -> SqlCraftError {
    SqlCraftError::Config(format!("{}: {}", path.display(), message))
}

fn read_profiles(path: &Path) -> SqlCraftResult<BTreeMap<String, Profile>> {
    let source = fs::read_to_string(path).map_err(|e| config_error(path, e))?;
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(&source).map_err(|e| config_error(path, e))?;

    let mut profiles = BTreeMap::new();
    for (name, value) in raw {
        // Top-level `config:` holds dbt settings, not a profile.
        if name == "config" {
            continue;
        }
        let profile: Profile = serde_yaml::from_value(value)
            .map_err(|e| config_error(path, format!("profile {}: {}", name, e)))?;
        profiles.insert(name, profile);
    }
    Ok(profiles)
}

/// Resolve `profile` or `profile.target`.
pub fn resolve(path: &Path, name: &str) -> SqlCraftResult<DbtSource> {
    let (profile_name, target) = match name.split_once('.') {
        Some((profile, target)) => (profile, Some(target)),
        None => (name, None),
    };
    let mut profiles = read_profiles(path)?;
    let profile = profiles
        .remove(profile_name)
        .ok_or_else(|| config_error(path, format!("no dbt profile named {}", profile_name)))?;

    let target = match target.map(str::to_string).or(profile.target) {
        Some(target) => target,
        None if profile.outputs.len() == 1 => profile.outputs.keys().next().cloned().unwrap_or_default(),
        None => {
            return Err(config_error(
                path,
                format!("dbt profile {} has no default target", profile_name),
            ));
        }
    };
    let mut source = profile
        .outputs
        .get(&target)
        .cloned()
        .ok_or_else(|| config_error(path, format!("dbt profile {} has no target {}", profile_name, target)))?;
    source.profile = profile_name.to_string();
    source.target = target;
    debug!(source = %source.name(), db_type = %source.db_type, "resolved dbt profile");
    Ok(source)
}
