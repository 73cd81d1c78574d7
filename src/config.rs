use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// User preferences persisted to `prefs.toml` in the platform config dir.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  pub videos_per_page: Option<usize>,
  /// Base URL of the PostgREST backend. Without one the app runs offline.
  pub backend_url: Option<String>,
  pub anon_key: Option<String>,
  pub access_token: Option<String>,
  pub user_id: Option<String>,
}

impl Config {
  fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "vg")
  }

  pub fn load() -> Self {
    if let Some(proj_dirs) = Self::project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(&config_file) {
        match Self::parse(&content) {
          Ok(config) => return config,
          Err(e) => warn!(path = %config_file.display(), err = %e, "config: ignoring unreadable prefs"),
        }
      }
    }
    Self::default()
  }

  pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = Self::project_dirs() {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        match toml::to_string(self) {
          Ok(content) => {
            if let Err(e) = std::fs::write(&config_file, content) {
              warn!(path = %config_file.display(), err = %e, "config: save failed");
            }
          }
          Err(e) => warn!(err = %e, "config: serialize failed"),
        }
      }
    }
  }

  /// Directory for log files, next to other app data.
  pub fn log_dir() -> Option<std::path::PathBuf> {
    Self::project_dirs().map(|d| d.data_local_dir().join("logs"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_partial_prefs() {
    let config = Config::parse("theme_name = \"Midnight\"\nvideos_per_page = 50\n").unwrap();
    assert_eq!(config.theme_name.as_deref(), Some("Midnight"));
    assert_eq!(config.videos_per_page, Some(50));
    assert_eq!(config.backend_url, None);
  }

  #[test]
  fn serializes_back() {
    let config = Config {
      backend_url: Some("https://db.example.com".into()),
      user_id: Some("alice".into()),
      ..Default::default()
    };
    let text = toml::to_string(&config).unwrap();
    assert_eq!(Config::parse(&text).unwrap(), config);
  }

  #[test]
  fn rejects_wrong_types() {
    assert!(Config::parse("videos_per_page = \"many\"").is_err());
  }
}
