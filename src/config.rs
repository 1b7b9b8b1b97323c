use crate::classify::ClassifyError;
use crate::style::parse_hex;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "snap-map";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lookup table location: an http(s) URL or a file path.
    pub lookup_url: String,
    /// County polygons for the terminal viewer.
    pub counties_path: PathBuf,
    /// Where the viewer writes its log file. Defaults to the platform data dir.
    pub log_dir: Option<PathBuf>,
    pub style: StyleConfig,
    pub site: SiteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Feature property holding the county identifier.
    pub id_property: String,
    /// Bucket colors, lowest to highest. The length sets the bucket count.
    pub colors: Vec<String>,
    /// Paint color for counties that match no bucket.
    pub fallback_color: String,
    pub fill_opacity: f64,
    pub layer_id: String,
    pub source_id: String,
    pub source_layer: String,
    /// Layer the fill is inserted beneath, when the base style has it.
    pub before_layer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub template_dir: PathBuf,
    pub map_style: String,
    pub mapbox_token: String,
    /// Where the per-year style JSON is written.
    pub styles_dir: PathBuf,
    /// URL prefix the page fetches the style JSON from.
    pub styles_url: String,
    pub pages: Vec<PageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Template name relative to `template_dir`.
    pub src: String,
    pub dest: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookup_url: "snap_households_county_2020_2024.json".to_string(),
            counties_path: PathBuf::from("data/counties.geojson"),
            log_dir: None,
            style: StyleConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            id_property: "county_fips".to_string(),
            colors: ["#e0938d", "#d06f68", "#bb4f47", "#a73f37", "#8e342e"]
                .into_iter()
                .map(String::from)
                .collect(),
            fallback_color: "#ccc".to_string(),
            fill_opacity: 0.85,
            layer_id: "snap-counties-fill".to_string(),
            source_id: "composite".to_string(),
            source_layer: "albersusa".to_string(),
            before_layer: Some("county-boundaries".to_string()),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("src/pages"),
            map_style: "mapbox://styles/lynnstahl/cmhc3o1h5004q01qu3snzehqi".to_string(),
            mapbox_token: String::new(),
            styles_dir: PathBuf::from("dist/styles"),
            styles_url: "styles".to_string(),
            pages: vec![
                PageConfig {
                    src: "index.twig".to_string(),
                    dest: PathBuf::from("dist/index.html"),
                },
                PageConfig {
                    src: "home.twig".to_string(),
                    dest: PathBuf::from("dist/home.html"),
                },
            ],
        }
    }
}

/// Platform config directory for this tool.
pub fn config_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join(APP_DIR))
}

/// Path to the default config file.
pub fn config_path() -> Option<PathBuf> {
    Some(config_dir()?.join("config.toml"))
}

/// Default log directory when the config does not name one.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR).join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// A problem with the default config file that loading recovered from.
#[derive(Debug)]
pub enum LoadIssue {
    Invalid { path: PathBuf, error: toml::de::Error },
    WriteFailed { path: PathBuf, error: anyhow::Error },
}

impl LoadIssue {
    pub fn log(&self) {
        match self {
            LoadIssue::Invalid { path, error } => {
                tracing::warn!(path = %path.display(), error = %error, "ignoring invalid config");
            }
            LoadIssue::WriteFailed { path, error } => {
                tracing::debug!(path = %path.display(), error = %error, "could not write default config");
            }
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration. An explicit path must exist and parse. The default
    /// path falls back to defaults when missing or invalid, and a default
    /// file is written on first run. Logging is not up yet, so a recovered
    /// problem is handed back for the caller to report.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<LoadIssue>)> {
        let (config, issue) = match explicit {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                let config = Self::from_toml_str(&content)
                    .with_context(|| format!("invalid config {}", path.display()))?;
                (config, None)
            }
            None => match config_path() {
                Some(path) => Self::load_default_from(&path),
                None => (Self::default(), None),
            },
        };
        config.validate()?;
        Ok((config, issue))
    }

    fn load_default_from(path: &Path) -> (Self, Option<LoadIssue>) {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => (config, None),
                Err(error) => (
                    Self::default(),
                    Some(LoadIssue::Invalid {
                        path: path.to_path_buf(),
                        error,
                    }),
                ),
            },
            Err(_) => {
                let config = Self::default();
                let issue = config.write(path).err().map(|error| LoadIssue::WriteFailed {
                    path: path.to_path_buf(),
                    error,
                });
                (config, issue)
            }
        }
    }

    /// Write the config as TOML, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = format!("# snap-map configuration\n\n{}", toml::to_string_pretty(self)?);
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let style = &self.style;
        if style.colors.len() < 2 {
            return Err(ClassifyError::TooFewColors(style.colors.len()).into());
        }
        for color in style.colors.iter().chain([&style.fallback_color]) {
            parse_hex(color)?;
        }
        if !(0.0..=1.0).contains(&style.fill_opacity) {
            bail!("fill_opacity must be within 0..=1, got {}", style.fill_opacity);
        }
        Ok(())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.style.colors.len(), 5);
        assert_eq!(config.site.pages.len(), 2);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r##"
            lookup_url = "https://example.org/lookup.json"

            [style]
            colors = ["#fee", "#c00", "#600"]
            "##,
        )
        .unwrap();
        assert_eq!(config.lookup_url, "https://example.org/lookup.json");
        assert_eq!(config.style.colors.len(), 3);
        assert_eq!(config.style.fallback_color, "#ccc");
        assert_eq!(config.site.template_dir, PathBuf::from("src/pages"));
    }

    #[test]
    fn test_single_color_rejected() {
        let mut config = Config::default();
        config.style.colors.truncate(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_color_rejected() {
        let mut config = Config::default();
        config.style.fallback_color = "grey".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_then_load_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.style.fill_opacity = 0.5;
        config.write(&path).unwrap();
        let (loaded, issue) = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert!(issue.is_none());
    }

    #[test]
    fn test_explicit_missing_or_invalid_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "colors = 3 = 4").unwrap();
        assert!(Config::load(Some(&bad)).is_err());
    }

    #[test]
    fn test_invalid_default_file_reports_issue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "colors = = broken").unwrap();

        let (config, issue) = Config::load_default_from(&path);
        assert_eq!(config, Config::default());
        match issue {
            Some(LoadIssue::Invalid { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected an invalid-config issue, got {other:?}"),
        }
        // The broken file is left for the user to fix
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "colors = = broken");
    }

    #[test]
    fn test_missing_default_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap-map/config.toml");

        let (config, issue) = Config::load_default_from(&path);
        assert!(issue.is_none());
        assert_eq!(config, Config::default());
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Config::from_toml_str(&written).unwrap(), config);
    }
}
