use dotboy_core::Model;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmulationMode {
    #[default]
    Auto,
    ForceDmg,
    ForceCgb,
}

impl EmulationMode {
    pub fn forced_model(self) -> Option<Model> {
        match self {
            Self::Auto => None,
            Self::ForceDmg => Some(Model::Dmg),
            Self::ForceCgb => Some(Model::Cgb),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub emulation_mode: EmulationMode,
    pub dmg_bootrom_path: Option<PathBuf>,
    pub cgb_bootrom_path: Option<PathBuf>,
    /// Where `.sav`/`.rtc` files go; next to the ROM when unset.
    pub save_dir: Option<PathBuf>,
    pub color_correction: bool,
    /// Throttle to real time. Off runs as fast as possible.
    pub pacing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emulation_mode: EmulationMode::Auto,
            dmg_bootrom_path: None,
            cgb_bootrom_path: None,
            save_dir: None,
            color_correction: true,
            pacing: true,
        }
    }
}

impl Config {
    pub fn bootrom_for(&self, model: Model) -> Option<&Path> {
        match model {
            Model::Dmg => self.dmg_bootrom_path.as_deref(),
            Model::Cgb => self.cgb_bootrom_path.as_deref(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("dotboy").join("config.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dotboy").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dotboy")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

pub fn parse(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

pub fn load_from_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config at {}", path.display());
            return Config::default();
        }
        Err(e) => {
            warn!(
                "Failed to read config {}: {e}; using defaults",
                path.display()
            );
            return Config::default();
        }
    };

    match parse(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            Config::default()
        }
    }
}
