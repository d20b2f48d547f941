use std::path::{Path, PathBuf};

use crate::components::tools::Tool;
use crate::grid::TileSize;

/// Editor-wide options the canvas core reads but never writes.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub tile_size: TileSize,
    /// When enabled, pasted tiles blend over existing pixels instead of
    /// replacing them.
    pub transparency_enabled: bool,
    pub tool: Tool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tile_size: TileSize::default(),
            transparency_enabled: false,
            tool: Tool::Selection,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/tilesnap/tilesnap_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\TileSnap\tilesnap_settings.cfg
    /// On macOS:   ~/Library/Application Support/TileSnap/tilesnap_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("tilesnap");
            Some(config_dir.join("tilesnap_settings.cfg"))
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            Some(PathBuf::from(appdata).join("TileSnap").join("tilesnap_settings.cfg"))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("TileSnap")
                    .join("tilesnap_settings.cfg"),
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("tilesnap_settings.cfg")))
        }
    }

    /// Load settings from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Save settings to the default location.  Failures are logged, not fatal.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config())
    }

    pub fn to_config(&self) -> String {
        format!(
            "tile_width={}\n\
             tile_height={}\n\
             transparency_enabled={}\n\
             tool={}\n",
            self.tile_size.width(),
            self.tile_size.height(),
            self.transparency_enabled,
            self.tool.key(),
        )
    }

    /// Parse `key=value` lines.  Unknown keys and bad values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        let mut tile_w = s.tile_size.width();
        let mut tile_h = s.tile_size.height();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "tile_width" => {
                    if let Ok(w) = val.parse::<u32>()
                        && w > 0
                    {
                        tile_w = w;
                    }
                }
                "tile_height" => {
                    if let Ok(h) = val.parse::<u32>()
                        && h > 0
                    {
                        tile_h = h;
                    }
                }
                "transparency_enabled" => {
                    s.transparency_enabled = val == "true";
                }
                "tool" => {
                    if let Some(tool) = Tool::from_key(val) {
                        s.tool = tool;
                    }
                }
                _ => {}
            }
        }
        s.tile_size = TileSize::new(tile_w, tile_h);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trip() {
        let s = Settings {
            tile_size: TileSize::new(24, 12),
            transparency_enabled: true,
            tool: Tool::Fill,
        };
        assert_eq!(Settings::parse(&s.to_config()), s);
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let s = Settings::parse(
            "tile_width=0\ntile_height=abc\ntool=chainsaw\nnonsense\ntransparency_enabled=true\n",
        );
        assert_eq!(s.tile_size, TileSize::default());
        assert_eq!(s.tool, Tool::Selection);
        assert!(s.transparency_enabled);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path =
            std::env::temp_dir().join(format!("tilesnap-missing-{}.cfg", uuid::Uuid::new_v4()));
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn save_to_then_load_from() {
        let path =
            std::env::temp_dir().join(format!("tilesnap-settings-{}.cfg", uuid::Uuid::new_v4()));
        let s = Settings { tile_size: TileSize::new(32, 8), ..Settings::default() };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
        let _ = std::fs::remove_file(path);
    }
}
