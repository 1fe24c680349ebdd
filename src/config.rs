//! Profile file handling.
//!
//! The config file holds the automation backend settings, the name of the
//! active profile and one table per screen-resolution profile. Every profile
//! field falls back to its own hardcoded default, whether it is missing or
//! holds a value of the wrong type, so a half-written profile is still usable.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use tracing::{info, warn};

use crate::color_utils::{rgb, Color};
use crate::error::ConfigError;

pub const DEFAULT_PROFILE: &str = "3440x1440";
pub const WINDOWED_PROFILE: &str = "1080p_Windowed";
pub const DEFAULT_WINDOW_TITLE: &str = "Roblox";

/// Screen coordinate in absolute desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One profile table as it appears on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "RawProfileSection")]
pub struct ProfileSection {
    pub pixel_check_x: i32,
    pub pixel_check_y: i32,
    pub expected_color_r: u8,
    pub expected_color_g: u8,
    pub expected_color_b: u8,
    pub button_pixel_x: i32,
    pub button_pixel_y: i32,
    pub expected_button_color_r: u8,
    pub expected_button_color_g: u8,
    pub expected_button_color_b: u8,
    pub jump_interval: u64,
    pub toggle_key: String,
}

impl Default for ProfileSection {
    fn default() -> Self {
        Self {
            pixel_check_x: 1670,
            pixel_check_y: 650,
            expected_color_r: 58,
            expected_color_g: 59,
            expected_color_b: 61,
            button_pixel_x: 1822,
            button_pixel_y: 785,
            expected_button_color_r: 255,
            expected_button_color_g: 255,
            expected_button_color_b: 255,
            jump_interval: 5,
            toggle_key: "f4".to_string(),
        }
    }
}

impl ProfileSection {
    fn windowed() -> Self {
        Self {
            pixel_check_x: 957,
            pixel_check_y: 477,
            button_pixel_x: 1054,
            button_pixel_y: 606,
            ..Self::default()
        }
    }
}

/// A profile table before validation. Each value is kept as raw TOML so one
/// bad field cannot reject the whole file.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawProfileSection {
    pixel_check_x: Option<toml::Value>,
    pixel_check_y: Option<toml::Value>,
    expected_color_r: Option<toml::Value>,
    expected_color_g: Option<toml::Value>,
    expected_color_b: Option<toml::Value>,
    button_pixel_x: Option<toml::Value>,
    button_pixel_y: Option<toml::Value>,
    expected_button_color_r: Option<toml::Value>,
    expected_button_color_g: Option<toml::Value>,
    expected_button_color_b: Option<toml::Value>,
    jump_interval: Option<toml::Value>,
    toggle_key: Option<toml::Value>,
}

impl From<RawProfileSection> for ProfileSection {
    fn from(raw: RawProfileSection) -> Self {
        let d = ProfileSection::default();
        Self {
            pixel_check_x: field("pixel_check_x", raw.pixel_check_x, d.pixel_check_x),
            pixel_check_y: field("pixel_check_y", raw.pixel_check_y, d.pixel_check_y),
            expected_color_r: field("expected_color_r", raw.expected_color_r, d.expected_color_r),
            expected_color_g: field("expected_color_g", raw.expected_color_g, d.expected_color_g),
            expected_color_b: field("expected_color_b", raw.expected_color_b, d.expected_color_b),
            button_pixel_x: field("button_pixel_x", raw.button_pixel_x, d.button_pixel_x),
            button_pixel_y: field("button_pixel_y", raw.button_pixel_y, d.button_pixel_y),
            expected_button_color_r: field(
                "expected_button_color_r",
                raw.expected_button_color_r,
                d.expected_button_color_r,
            ),
            expected_button_color_g: field(
                "expected_button_color_g",
                raw.expected_button_color_g,
                d.expected_button_color_g,
            ),
            expected_button_color_b: field(
                "expected_button_color_b",
                raw.expected_button_color_b,
                d.expected_button_color_b,
            ),
            jump_interval: field("jump_interval", raw.jump_interval, d.jump_interval),
            toggle_key: field("toggle_key", raw.toggle_key, d.toggle_key),
        }
    }
}

/// Convert one raw profile value, keeping `default` if it is absent or has
/// the wrong type.
///
/// # Arguments
///
/// * `name` - Field name, only used in the warning.
/// * `raw` - The value as read from the file, if any.
/// * `default` - The hardcoded value for this field.
fn field<T: DeserializeOwned>(name: &str, raw: Option<toml::Value>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.try_into().unwrap_or_else(|err| {
            warn!(field = name, "invalid profile value, using default: {err}");
            default
        }),
    }
}

/// The resolved, ready-to-use form of a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub check_pixel: Point,
    pub expected_color: Color,
    pub button_pixel: Point,
    pub expected_button_color: Color,
    pub jump_interval: Duration,
    pub toggle_key: String,
}

impl Profile {
    fn from_section(name: &str, section: &ProfileSection) -> Self {
        Self {
            name: name.to_string(),
            check_pixel: Point {
                x: section.pixel_check_x,
                y: section.pixel_check_y,
            },
            expected_color: rgb(
                section.expected_color_r,
                section.expected_color_g,
                section.expected_color_b,
            ),
            button_pixel: Point {
                x: section.button_pixel_x,
                y: section.button_pixel_y,
            },
            expected_button_color: rgb(
                section.expected_button_color_r,
                section.expected_button_color_g,
                section.expected_button_color_b,
            ),
            jump_interval: Duration::from_secs(section.jump_interval.max(1)),
            toggle_key: section.toggle_key.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AutomationSection {
    /// Path to the AutoHotkey executable, empty when not yet located.
    pub path: String,
    /// Title of the window activated before each click.
    pub window_title: String,
}

impl Default for AutomationSection {
    fn default() -> Self {
        Self {
            path: String::new(),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeneralSection {
    pub active_profile: String,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            active_profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

/// Whole config file contents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub automation: AutomationSection,
    pub general: GeneralSection,
    pub profiles: BTreeMap<String, ProfileSection>,
}

impl Config {
    /// The two profiles written on first run.
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), ProfileSection::default());
        profiles.insert(WINDOWED_PROFILE.to_string(), ProfileSection::windowed());
        Self {
            automation: AutomationSection::default(),
            general: GeneralSection::default(),
            profiles,
        }
    }
}

/// Named profiles plus the active selection, bound to a file on disk.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    config: Config,
}

impl ProfileStore {
    /// Return the default path to the config file
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Per-user directory holding the config and the log file.
    pub fn config_dir() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("com", "AlexanderBayerl", "AfkSentry") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from(".")
        }
    }

    /// Load the store from `path`, writing the built-in profiles on first run.
    ///
    /// A file that cannot be parsed at all is copied to `config.toml.bak`
    /// and the built-in profiles are used in memory. The next save replaces
    /// the original, but the copy keeps the user's profiles.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            let store = Self {
                path,
                config: Config::builtin(),
            };
            store.save()?;
            info!(path = %store.path.display(), "created default configuration");
            return Ok(store);
        }

        let content = fs::read_to_string(&path)?;
        let config = match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), "unreadable configuration, using built-in profiles: {err}");
                let backup = backup_path(&path);
                match fs::copy(&path, &backup) {
                    Ok(_) => warn!(backup = %backup.display(), "kept a copy of the unreadable configuration"),
                    Err(err) => warn!(backup = %backup.display(), "could not back up configuration: {err}"),
                }
                Config::builtin()
            }
        };
        info!(path = %path.display(), "configuration loaded");
        Ok(Self { path, config })
    }

    /// Rewrite the whole file through a temp file and a rename.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(&self.config)?;
        let tmp = self.path.with_extension("toml.tmp");
        let write = fs::write(&tmp, content).and_then(|_| fs::rename(&tmp, &self.path));
        write.map_err(|source| {
            if tmp.is_file() {
                let _ = fs::remove_file(&tmp);
            }
            ConfigError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn active_name(&self) -> &str {
        &self.config.general.active_profile
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.config.profiles.keys().cloned().collect()
    }

    /// Resolved view of a named profile, if it exists.
    pub fn profile(&self, name: &str) -> Option<Profile> {
        self.config
            .profiles
            .get(name)
            .map(|section| Profile::from_section(name, section))
    }

    pub fn automation(&self) -> &AutomationSection {
        &self.config.automation
    }

    /// Remember where the automation executable lives.
    pub fn set_automation_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        let path = path.display().to_string();
        if self.config.automation.path == path {
            return Ok(());
        }
        self.config.automation.path = path;
        self.save()
    }

    /// Make `name` the active profile. Returns `false` without touching
    /// anything if no such profile exists.
    pub fn switch_active(&mut self, name: &str) -> Result<bool, ConfigError> {
        if !self.config.profiles.contains_key(name) {
            warn!(profile = name, "profile does not exist");
            return Ok(false);
        }
        self.config.general.active_profile = name.to_string();
        self.save()?;
        info!(profile = name, "switched profile");
        Ok(true)
    }

    /// The profile the loop should run with.
    ///
    /// An unknown active name is replaced by the default profile, which is
    /// recreated from the hardcoded values if missing. Repairs are written
    /// back immediately.
    pub fn resolve_active(&mut self) -> Result<Profile, ConfigError> {
        let mut repaired = false;
        let active = self.config.general.active_profile.clone();

        if !self.config.profiles.contains_key(&active) {
            warn!(profile = %active, "profile not found, using default {DEFAULT_PROFILE}");
            self.config.general.active_profile = DEFAULT_PROFILE.to_string();
            repaired = true;

            if !self.config.profiles.contains_key(DEFAULT_PROFILE) {
                info!("creating default {DEFAULT_PROFILE} profile");
                self.config
                    .profiles
                    .insert(DEFAULT_PROFILE.to_string(), ProfileSection::default());
            }
        }

        if repaired {
            self.save()?;
        }

        let name = self.config.general.active_profile.clone();
        let section = self
            .config
            .profiles
            .get(&name)
            .cloned()
            .unwrap_or_default();
        let profile = Profile::from_section(&name, &section);
        info!(
            profile = %profile.name,
            check = %profile.check_pixel,
            button = %profile.button_pixel,
            "loaded profile"
        );
        Ok(profile)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ProfileStore {
        ProfileStore::load(dir.path().join("config.toml")).unwrap()
    }

    fn reload(store: &ProfileStore) -> ProfileStore {
        ProfileStore::load(store.path().to_path_buf()).unwrap()
    }

    #[test]
    fn first_run_writes_builtin_profiles() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.path().exists());
        assert_eq!(store.profile_names(), vec![WINDOWED_PROFILE, DEFAULT_PROFILE]);
        assert_eq!(store.active_name(), DEFAULT_PROFILE);

        let windowed = store.profile(WINDOWED_PROFILE).unwrap();
        assert_eq!(windowed.check_pixel, Point { x: 957, y: 477 });
        assert_eq!(windowed.jump_interval, Duration::from_secs(5));
        assert_eq!(windowed.toggle_key, "f4");
    }

    #[test]
    fn missing_fields_fall_back_individually() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[general]\nactive_profile = \"custom\"\n\n[profiles.custom]\npixel_check_x = 10\nexpected_color_g = 1\n",
        )
        .unwrap();

        let mut store = ProfileStore::load(path).unwrap();
        let profile = store.resolve_active().unwrap();
        assert_eq!(profile.name, "custom");
        assert_eq!(profile.check_pixel, Point { x: 10, y: 650 });
        assert_eq!(profile.expected_color, rgb(58, 1, 61));
        assert_eq!(profile.expected_button_color, rgb(255, 255, 255));
        assert_eq!(profile.jump_interval, Duration::from_secs(5));
        assert_eq!(store.automation().window_title, DEFAULT_WINDOW_TITLE);
    }

    #[test]
    fn zero_jump_interval_is_raised_to_one_second() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[profiles.3440x1440]\njump_interval = 0\n").unwrap();
        let mut store = ProfileStore::load(path).unwrap();
        assert_eq!(store.resolve_active().unwrap().jump_interval, Duration::from_secs(1));
    }

    #[test]
    fn switching_to_unknown_profile_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let before = fs::read_to_string(store.path()).unwrap();

        assert!(!store.switch_active("640x480").unwrap());
        assert_eq!(store.active_name(), DEFAULT_PROFILE);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn switching_persists_the_active_profile() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(store.switch_active(WINDOWED_PROFILE).unwrap());
        assert_eq!(reload(&store).active_name(), WINDOWED_PROFILE);
    }

    #[test]
    fn invalid_active_name_resolves_to_default_and_is_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general]\nactive_profile = \"gone\"\n\n[profiles.other]\n").unwrap();

        let mut store = ProfileStore::load(path).unwrap();
        let profile = store.resolve_active().unwrap();
        assert_eq!(profile.name, DEFAULT_PROFILE);
        assert_eq!(profile.check_pixel, Point { x: 1670, y: 650 });
        assert_eq!(profile.button_pixel, Point { x: 1822, y: 785 });
        assert_eq!(profile.expected_color, rgb(58, 59, 61));

        let persisted = reload(&store);
        assert_eq!(persisted.active_name(), DEFAULT_PROFILE);
        assert!(persisted.profile(DEFAULT_PROFILE).is_some());
        assert!(persisted.profile("other").is_some());
    }

    #[test]
    fn resolve_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general]\nactive_profile = \"gone\"\n").unwrap();

        let mut store = ProfileStore::load(path).unwrap();
        let first = store.resolve_active().unwrap();
        let written = fs::read_to_string(store.path()).unwrap();
        let second = store.resolve_active().unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), written);
    }

    #[test]
    fn unparseable_file_uses_builtin_profiles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let store = ProfileStore::load(path.clone()).unwrap();
        assert_eq!(store.config, Config::builtin());
        assert_eq!(fs::read_to_string(&path).unwrap(), "this is = = not toml");
        assert_eq!(
            fs::read_to_string(dir.path().join("config.toml.bak")).unwrap(),
            "this is = = not toml"
        );
    }

    #[test]
    fn bad_value_only_resets_its_own_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[profiles.mine]\npixel_check_x = 12\n\n[profiles.other]\nexpected_color_r = 300\ntoggle_key = 7\njump_interval = 9\n",
        )
        .unwrap();

        let mut store = ProfileStore::load(path).unwrap();
        let other = store.profile("other").unwrap();
        assert_eq!(other.expected_color, rgb(58, 59, 61));
        assert_eq!(other.toggle_key, "f4");
        assert_eq!(other.jump_interval, Duration::from_secs(9));

        // Saving after a startup mutation must keep every user profile.
        assert!(store.switch_active("mine").unwrap());
        let persisted = reload(&store);
        assert_eq!(persisted.profile("mine").unwrap().check_pixel.x, 12);
        assert!(persisted.profile("other").is_some());
        assert!(persisted.profile(DEFAULT_PROFILE).is_none());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(store.switch_active(WINDOWED_PROFILE).unwrap());
        assert!(!dir.path().join("config.toml.tmp").exists());
    }

    #[test]
    fn failed_save_keeps_the_previous_file() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let before = fs::read_to_string(store.path()).unwrap();

        // A directory in the temp file's place makes the first write fail.
        fs::create_dir(dir.path().join("config.toml.tmp")).unwrap();
        assert!(matches!(
            store.switch_active(WINDOWED_PROFILE),
            Err(ConfigError::Write { .. })
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn unchanged_automation_path_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let exe = Path::new("/opt/ahk/AutoHotkey.exe");
        store.set_automation_path(exe).unwrap();

        fs::remove_file(store.path()).unwrap();
        store.set_automation_path(exe).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn automation_path_is_persisted() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .set_automation_path(Path::new("/opt/ahk/AutoHotkey.exe"))
            .unwrap();
        assert_eq!(reload(&store).automation().path, "/opt/ahk/AutoHotkey.exe");
    }
}
