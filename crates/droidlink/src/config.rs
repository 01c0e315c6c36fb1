//! Configuration file support for droidlink.
//!
//! An optional `droidlink.toml` persists project settings so the command line
//! only has to name the Android project and the architecture.
//!
//! ## Configuration File Location
//!
//! Unless `--config` is given, the file is searched for in:
//! 1. Current working directory (`./droidlink.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! Relative paths inside the file are resolved against the file's directory.
//!
//! ## Example Configuration
//!
//! ```toml
//! [library]
//! name = "voxel"
//! features = ["android-lib"]
//! crate_dir = "."
//!
//! [android]
//! jni_libs_dir = "app/src/main/jniLibs"
//! ndk_check = "./get_ndk.sh"
//!
//! [build]
//! jobs = 4
//! timeout_secs = 1800
//! install_mode = "link"
//! # target_dir = "target"
//!
//! [tools]
//! rustup = "rustup"
//! cargo = "cargo"
//! ```

use anyhow::{Context, Result};
use droidlink_sdk::InstallMode;
use droidlink_sdk::builders::android::DEFAULT_ANDROID_FEATURE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "droidlink.toml";

/// Root configuration structure for `droidlink.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DroidlinkConfig {
    /// The library being compiled.
    pub library: LibraryConfig,

    /// Android project layout.
    pub android: AndroidConfig,

    /// Build execution settings.
    pub build: BuildConfig,

    /// External tool locations.
    pub tools: ToolsConfig,
}

/// Library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library base name (e.g., "voxel" for `libvoxel.so`).
    ///
    /// If not specified, it's read from the crate's Cargo.toml.
    pub name: Option<String>,

    /// Cargo features enabled for every Android build.
    ///
    /// Defaults to `["android-lib"]`.
    pub features: Vec<String>,

    /// Directory of the crate to build.
    ///
    /// Defaults to the directory holding the config file, or the current
    /// directory when there is no config file.
    pub crate_dir: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: None,
            features: vec![DEFAULT_ANDROID_FEATURE.to_string()],
            crate_dir: None,
        }
    }
}

/// Android project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Native library root inside the Android project.
    ///
    /// Defaults to `app/src/main/jniLibs`.
    pub jni_libs_dir: PathBuf,

    /// Script run once before provisioning to make sure the NDK is present.
    pub ndk_check: Option<PathBuf>,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            jni_libs_dir: PathBuf::from(droidlink_sdk::DEFAULT_JNI_LIBS_DIR),
            ndk_check: None,
        }
    }
}

/// Build execution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Number of targets processed concurrently.
    ///
    /// Defaults to the available parallelism. Can be overridden via `--jobs`.
    pub jobs: Option<usize>,

    /// Timeout in seconds for each rustup/cargo invocation.
    ///
    /// Defaults to 1800. Can be overridden via `--timeout-secs`.
    pub timeout_secs: Option<u64>,

    /// `link` or `copy`. Defaults to `link` on Unix.
    pub install_mode: Option<InstallMode>,

    /// Cargo target directory. Detected with `cargo metadata` when unset.
    pub target_dir: Option<PathBuf>,
}

/// External tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub rustup: PathBuf,
    pub cargo: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            rustup: PathBuf::from("rustup"),
            cargo: PathBuf::from("cargo"),
        }
    }
}

impl DroidlinkConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: DroidlinkConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }
}

/// Merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug)]
pub struct ConfigResolver {
    /// Loaded configuration, or defaults when there is no file.
    pub config: DroidlinkConfig,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,

    /// Directory relative config paths are resolved against.
    pub base_dir: PathBuf,
}

impl ConfigResolver {
    /// Discovers configuration from `cwd` upwards.
    pub fn discover(cwd: &Path) -> Result<Self> {
        match DroidlinkConfig::discover_from(cwd)? {
            Some((config, path)) => Ok(Self::with_file(config, path)),
            None => Ok(Self {
                config: DroidlinkConfig::default(),
                config_path: None,
                base_dir: cwd.to_path_buf(),
            }),
        }
    }

    /// Loads an explicitly named config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path)
            .with_context(|| format!("Failed to resolve config path: {:?}", path))?;
        let config = DroidlinkConfig::load_from_file(&path)?;
        Ok(Self::with_file(config, path))
    }

    fn with_file(config: DroidlinkConfig, path: PathBuf) -> Self {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            config,
            config_path: Some(path),
            base_dir,
        }
    }

    /// Resolves a possibly relative config path against the config directory.
    pub fn path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Resolves a tool location. Bare names (`cargo`) stay as-is for PATH lookup.
    pub fn tool(&self, tool: &Path) -> PathBuf {
        if tool.components().count() > 1 {
            self.path(tool)
        } else {
            tool.to_path_buf()
        }
    }

    /// Crate directory to build in.
    pub fn crate_dir(&self) -> PathBuf {
        match &self.config.library.crate_dir {
            Some(dir) => self.path(dir),
            None => self.base_dir.clone(),
        }
    }

    /// NDK pre-flight script, if configured.
    pub fn ndk_check(&self) -> Option<PathBuf> {
        self.config
            .android
            .ndk_check
            .as_deref()
            .map(|script| self.tool(script))
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Arguments
    ///
    /// * `cli_value` - Value from CLI argument (None if not provided)
    /// * `config_getter` - Function to get value from config
    /// * `default` - Default value if neither CLI nor config provides a value
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&DroidlinkConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| config_getter(&self.config))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DroidlinkConfig::default();
        assert_eq!(config.library.features, vec!["android-lib".to_string()]);
        assert_eq!(
            config.android.jni_libs_dir,
            PathBuf::from("app/src/main/jniLibs")
        );
        assert_eq!(config.tools.cargo, PathBuf::from("cargo"));
        assert!(config.build.jobs.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(
            &config_path,
            r#"
[library]
name = "voxel"
features = ["android-lib", "vulkan"]

[android]
jni_libs_dir = "app/src/main/jniLibs"
ndk_check = "./get_ndk.sh"

[build]
jobs = 2
timeout_secs = 60
install_mode = "copy"
"#,
        )
        .unwrap();

        let config = DroidlinkConfig::load_from_file(&config_path).unwrap();

        assert_eq!(config.library.name, Some("voxel".to_string()));
        assert_eq!(config.library.features, vec!["android-lib", "vulkan"]);
        assert_eq!(config.android.ndk_check, Some(PathBuf::from("./get_ndk.sh")));
        assert_eq!(config.build.jobs, Some(2));
        assert_eq!(config.build.timeout_secs, Some(60));
        assert_eq!(config.build.install_mode, Some(InstallMode::Copy));
        assert_eq!(config.tools.rustup, PathBuf::from("rustup"));
    }

    #[test]
    fn test_invalid_install_mode_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[build]\ninstall_mode = \"hardlink\"\n").unwrap();

        let err = DroidlinkConfig::load_from_file(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn test_discover_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[library]\nname = \"discovered\"\n",
        )
        .unwrap();
        let nested = temp_dir.path().join("src/nested");
        std::fs::create_dir_all(&nested).unwrap();

        let resolver = ConfigResolver::discover(&nested).unwrap();

        assert_eq!(resolver.config.library.name, Some("discovered".to_string()));
        assert_eq!(
            resolver.config_path,
            Some(temp_dir.path().join(CONFIG_FILE_NAME))
        );
        assert_eq!(resolver.crate_dir(), temp_dir.path());
    }

    #[test]
    fn test_discover_no_config() {
        let temp_dir = TempDir::new().unwrap();
        // Create a .git directory to stop the search
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        let resolver = ConfigResolver::discover(temp_dir.path()).unwrap();
        assert!(resolver.config_path.is_none());
        assert_eq!(resolver.crate_dir(), temp_dir.path());
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &config_path,
            "[library]\ncrate_dir = \"native\"\n\n[android]\nndk_check = \"./get_ndk.sh\"\n\n[tools]\ncargo = \"bin/cargo\"\n",
        )
        .unwrap();

        let resolver = ConfigResolver::from_file(&config_path).unwrap();

        assert_eq!(resolver.crate_dir(), temp_dir.path().join("native"));
        assert_eq!(resolver.ndk_check(), Some(temp_dir.path().join("./get_ndk.sh")));
        assert_eq!(
            resolver.tool(&resolver.config.tools.cargo),
            temp_dir.path().join("bin/cargo")
        );
        assert_eq!(resolver.tool(Path::new("rustup")), PathBuf::from("rustup"));
    }

    #[test]
    fn test_config_resolver_precedence() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        let mut resolver = ConfigResolver::discover(temp_dir.path()).unwrap();
        resolver.config.build.jobs = Some(3);

        // CLI value takes precedence
        assert_eq!(resolver.resolve(Some(8), |c| c.build.jobs, 1), 8);
        // Config value used when CLI is None
        assert_eq!(resolver.resolve(None, |c| c.build.jobs, 1), 3);
        // Default when neither is set
        assert_eq!(resolver.resolve(None, |c| c.build.timeout_secs, 1800), 1800);
    }
}
