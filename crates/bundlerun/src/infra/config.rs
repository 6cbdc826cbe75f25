//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::bundle::DEFAULT_DELIMITER;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".bundlerun/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BundleConfig {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    delimiter: Option<String>,
}

impl BundleConfig {
    pub fn file(&self) -> String {
        self.file.clone().unwrap_or_else(|| "bundle.txt".into())
    }

    pub fn delimiter(&self) -> String {
        self.delimiter
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DELIMITER.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildConfig {
    #[serde(default)]
    source_suffix: Option<String>,
    #[serde(default)]
    artifact_suffix: Option<String>,
    #[serde(default)]
    entry: Option<String>,
    #[serde(default)]
    recursive: Option<bool>,
}

impl BuildConfig {
    pub fn source_suffix(&self) -> String {
        self.source_suffix.clone().unwrap_or_else(|| "java".into())
    }

    pub fn artifact_suffix(&self) -> String {
        self.artifact_suffix
            .clone()
            .unwrap_or_else(|| "class".into())
    }

    pub fn entry(&self) -> String {
        self.entry
            .clone()
            .unwrap_or_else(|| "ConversationCLI".into())
    }

    pub fn recursive(&self) -> bool {
        self.recursive.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolchainConfig {
    #[serde(default)]
    compiler: Option<String>,
    #[serde(default)]
    compiler_args: Option<Vec<String>>,
    #[serde(default)]
    launcher: Option<String>,
    #[serde(default)]
    launcher_args: Option<Vec<String>>,
}

impl ToolchainConfig {
    pub fn compiler(&self) -> String {
        self.compiler.clone().unwrap_or_else(|| "javac".into())
    }

    pub fn compiler_args(&self) -> Vec<String> {
        self.compiler_args.clone().unwrap_or_default()
    }

    pub fn launcher(&self) -> String {
        self.launcher.clone().unwrap_or_else(|| "java".into())
    }

    pub fn launcher_args(&self) -> Vec<String> {
        self.launcher_args.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RecorderConfig {
    #[serde(default)]
    store: Option<String>,
    #[serde(default)]
    delay_ms: Option<u64>,
    #[serde(default)]
    keywords: Option<Vec<String>>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    exclusions: Option<Vec<String>>,
}

impl RecorderConfig {
    pub fn store(&self) -> String {
        self.store
            .clone()
            .unwrap_or_else(|| ".bundlerun/requests.json".into())
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms.unwrap_or(100)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.keywords.clone().unwrap_or_else(|| {
            crate::app::recorder::DEFAULT_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect()
        })
    }

    /// URL glob that replaces the keyword filter when set.
    pub fn pattern(&self) -> Option<String> {
        self.pattern.clone().filter(|value| !value.trim().is_empty())
    }

    pub fn exclusions(&self) -> Vec<String> {
        self.exclusions.clone().unwrap_or_default()
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    delimiter: Option<String>,
    entry: Option<String>,
    compiler: Option<String>,
    launcher: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            delimiter: env::var("BUNDLERUN_DELIMITER").ok(),
            entry: env::var("BUNDLERUN_ENTRY").ok(),
            compiler: env::var("BUNDLERUN_COMPILER").ok(),
            launcher: env::var("BUNDLERUN_LAUNCHER").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(entry: &str, compiler: &str) -> Self {
        Self {
            entry: Some(entry.to_owned()),
            compiler: Some(compiler.to_owned()),
            ..Self::default()
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            tracing::debug!(path = %global_path.display(), "loading global config");
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            tracing::debug!(path = %workspace_path.display(), "loading workspace config");
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            bundle: BundleConfig {
                file: other.bundle.file.or(self.bundle.file),
                delimiter: other.bundle.delimiter.or(self.bundle.delimiter),
            },
            build: BuildConfig {
                source_suffix: other.build.source_suffix.or(self.build.source_suffix),
                artifact_suffix: other.build.artifact_suffix.or(self.build.artifact_suffix),
                entry: other.build.entry.or(self.build.entry),
                recursive: other.build.recursive.or(self.build.recursive),
            },
            toolchain: ToolchainConfig {
                compiler: other.toolchain.compiler.or(self.toolchain.compiler),
                compiler_args: other.toolchain.compiler_args.or(self.toolchain.compiler_args),
                launcher: other.toolchain.launcher.or(self.toolchain.launcher),
                launcher_args: other.toolchain.launcher_args.or(self.toolchain.launcher_args),
            },
            recorder: RecorderConfig {
                store: other.recorder.store.or(self.recorder.store),
                delay_ms: other.recorder.delay_ms.or(self.recorder.delay_ms),
                keywords: other.recorder.keywords.or(self.recorder.keywords),
                pattern: other.recorder.pattern.or(self.recorder.pattern),
                exclusions: other.recorder.exclusions.or(self.recorder.exclusions),
            },
        }
    }

    pub fn set_entry(&mut self, entry: impl Into<String>) {
        self.build.entry = Some(entry.into());
    }

    pub fn set_recursive(&mut self, recursive: bool) {
        self.build.recursive = Some(recursive);
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("bundlerun/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() || current.join(DEFAULT_WORKSPACE_CONFIG_PATH).exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(delimiter) = env.delimiter {
        config.bundle.delimiter = Some(delimiter);
    }
    if let Some(entry) = env.entry {
        config.build.entry = Some(entry);
    }
    if let Some(compiler) = env.compiler {
        config.toolchain.compiler = Some(compiler);
    }
    if let Some(launcher) = env.launcher {
        config.toolchain.launcher = Some(launcher);
    }
    config
}
