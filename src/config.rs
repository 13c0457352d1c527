//! Configuration system for asg.
//!
//! Supports layered configuration from multiple sources:
//! 1. Environment variables (highest priority)
//! 2. Project config (.asg.toml in repo root)
//! 3. User config (~/.config/asg/config.toml)
//! 4. System config (/etc/asg/config.toml)
//! 5. Compiled defaults (lowest priority)
//!
//! `ASG_CONFIG` names a single file that replaces layers 2-4.
//!
//! The project file lives in the repository the agent is editing, so it may
//! only tighten: its `deny` entries, block overrides, shell tools and lower
//! limits apply, everything else in it is ignored with a warning.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LoggingConfig;
use crate::policy::{DEFAULT_MAX_COMMAND_BYTES, DEFAULT_MAX_SHELL_DEPTH};

/// Environment variable prefix for all config options.
const ENV_PREFIX: &str = "ASG";

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level config file name.
const PROJECT_CONFIG_NAME: &str = ".asg.toml";

/// Directory name under the system and user config roots.
const CONFIG_DIR_NAME: &str = "asg";

/// Default cap on the hook record read from stdin.
pub const DEFAULT_MAX_HOOK_INPUT_BYTES: usize = 256 * 1024;

/// Errors from loading a configuration file explicitly.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,

    /// Allowlist and process tables.
    pub policy: PolicyConfig,

    /// Custom overrides.
    pub overrides: OverridesConfig,

    /// Decision log.
    pub logging: LoggingConfig,
}

/// General configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Color output mode: "auto", "always", "never".
    pub color: String,

    /// Whether to show verbose output.
    pub verbose: bool,

    /// Largest hook record accepted on stdin.
    pub max_hook_input_bytes: Option<usize>,

    /// Largest command string the evaluator will look at.
    pub max_command_bytes: Option<usize>,

    /// Hook tool names that carry shell commands.
    pub shell_tools: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            color: "auto".to_string(),
            verbose: false,
            max_hook_input_bytes: None,
            max_command_bytes: None,
            shell_tools: vec!["Bash".to_string()],
        }
    }
}

impl GeneralConfig {
    #[must_use]
    pub fn max_hook_input_bytes(&self) -> usize {
        self.max_hook_input_bytes
            .unwrap_or(DEFAULT_MAX_HOOK_INPUT_BYTES)
    }

    #[must_use]
    pub fn max_command_bytes(&self) -> usize {
        self.max_command_bytes.unwrap_or(DEFAULT_MAX_COMMAND_BYTES)
    }

    /// Whether records for `tool_name` are gated.
    #[must_use]
    pub fn is_shell_tool(&self, tool_name: &str) -> bool {
        self.shell_tools.iter().any(|t| t == tool_name)
    }
}

/// Policy table extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Executables added to the allowlist.
    pub allow: Vec<String>,

    /// Executables removed from the allowlist (applied after `allow`).
    pub deny: Vec<String>,

    /// Process identifiers process managers may target.
    pub dev_processes: Vec<String>,

    /// Executables judged by the process-target rule (e.g. `killall`).
    pub process_managers: Vec<String>,

    /// Nesting limit for inline `sh -c` scripts.
    pub max_shell_depth: Option<usize>,
}

/// Custom pattern overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverridesConfig {
    /// Additional patterns to block.
    #[serde(default)]
    pub block: Vec<BlockOverride>,
}

/// A block override - regex over the raw command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOverride {
    /// The regex pattern to match.
    pub pattern: String,
    /// Human-readable reason for blocking.
    pub reason: String,
}

impl Config {
    /// Load configuration from all sources, merging them in priority order.
    ///
    /// Unreadable or malformed files are skipped with a warning.
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(explicit) = env::var_os(format!("{ENV_PREFIX}_CONFIG")) {
            let path = PathBuf::from(explicit);
            match Self::load_from_file(&path) {
                Ok(file_config) => config.merge(file_config),
                Err(e) => tracing::warn!(error = %e, "ignoring {ENV_PREFIX}_CONFIG"),
            }
        } else {
            for path in Self::trusted_layer_paths() {
                if let Some(layer) = Self::load_layer(&path) {
                    config.merge(layer);
                }
            }
            if let Some(path) = Self::project_layer_path() {
                if let Some(layer) = Self::load_layer(&path) {
                    let layer = layer.restrictions_only(&config);
                    config.merge(layer);
                }
            }
        }

        config.apply_env_overrides();

        config
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// System and user layers in merge order.
    #[must_use]
    pub fn trusted_layer_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("/etc")
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// The project layer for the current directory, if any.
    #[must_use]
    pub fn project_layer_path() -> Option<PathBuf> {
        env::current_dir()
            .ok()
            .and_then(|cwd| find_project_config(&cwd))
    }

    /// A missing layer is normal; a broken one is worth a warning.
    fn load_layer(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(error = %e, "skipping config layer");
                None
            }
        }
    }

    /// Keep only the settings of a project layer that can narrow `base`.
    fn restrictions_only(self, base: &Self) -> Self {
        let mut ignored = Vec::new();
        if !self.policy.allow.is_empty() {
            ignored.push("policy.allow");
        }
        if !self.policy.dev_processes.is_empty() {
            ignored.push("policy.dev_processes");
        }
        if !self.policy.process_managers.is_empty() {
            ignored.push("policy.process_managers");
        }
        if self.logging.enabled {
            ignored.push("logging");
        }

        let max_hook_input_bytes = lower_limit(
            self.general.max_hook_input_bytes,
            base.general.max_hook_input_bytes(),
            "general.max_hook_input_bytes",
            &mut ignored,
        );
        let max_command_bytes = lower_limit(
            self.general.max_command_bytes,
            base.general.max_command_bytes(),
            "general.max_command_bytes",
            &mut ignored,
        );
        let max_shell_depth = lower_limit(
            self.policy.max_shell_depth,
            base.max_shell_depth(),
            "policy.max_shell_depth",
            &mut ignored,
        );

        if !ignored.is_empty() {
            tracing::warn!(
                ignored = %ignored.join(", "),
                "project config may only tighten policy; ignoring settings"
            );
        }

        Self {
            general: GeneralConfig {
                max_hook_input_bytes,
                max_command_bytes,
                ..self.general
            },
            policy: PolicyConfig {
                deny: self.policy.deny,
                max_shell_depth,
                ..PolicyConfig::default()
            },
            overrides: self.overrides,
            logging: LoggingConfig::default(),
        }
    }

    /// Merge another config into this one (other takes priority).
    fn merge(&mut self, other: Self) {
        // Merge general settings
        if other.general.color != "auto" {
            self.general.color = other.general.color;
        }
        if other.general.verbose {
            self.general.verbose = true;
        }
        if other.general.max_hook_input_bytes.is_some() {
            self.general.max_hook_input_bytes = other.general.max_hook_input_bytes;
        }
        if other.general.max_command_bytes.is_some() {
            self.general.max_command_bytes = other.general.max_command_bytes;
        }
        for tool in other.general.shell_tools {
            if !self.general.shell_tools.contains(&tool) {
                self.general.shell_tools.push(tool);
            }
        }

        // Merge policy tables (append)
        self.policy.allow.extend(other.policy.allow);
        self.policy.deny.extend(other.policy.deny);
        self.policy.dev_processes.extend(other.policy.dev_processes);
        self.policy
            .process_managers
            .extend(other.policy.process_managers);
        if other.policy.max_shell_depth.is_some() {
            self.policy.max_shell_depth = other.policy.max_shell_depth;
        }

        // Merge overrides (append)
        self.overrides.block.extend(other.overrides.block);

        // Logging: a layer that turns logging on brings its whole section.
        if other.logging.enabled {
            self.logging = other.logging;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // ASG_ALLOW="python,cargo"
        if let Ok(allow) = env::var(format!("{ENV_PREFIX}_ALLOW")) {
            self.policy.allow.extend(split_list(&allow));
        }

        // ASG_DEV_PROCESSES="webpack,astro"
        if let Ok(dev) = env::var(format!("{ENV_PREFIX}_DEV_PROCESSES")) {
            self.policy.dev_processes.extend(split_list(&dev));
        }

        // ASG_VERBOSE=1
        if env::var(format!("{ENV_PREFIX}_VERBOSE")).is_ok() {
            self.general.verbose = true;
        }

        // ASG_COLOR=never
        if let Ok(color) = env::var(format!("{ENV_PREFIX}_COLOR")) {
            self.general.color = color;
        }
    }

    /// Effective nesting limit for inline shell scripts.
    #[must_use]
    pub fn max_shell_depth(&self) -> usize {
        self.policy.max_shell_depth.unwrap_or(DEFAULT_MAX_SHELL_DEPTH)
    }

    /// Render the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate a sample configuration string with comments.
    #[must_use]
    pub fn generate_sample_config() -> String {
        r#"# asg configuration

[general]
# Color output: "auto" | "always" | "never"
color = "auto"

# Verbose diagnostics on stderr
verbose = false

# Hook records larger than this are blocked unread
max_hook_input_bytes = 262144

# Commands larger than this are blocked without evaluation
max_command_bytes = 65536

# Hook tool names whose input carries a shell command
shell_tools = ["Bash"]

#─────────────────────────────────────────────────────────────
# POLICY TABLES
#─────────────────────────────────────────────────────────────

[policy]
# allow, dev_processes, process_managers and higher limits are ignored in a
# project .asg.toml; only tightening settings apply there.

# Executables added to the built-in allowlist
allow = [
    # "python",
    # "cargo",
]

# Executables removed from the built-in allowlist
deny = [
    # "curl",
]

# Extra processes that pkill may target (node npm npx vite next are built in)
dev_processes = [
    # "webpack",
]

# Extra executables judged like pkill
process_managers = [
    # "killall",
]

# How deep `bash -c "..."` scripts may nest
max_shell_depth = 3

#─────────────────────────────────────────────────────────────
# CUSTOM OVERRIDES
#─────────────────────────────────────────────────────────────

# Block raw commands matching a regex, before any other rule runs.
# [[overrides.block]]
# pattern = "curl .*\\| *(ba)?sh"
# reason = "piping downloads into a shell"

#─────────────────────────────────────────────────────────────
# DECISION LOG
#─────────────────────────────────────────────────────────────

[logging]
enabled = false
# file = "~/.local/share/asg/decisions.log"
format = "text"

[logging.events]
block = true
allow = false

[logging.redaction]
enabled = false
# "none" | "arguments" | "full"
mode = "arguments"
max_argument_len = 50
"#
        .to_string()
    }
}

/// Walk up from `start` looking for `.asg.toml`, stopping at the repo root.
#[must_use]
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(PROJECT_CONFIG_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }

        if current.join(".git").exists() {
            return None;
        }

        if !current.pop() {
            return None;
        }
    }
}

/// A limit from an untrusted layer counts only when it is below `current`.
fn lower_limit(
    requested: Option<usize>,
    current: usize,
    key: &'static str,
    ignored: &mut Vec<&'static str>,
) -> Option<usize> {
    match requested {
        Some(value) if value < current => Some(value),
        Some(_) => {
            ignored.push(key);
            None
        }
        None => None,
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, RedactionMode};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.color, "auto");
        assert!(!config.general.verbose);
        assert_eq!(config.general.shell_tools, vec!["Bash".to_string()]);
        assert_eq!(
            config.general.max_hook_input_bytes(),
            DEFAULT_MAX_HOOK_INPUT_BYTES
        );
        assert_eq!(config.general.max_command_bytes(), DEFAULT_MAX_COMMAND_BYTES);
        assert_eq!(config.max_shell_depth(), DEFAULT_MAX_SHELL_DEPTH);
        assert!(config.overrides.block.is_empty());
    }

    #[test]
    fn test_sample_config_parses() {
        let config = Config::parse(&Config::generate_sample_config()).unwrap();
        assert_eq!(config.general.max_hook_input_bytes(), 262_144);
        assert_eq!(config.general.max_command_bytes(), 65_536);
        assert_eq!(config.max_shell_depth(), 3);
        assert!(!config.logging.enabled);
        assert_eq!(config.logging.redaction.mode, RedactionMode::Arguments);
    }

    #[test]
    fn test_parse_full_document() {
        let config = Config::parse(
            r#"
            [general]
            color = "never"
            shell_tools = ["Bash", "Shell"]

            [policy]
            allow = ["python"]
            process_managers = ["killall"]

            [[overrides.block]]
            pattern = "curl .*\\| *sh"
            reason = "pipe to shell"

            [logging]
            enabled = true
            file = "/tmp/asg.log"
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.general.color, "never");
        assert!(config.general.is_shell_tool("Shell"));
        assert!(!config.general.is_shell_tool("Edit"));
        assert_eq!(config.policy.allow, vec!["python".to_string()]);
        assert_eq!(config.overrides.block.len(), 1);
        assert_eq!(config.overrides.block[0].reason, "pipe to shell");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.policy.allow.push("python".to_string());
        let other = Config {
            general: GeneralConfig {
                color: "always".to_string(),
                max_command_bytes: Some(1024),
                ..Default::default()
            },
            policy: PolicyConfig {
                allow: vec!["cargo".to_string()],
                max_shell_depth: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        base.merge(other);
        assert_eq!(base.general.color, "always");
        assert_eq!(base.general.max_command_bytes(), 1024);
        assert_eq!(base.general.shell_tools, vec!["Bash".to_string()]);
        assert_eq!(
            base.policy.allow,
            vec!["python".to_string(), "cargo".to_string()]
        );
        assert_eq!(base.max_shell_depth(), 1);
    }

    #[test]
    fn test_merge_keeps_scalars_when_layer_is_default() {
        let mut base = Config::default();
        base.general.color = "never".to_string();
        base.general.max_hook_input_bytes = Some(10);
        base.merge(Config::default());
        assert_eq!(base.general.color, "never");
        assert_eq!(base.general.max_hook_input_bytes(), 10);
    }

    #[test]
    fn test_project_layer_only_tightens() {
        let mut base = Config::default();
        base.policy.allow.push("cargo".to_string());
        let project = Config::parse(
            r#"
            [general]
            max_hook_input_bytes = 64
            max_command_bytes = 10000000

            [policy]
            allow = ["python"]
            deny = ["curl"]
            dev_processes = ["sshd"]
            process_managers = ["killall"]
            max_shell_depth = 9

            [[overrides.block]]
            pattern = "git push"
            reason = "no pushing"

            [logging]
            enabled = true
            file = "/tmp/elsewhere.log"
            "#,
        )
        .unwrap();

        base.merge(project.restrictions_only(&Config::default()));

        assert_eq!(base.policy.allow, vec!["cargo".to_string()]);
        assert_eq!(base.policy.deny, vec!["curl".to_string()]);
        assert!(base.policy.dev_processes.is_empty());
        assert!(base.policy.process_managers.is_empty());
        assert_eq!(base.general.max_hook_input_bytes(), 64);
        assert_eq!(base.general.max_command_bytes(), DEFAULT_MAX_COMMAND_BYTES);
        assert_eq!(base.max_shell_depth(), DEFAULT_MAX_SHELL_DEPTH);
        assert_eq!(base.overrides.block.len(), 1);
        assert!(!base.logging.enabled);
    }

    #[test]
    fn test_project_layer_limits_compare_against_trusted_layers() {
        let mut trusted = Config::default();
        trusted.policy.max_shell_depth = Some(1);
        let project = Config {
            policy: PolicyConfig {
                max_shell_depth: Some(2),
                ..Default::default()
            },
            ..Default::default()
        };
        let layer = project.restrictions_only(&trusted);
        assert_eq!(layer.policy.max_shell_depth, None);
        trusted.merge(layer);
        assert_eq!(trusted.max_shell_depth(), 1);
    }

    #[test]
    fn test_load_from_file_reports_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load_from_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[policy\nallow = 1").unwrap();
        assert!(matches!(
            Config::load_from_file(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let good = dir.path().join("good.toml");
        fs::write(&good, "[policy]\ndeny = [\"curl\"]\n").unwrap();
        let config = Config::load_from_file(&good).unwrap();
        assert_eq!(config.policy.deny, vec!["curl".to_string()]);
    }

    #[test]
    fn test_find_project_config_stops_at_repo_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let nested = repo.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert_eq!(find_project_config(&nested), None);

        // Above the repo root is out of reach.
        fs::write(dir.path().join(PROJECT_CONFIG_NAME), "").unwrap();
        assert_eq!(find_project_config(&nested), None);

        let project = repo.join(PROJECT_CONFIG_NAME);
        fs::write(&project, "").unwrap();
        assert_eq!(find_project_config(&nested), Some(project));
    }

    #[test]
    fn test_split_list() {
        let items: Vec<String> = split_list(" python, cargo ,,").collect();
        assert_eq!(items, vec!["python".to_string(), "cargo".to_string()]);
    }

    #[test]
    fn test_to_toml_round_trips_policy() {
        let mut config = Config::default();
        config.policy.process_managers.push("killall".to_string());
        let rendered = config.to_toml().unwrap();
        let parsed = Config::parse(&rendered).unwrap();
        assert_eq!(parsed.policy, config.policy);
    }
}
