use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use crate::space::SpaceMappingTable;
use crate::transform::EmptyApplicationsPolicy;

pub const DEFAULT_ROLE_NAME: &str = "my_role";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one cluster.
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub host: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClusterConfig {
    fn validate(&self, which: &str) -> Result<()> {
        if self.host.trim().is_empty() { bail!("{} host is not configured", which); }
        if self.api_key.trim().is_empty() { bail!("{} API key is not configured", which); }
        Ok(())
    }
}

/// One source of settings. Unset values fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source_host: Option<String>,
    pub source_api_key: Option<String>,
    pub dest_host: Option<String>,
    pub dest_api_key: Option<String>,
    pub role_name: Option<String>,
    /// Inline JSON object
    pub space_map: Option<String>,
    pub space_map_file: Option<PathBuf>,
    pub empty_applications: Option<String>,
    pub timeout_secs: Option<u64>,
    pub dry_run: Option<bool>,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i).cloned().ok_or_else(|| anyhow!("missing value for {}", flag))
}

impl ConfigLayer {
    pub fn from_env() -> Result<Self> { Self::from_env_with(|k| std::env::var(k).ok()) }

    /// Read the layer through an arbitrary lookup; empty values count as unset.
    /// A value that is set but cannot be parsed is an error.
    pub fn from_env_with<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self> {
        let var = |k: &str| get(k).filter(|v| !v.is_empty());
        let timeout_secs = match var("ROLESYNC_TIMEOUT_SECS") {
            Some(v) => Some(v.trim().parse::<u64>().with_context(|| format!("invalid ROLESYNC_TIMEOUT_SECS '{}'", v))?),
            None => None,
        };
        let dry_run = match var("ROLESYNC_DRY_RUN") {
            Some(v) => Some(parse_bool(&v).ok_or_else(|| anyhow!("invalid ROLESYNC_DRY_RUN '{}' (expected true|false)", v))?),
            None => None,
        };
        Ok(Self {
            source_host: var("SOURCE_ES_HOST"),
            source_api_key: var("SOURCE_ES_API_KEY"),
            dest_host: var("DEST_ES_HOST"),
            dest_api_key: var("DEST_ES_API_KEY"),
            role_name: var("ROLE_NAME"),
            space_map: var("ROLESYNC_SPACE_MAP"),
            space_map_file: var("ROLESYNC_SPACE_MAP_FILE").map(PathBuf::from),
            empty_applications: var("ROLESYNC_EMPTY_APPLICATIONS"),
            timeout_secs,
            dry_run,
        })
    }

    /// Parse command-line flags (program name excluded).
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut layer = ConfigLayer::default();
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--role" | "-r" => layer.role_name = Some(take_value(args, &mut i, flag)?),
                "--space-map" => layer.space_map = Some(take_value(args, &mut i, flag)?),
                "--space-map-file" => layer.space_map_file = Some(PathBuf::from(take_value(args, &mut i, flag)?)),
                "--empty-applications" => layer.empty_applications = Some(take_value(args, &mut i, flag)?),
                "--timeout-secs" => {
                    let v = take_value(args, &mut i, flag)?;
                    layer.timeout_secs = Some(v.parse::<u64>().with_context(|| format!("invalid --timeout-secs '{}'", v))?);
                }
                "--dry-run" => layer.dry_run = Some(true),
                other => bail!("unknown argument '{}'", other),
            }
            i += 1;
        }
        Ok(layer)
    }
}

/// Fully resolved settings, built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub source: ClusterConfig,
    pub destination: ClusterConfig,
    pub role_name: String,
    pub space_map: SpaceMappingTable,
    pub empty_applications: EmptyApplicationsPolicy,
    pub dry_run: bool,
}

impl AppConfig {
    pub fn load(args: &[String]) -> Result<Self> {
        let env = ConfigLayer::from_env()?;
        let cli = ConfigLayer::from_args(args)?;
        Self::from_layers(&env, &cli)
    }

    /// Command-line values take precedence over the environment, which takes precedence over defaults.
    pub fn from_layers(env: &ConfigLayer, cli: &ConfigLayer) -> Result<Self> {
        fn pick<T: Clone>(cli: &Option<T>, env: &Option<T>) -> Option<T> { cli.clone().or_else(|| env.clone()) }

        let timeout_secs = pick(&cli.timeout_secs, &env.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 { bail!("timeout must be at least one second"); }

        let source = ClusterConfig {
            host: pick(&cli.source_host, &env.source_host).unwrap_or_default(),
            api_key: pick(&cli.source_api_key, &env.source_api_key).unwrap_or_default(),
            timeout_secs,
        };
        let destination = ClusterConfig {
            host: pick(&cli.dest_host, &env.dest_host).unwrap_or_default(),
            api_key: pick(&cli.dest_api_key, &env.dest_api_key).unwrap_or_default(),
            timeout_secs,
        };
        source.validate("source")?;
        destination.validate("destination")?;

        let role_name = pick(&cli.role_name, &env.role_name).unwrap_or_else(|| DEFAULT_ROLE_NAME.to_string());
        if role_name.trim().is_empty() { bail!("role name must not be empty"); }

        // Command line before environment; within a layer a map file wins over an inline map.
        let space_map = match resolve_space_map(cli).or_else(|| resolve_space_map(env)) {
            Some(SpaceMapSource::File(path)) => load_space_map_file(path)?,
            Some(SpaceMapSource::Inline(text)) => SpaceMappingTable::from_json_str(text).context("invalid inline space map")?,
            None => SpaceMappingTable::default(),
        };

        let empty_applications = match pick(&cli.empty_applications, &env.empty_applications) {
            Some(s) => s.parse()?,
            None => EmptyApplicationsPolicy::default(),
        };

        Ok(Self {
            source,
            destination,
            role_name,
            space_map,
            empty_applications,
            dry_run: pick(&cli.dry_run, &env.dry_run).unwrap_or(false),
        })
    }
}

enum SpaceMapSource<'a> {
    File(&'a Path),
    Inline(&'a str),
}

fn resolve_space_map(layer: &ConfigLayer) -> Option<SpaceMapSource<'_>> {
    if let Some(path) = &layer.space_map_file {
        return Some(SpaceMapSource::File(path.as_path()));
    }
    layer.space_map.as_deref().map(SpaceMapSource::Inline)
}

pub fn load_space_map_file(path: &Path) -> Result<SpaceMappingTable> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading space map {}", path.display()))?;
    SpaceMappingTable::from_json_str(&text).with_context(|| format!("parsing space map {}", path.display()))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
