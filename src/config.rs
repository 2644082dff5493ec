//! Store configuration
//!
//! An explicit configuration record built once at startup and passed
//! down to every component; nothing mutates process-global state. The
//! environment surface mirrors the classic QuitStore variables.

use oxiri::Iri;
use std::path::PathBuf;

/// How graph files are bound to graph IRIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    /// One `<file>.graph` sidecar per data file
    Sidecar,
    /// A single Turtle document describing all bindings
    ConfigFile,
}

/// Optional store features
#[derive(Debug, Clone, Copy, Default)]
pub struct Features {
    pub provenance: bool,
    pub garbage_collection: bool,
}

/// Full store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory of the git repository backing the store
    pub target_dir: PathBuf,
    /// Base namespace for relative IRIs and provenance identifiers
    pub namespace: String,
    /// Config document file name (config mode)
    pub config_file: String,
    /// Graph binding discovery mode
    pub mode: ConfigMode,
    /// SPARQL default graph is the union of all named graphs
    pub union_default_graph: bool,
    /// Enabled features
    pub features: Features,
    /// HTTP port
    pub port: u16,
    /// Application root path prefix
    pub basepath: Option<String>,
    /// Log file path
    pub logfile: Option<PathBuf>,
}

pub const DEFAULT_NAMESPACE: &str = "http://quit.instance/";
pub const DEFAULT_CONFIG_FILE: &str = "config.ttl";
pub const DEFAULT_PORT: u16 = 5000;

impl StoreConfig {
    /// Configuration for a store at a directory, everything else at
    /// defaults
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            mode: ConfigMode::Sidecar,
            union_default_graph: false,
            features: Features::default(),
            port: DEFAULT_PORT,
            basepath: None,
            logfile: None,
        }
    }

    /// Build the configuration from `QUIT_*` environment variables
    pub fn from_env() -> Result<Self, String> {
        let target_dir = std::env::var("QUIT_TARGETDIR")
            .map_err(|_| "QUIT_TARGETDIR is required".to_string())?;
        let mut config = Self::new(target_dir);

        if let Ok(namespace) = std::env::var("QUIT_NAMESPACE") {
            Iri::parse(namespace.clone())
                .map_err(|e| format!("QUIT_NAMESPACE is not a valid IRI: {}", e))?;
            config.namespace = namespace;
        }
        if let Ok(file) = std::env::var("QUIT_CONFIGFILE") {
            config.config_file = file;
        }
        if let Ok(mode) = std::env::var("QUIT_CONFIGMODE") {
            config.mode = match mode.as_str() {
                "graphfiles" => ConfigMode::Sidecar,
                "localconfig" | "repoconfig" => ConfigMode::ConfigFile,
                other => return Err(format!("unknown config mode: {}", other)),
            };
        }
        if let Ok(value) = std::env::var("QUIT_DEFAULTGRAPH_UNION") {
            config.union_default_graph = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Ok(features) = std::env::var("QUIT_FEATURES") {
            for feature in features.split(',').map(str::trim) {
                match feature {
                    "provenance" => config.features.provenance = true,
                    "garbagecollection" => config.features.garbage_collection = true,
                    "" => {}
                    other => return Err(format!("unknown feature: {}", other)),
                }
            }
        }
        if let Ok(port) = std::env::var("QUIT_PORT") {
            config.port = port
                .parse()
                .map_err(|_| format!("invalid port: {}", port))?;
        }
        if let Ok(basepath) = std::env::var("QUIT_BASEPATH") {
            config.basepath = Some(basepath);
        }
        if let Ok(logfile) = std::env::var("QUIT_LOGFILE") {
            config.logfile = Some(PathBuf::from(logfile));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::new("/tmp/store");
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.mode, ConfigMode::Sidecar);
        assert!(!config.union_default_graph);
        assert!(!config.features.provenance);
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
