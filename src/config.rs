use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line arguments for the Huddle real-time collaboration server.
///
/// Settings are optional here so that a flag the operator did not pass
/// cannot shadow a value from the config file or the environment.
#[derive(Parser, Debug)]
#[command(name = "huddle-server", version, about = "Huddle real-time collaboration server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./huddle.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub json_logs: Option<bool>,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long)]
    pub data_dir: Option<String>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub data_dir: String,
    /// CLI-only flag, never read from file or environment
    #[serde(skip)]
    pub generate_config: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            data_dir: "./data".to_string(),
            generate_config: false,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (HUDDLE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_layers(Cli::parse())
    }

    /// Resolve the file and environment layers, then apply the flags the
    /// operator actually passed on top.
    pub fn from_layers(cli: Cli) -> Result<Self, figment::Error> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("HUDDLE_"))
            .extract()?;

        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(bind_address) = cli.bind_address {
            config.bind_address = bind_address;
        }
        if let Some(json_logs) = cli.json_logs {
            config.json_logs = json_logs;
        }
        if let Some(data_dir) = cli.data_dir {
            config.data_dir = data_dir;
        }
        config.generate_config = cli.generate_config;

        Ok(config)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Huddle Real-Time Server Configuration
# Place this file at ./huddle.toml or specify with --config <path>
# All settings can be overridden via environment variables (HUDDLE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli(config_path: &str) -> Cli {
        Cli {
            port: None,
            bind_address: None,
            config: config_path.to_string(),
            json_logs: None,
            generate_config: false,
            data_dir: None,
        }
    }

    #[test]
    fn file_values_survive_when_flags_are_not_passed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.toml");
        std::fs::write(&path, "port = 9099\njson_logs = true\n").unwrap();

        let config = Config::from_layers(bare_cli(path.to_str().unwrap())).unwrap();
        assert_eq!(config.port, 9099);
        assert!(config.json_logs);
        // Untouched settings fall back to the built-in defaults
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.data_dir, "./data");
    }

    #[test]
    fn explicit_flags_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.toml");
        std::fs::write(&path, "port = 9099\nbind_address = \"127.0.0.1\"\n").unwrap();

        let mut cli = bare_cli(path.to_str().unwrap());
        cli.port = Some(9100);
        cli.json_logs = Some(true);

        let config = Config::from_layers(cli).unwrap();
        assert_eq!(config.port, 9100);
        assert!(config.json_logs);
        // The file still wins where no flag was passed
        assert_eq!(config.bind_address, "127.0.0.1");
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = Config::from_layers(bare_cli("./does-not-exist.toml")).unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.json_logs);
    }
}
