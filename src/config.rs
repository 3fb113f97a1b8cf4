use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "qwitter", about = "A small social network server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Grant staff rights to an existing user, then exit
    #[arg(long, value_name = "USERNAME")]
    pub promote: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    /// HS256 signing key for API tokens. Random per process unless configured,
    /// which invalidates issued tokens on restart.
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "qwitter_session".to_string(),
            session_hours: 336,
            jwt_secret: random_secret(),
            access_token_minutes: 60,
            refresh_token_days: 7,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            max_page_size: 50,
        }
    }
}

fn random_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("qwitter.db"));
        }
        if config.auth.jwt_secret.is_empty() {
            anyhow::bail!("auth.jwt_secret must not be empty");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".qwitter")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("qwitter.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_in(dir: &std::path::Path) -> Cli {
        Cli {
            data_dir: Some(dir.to_path_buf()),
            ..Cli::default()
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.cookie_name, "qwitter_session");
        assert_eq!(config.auth.session_hours, 336);
        assert_eq!(config.auth.access_token_minutes, 60);
        assert_eq!(config.auth.refresh_token_days, 7);
        assert_eq!(config.pagination.page_size, 10);
        assert_eq!(config.pagination.max_page_size, 50);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn generated_jwt_secrets_differ() {
        let a = AuthConfig::default();
        let b = AuthConfig::default();
        assert_eq!(a.jwt_secret.len(), 64);
        assert_ne!(a.jwt_secret, b.jwt_secret);
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_in(std::path::Path::new("/tmp/test-qwitter"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-qwitter"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_qwitter() {
        let dir = Config::data_dir(&Cli::default());
        assert!(dir.ends_with(".qwitter"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_in(tmp.path())).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.db_path(), tmp.path().join("qwitter.db"));
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            ..cli_in(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[auth]
cookie_name = "my_cookie"
session_hours = 24
jwt_secret = "not-random"

[pagination]
page_size = 20
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_in(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.cookie_name, "my_cookie");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.jwt_secret, "not-random");
        assert_eq!(config.auth.access_token_minutes, 60);
        assert_eq!(config.pagination.page_size, 20);
        assert_eq!(config.pagination.max_page_size, 50);
    }

    #[test]
    fn empty_jwt_secret_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[auth]\njwt_secret = \"\"\n").unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_in(tmp.path())
        };
        assert!(Config::load(&cli).is_err());
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            ..cli_in(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }
}
