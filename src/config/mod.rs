use clap::Args;
use sqlx::postgres::PgConnectOptions;
use std::fmt;

pub const DEFAULT_DB_HOST: &str = "postgres";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "appdb_dev";
pub const DEFAULT_DB_USER: &str = "appuser_dev";
// Development placeholder, deployments must set DB_PASSWORD.
pub const DEFAULT_DB_PASSWORD: &str = "S3cureDev!P@ssw0rd_2025";

/// Postgres connection settings, resolved once at startup from flags or `DB_*` variables.
#[derive(Args, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Database host
    #[arg(long = "db-host", env = "DB_HOST", default_value = DEFAULT_DB_HOST)]
    pub host: String,

    /// Database port
    #[arg(long = "db-port", env = "DB_PORT", default_value_t = DEFAULT_DB_PORT)]
    pub port: u16,

    /// Database name
    #[arg(long = "db-name", env = "DB_NAME", default_value = DEFAULT_DB_NAME)]
    pub name: String,

    /// Database user
    #[arg(long = "db-user", env = "DB_USER", default_value = DEFAULT_DB_USER)]
    pub user: String,

    /// Read from `DB_PASSWORD` only, never from the command line.
    #[arg(skip = password_from_env())]
    pub password: String,
}

fn password_from_env() -> String {
    std::env::var("DB_PASSWORD").unwrap_or_else(|_| DEFAULT_DB_PASSWORD.to_string())
}

impl DbConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            name: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: DEFAULT_DB_PASSWORD.to_string(),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "postgres://{}@{}:{}/{}", self.user, self.host, self.port, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        db: DbConfig,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "hello-backend",
            "--db-host",
            "db.internal",
            "--db-port",
            "6543",
            "--db-name",
            "appdb",
            "--db-user",
            "app",
        ])
        .unwrap();

        assert_eq!(cli.db.host, "db.internal");
        assert_eq!(cli.db.port, 6543);
        assert_eq!(cli.db.name, "appdb");
        assert_eq!(cli.db.user, "app");
    }

    #[test]
    fn test_password_flag_is_not_accepted() {
        let result = Cli::try_parse_from(["hello-backend", "--db-password", "secret"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = Cli::try_parse_from(["hello-backend", "--db-port", "not-a-port"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_and_display_hide_password() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            ..DbConfig::default()
        };

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));

        let display = config.to_string();
        assert_eq!(display, "postgres://appuser_dev@postgres:5432/appdb_dev");
    }

    #[test]
    fn test_connect_options_follow_config() {
        let config = DbConfig {
            host: "10.0.0.5".to_string(),
            port: 15432,
            ..DbConfig::default()
        };
        let options = config.connect_options();

        assert_eq!(options.get_host(), "10.0.0.5");
        assert_eq!(options.get_port(), 15432);
        assert_eq!(options.get_database(), Some("appdb_dev"));
        assert_eq!(options.get_username(), "appuser_dev");
    }
}
