//! YAML configuration for a dump run.
//!
//! Describes the database connection, where the dump is written, and which
//! tables are kept, ignored, truncated or obfuscated.

mod file_name;
mod ordered;

pub use file_name::{format_go_layout, format_with_database};
pub use ordered::OrderedMap;

use crate::error::DumpError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default Go reference-time layout for dump file names
pub const DEFAULT_FILE_NAME_FORMAT: &str = "%s-2006-01-02T150405";

/// Default number of rows per extended INSERT statement
pub const DEFAULT_ROWS_PER_INSERT: usize = 100;

/// Complete configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub tables: TablesConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, DumpError> {
        if !path.is_file() {
            return Err(DumpError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| DumpError::ConfigMarkup {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, DumpError> {
        serde_yaml_ng::from_str(content).map_err(|e| DumpError::ConfigMarkup {
            message: e.to_string(),
        })
    }

    /// Full path of the dump file for a run started at `now`
    pub fn dump_path(&self, now: DateTime<FixedOffset>) -> PathBuf {
        self.output
            .directory
            .join(self.output.file_name(&self.database.database_name, now))
    }
}

/// Network kind used to reach the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetKind {
    #[default]
    Tcp,
    Unix,
}

impl fmt::Display for NetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetKind::Tcp => write!(f, "tcp"),
            NetKind::Unix => write!(f, "unix"),
        }
    }
}

/// Database connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub net: NetKind,
    pub socket: String,
    pub hostname: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub database_name: String,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    /// Connection string in the Go MySQL driver DSN format.
    ///
    /// `user:password@tcp(host:port)/db` or `unix(/path/to.sock)/db`. The
    /// `user:password@` prefix is written only when both are set.
    pub fn dsn(&self) -> String {
        let mut dsn = String::new();

        if !self.user.is_empty() && !self.password.is_empty() {
            dsn.push_str(&self.user);
            dsn.push(':');
            dsn.push_str(&self.password);
            dsn.push('@');
        }

        match self.net {
            NetKind::Tcp => {
                dsn.push_str("tcp(");
                dsn.push_str(&self.address());
                dsn.push(')');
            }
            NetKind::Unix => {
                dsn.push_str("unix(");
                dsn.push_str(&self.socket);
                dsn.push(')');
            }
        }

        dsn.push('/');
        dsn.push_str(&self.database_name);
        dsn
    }

    /// DSN with the password replaced, for logs
    pub fn redacted_dsn(&self) -> String {
        if self.password.is_empty() {
            return self.dsn();
        }
        let mut redacted = self.clone();
        redacted.password = "****".to_string();
        redacted.dsn()
    }

    /// `host:port`, with IPv6 hosts bracketed
    pub fn address(&self) -> String {
        let port = if self.port == 0 { 3306 } else { self.port };
        if self.hostname.contains(':') {
            format!("[{}]:{}", self.hostname, port)
        } else {
            format!("{}:{}", self.hostname, port)
        }
    }
}

/// Accepts `port: 3306` as well as `port: "3306"`
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) if s.trim().is_empty() => Ok(0),
        Port::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", s))),
    }
}

/// Where and how the dump is written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default = "default_file_name_format")]
    pub file_name_format: String,
    #[serde(default = "default_rows_per_insert")]
    pub rows_per_insert: usize,
}

impl OutputConfig {
    /// Dump file name: the layout rendered at `now`, `%s` replaced by the
    /// database name, with `.sql` appended.
    pub fn file_name(&self, database_name: &str, now: DateTime<FixedOffset>) -> String {
        let stamped = format_go_layout(&self.file_name_format, &now);
        format!("{}.sql", format_with_database(&stamped, database_name))
    }
}

fn default_file_name_format() -> String {
    DEFAULT_FILE_NAME_FORMAT.to_string()
}

fn default_rows_per_insert() -> usize {
    DEFAULT_ROWS_PER_INSERT
}

/// The four table policy sections.
///
/// The obfuscate section keeps declaration order and repeated keys so that
/// duplicates can be reported instead of silently collapsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub keep: Vec<String>,
    pub ignore: Vec<String>,
    pub truncate: Vec<String>,
    pub obfuscate: OrderedMap<Option<OrderedMap<serde_yaml_ng::Value>>>,
}

impl TablesConfig {
    /// Names declared in the obfuscate section, in declaration order
    pub fn obfuscated_table_names(&self) -> Vec<String> {
        self.obfuscate.keys().map(str::to_string).collect()
    }

    /// Total number of declared table entries across all sections
    pub fn declared_count(&self) -> usize {
        self.keep.len() + self.ignore.len() + self.truncate.len() + self.obfuscate.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const SAMPLE: &str = r#"
database:
  net: tcp
  hostname: 127.0.0.1
  port: "3306"
  databaseName: black_mamba
  user: dbuser
  password: dbpass
output:
  directory: ./dumps
tables:
  keep: [orders]
  ignore: [sessions]
  truncate: [audit_log]
  obfuscate:
    users:
      email: { type: email }
      note: { type: fixed, string: redacted }
    profiles:
"#;

    #[test]
    fn test_load_sample_config() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.net, NetKind::Tcp);
        assert_eq!(config.output.file_name_format, DEFAULT_FILE_NAME_FORMAT);
        assert_eq!(config.output.rows_per_insert, DEFAULT_ROWS_PER_INSERT);
        assert_eq!(config.tables.keep, vec!["orders"]);
        assert_eq!(
            config.tables.obfuscated_table_names(),
            vec!["users", "profiles"]
        );
        assert_eq!(config.tables.declared_count(), 5);

        let (_, users) = config.tables.obfuscate.iter().next().unwrap();
        let columns: Vec<&str> = users.as_ref().unwrap().keys().collect();
        assert_eq!(columns, vec!["email", "note"]);
    }

    #[test]
    fn test_invalid_markup_is_reported() {
        let err = Config::from_yaml("database: [unterminated").unwrap_err();
        assert!(matches!(err, DumpError::ConfigMarkup { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, DumpError::ConfigNotFound { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_tcp_dsn() {
        let db = DatabaseConfig {
            net: NetKind::Tcp,
            user: "dbuser".to_string(),
            password: "dbpass".to_string(),
            database_name: "black_mamba".to_string(),
            hostname: "127.0.0.1".to_string(),
            port: 3306,
            ..Default::default()
        };
        assert_eq!(db.dsn(), "dbuser:dbpass@tcp(127.0.0.1:3306)/black_mamba");
        assert_eq!(
            db.redacted_dsn(),
            "dbuser:****@tcp(127.0.0.1:3306)/black_mamba"
        );
    }

    #[test]
    fn test_unix_dsn_without_credentials() {
        let db = DatabaseConfig {
            net: NetKind::Unix,
            socket: "/tmp/mysql.sock".to_string(),
            database_name: "black_mamba".to_string(),
            ..Default::default()
        };
        assert_eq!(db.dsn(), "unix(/tmp/mysql.sock)/black_mamba");
    }

    #[test]
    fn test_unix_dsn_with_credentials() {
        let db = DatabaseConfig {
            net: NetKind::Unix,
            socket: "/tmp/mysql.sock".to_string(),
            database_name: "black_mamba".to_string(),
            user: "root".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        };
        assert_eq!(db.dsn(), "root:secret@unix(/tmp/mysql.sock)/black_mamba");
    }

    #[test]
    fn test_partial_credentials_have_no_prefix() {
        let user_only = DatabaseConfig {
            hostname: "db.local".to_string(),
            database_name: "shop".to_string(),
            user: "reader".to_string(),
            ..Default::default()
        };
        assert_eq!(user_only.dsn(), "tcp(db.local:3306)/shop");

        let password_only = DatabaseConfig {
            password: "secret".to_string(),
            user: String::new(),
            ..user_only.clone()
        };
        assert_eq!(password_only.dsn(), "tcp(db.local:3306)/shop");
        assert_eq!(password_only.redacted_dsn(), "tcp(db.local:3306)/shop");

        let unix_user_only = DatabaseConfig {
            net: NetKind::Unix,
            socket: "/tmp/mysql.sock".to_string(),
            ..user_only
        };
        assert_eq!(unix_user_only.dsn(), "unix(/tmp/mysql.sock)/shop");
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let db = DatabaseConfig {
            hostname: "::1".to_string(),
            port: 3307,
            ..Default::default()
        };
        assert_eq!(db.address(), "[::1]:3307");
    }

    #[test]
    fn test_dump_file_name() {
        let output = OutputConfig {
            directory: PathBuf::from("dumps"),
            file_name_format: "%s-2006-01-02T150405".to_string(),
            rows_per_insert: DEFAULT_ROWS_PER_INSERT,
        };
        let now = Utc
            .with_ymd_and_hms(2022, 6, 1, 1, 2, 3)
            .unwrap()
            .fixed_offset();
        assert_eq!(
            output.file_name("black_mamba", now),
            "black_mamba-2022-06-01T010203.sql"
        );
    }

    #[test]
    fn test_dump_path_joins_directory() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let now = Utc
            .with_ymd_and_hms(2022, 6, 1, 1, 2, 3)
            .unwrap()
            .fixed_offset();
        assert_eq!(
            config.dump_path(now),
            PathBuf::from("./dumps").join("black_mamba-2022-06-01T010203.sql")
        );
    }
}
