use clap::Parser;
use std::path::PathBuf;

/// Default cap on a single uploaded spreadsheet (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration
///
/// Every option can be given as a command line flag or through the
/// environment (a `.env` file in the working directory is loaded first).
#[derive(Debug, Clone, Parser)]
#[command(name = "datasight")]
#[command(about = "Spreadsheet analysis and executive report API", long_about = None)]
pub struct Config {
    /// Address to bind the HTTP listener to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://datasight.db?mode=rwc")]
    pub database_url: String,

    /// Directory uploaded spreadsheets are written to and served from
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Lifetime of a login session, in days
    #[arg(long, env = "SESSION_TTL_DAYS", default_value_t = 7)]
    pub session_ttl_days: i64,

    /// Runtime environment; `development` exposes error details in 500 responses
    #[arg(long = "env", env = "APP_ENV", default_value = "production")]
    pub app_env: String,
}

impl Config {
    /// Load `.env` (if any) and parse flags and environment variables.
    pub fn load() -> Self {
        // A missing .env file is the normal case in production.
        let _ = dotenvy::dotenv();
        Config::parse()
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: "sqlite://datasight.db?mode=rwc".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_ttl_days: 7,
            app_env: "production".to_string(),
        }
    }
}
