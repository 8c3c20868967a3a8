use std::{env, str::FromStr, time::Duration};

/// Maximum accepted JSON request body, in bytes (10 MB).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only through `AppState` (pulled into extractors via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls error disclosure, log format and CORS origins.
    pub env: Env,
    // TCP port the HTTP server binds to.
    pub port: u16,
    // Postgres connection string. `None` selects the in-memory document store (development only).
    pub db_url: Option<String>,
    // Shared HS256 secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    // Lifetime of issued tokens.
    pub token_ttl: Duration,
    // Directory holding the append-only `server.log`.
    pub log_dir: String,
    pub rate_limit: RateLimitSettings,
    // Deadline applied to every persistence call.
    pub persistence_timeout: Duration,
    // PBKDF2 rounds for stored passwords.
    pub password_iterations: u32,
    // Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
    // Admin account created at startup when missing.
    pub seed_admin: Option<SeedAdmin>,
}

/// RateLimitSettings
///
/// Window length and ceilings for the general and login classifications.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub general_max: u64,
    pub login_max: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            general_max: 100,
            login_max: 5,
        }
    }
}

/// Credentials of the bootstrap admin.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
}

/// Env
///
/// Defines the runtime context. Development exposes internal error messages and
/// human-readable logs; Production hides internals and emits JSON logs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Development,
    Production,
}

impl Env {
    pub fn as_str(&self) -> &'static str {
        match self {
            Env::Development => "development",
            Env::Production => "production",
        }
    }
}

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const DEV_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173",
    "https://erp-college-psi.vercel.app",
];

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    /// Uses the in-memory store and a cheap password hash cost.
    fn default() -> Self {
        Self {
            env: Env::Development,
            port: 5001,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl: Duration::from_secs(60 * 60),
            log_dir: "logs".to_string(),
            rate_limit: RateLimitSettings::default(),
            persistence_timeout: Duration::from_secs(10),
            password_iterations: 1_000,
            cors_origins: DEV_ORIGINS.iter().map(|o| o.to_string()).collect(),
            seed_admin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and implements the **fail-fast**
    /// principle.
    ///
    /// # Panics
    /// Panics if a variable required in Production (`JWT_SECRET_KEY`, `DATABASE_URL`) is
    /// missing, or if a numeric variable cannot be parsed.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Development,
        };

        let jwt_secret = match env {
            Env::Production => env::var("JWT_SECRET_KEY")
                .expect("FATAL: JWT_SECRET_KEY must be set in production."),
            Env::Development => {
                env::var("JWT_SECRET_KEY").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string())
            }
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production"),
            ),
            Env::Development => env::var("DATABASE_URL").ok(),
        };

        let cors_origins = match env {
            Env::Production => env::var("FRONTEND_URL")
                .map(|urls| {
                    urls.split(',')
                        .map(|u| u.trim().to_string())
                        .filter(|u| !u.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]),
            Env::Development => DEV_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        // The bootstrap admin only gets a default password outside production.
        let seed_admin = match (env::var("SEED_ADMIN_PASSWORD"), env) {
            (Ok(password), _) => Some(SeedAdmin {
                username: env::var("SEED_ADMIN_USERNAME")
                    .unwrap_or_else(|_| "ADMDUMMY".to_string()),
                password,
            }),
            (Err(_), Env::Development) => Some(SeedAdmin {
                username: "ADMDUMMY".to_string(),
                password: "123".to_string(),
            }),
            (Err(_), Env::Production) => None,
        };

        let defaults = RateLimitSettings::default();

        Self {
            env,
            port: parse_var("PORT", 5001),
            db_url,
            jwt_secret,
            token_ttl: Duration::from_secs(parse_var("TOKEN_TTL_SECS", 60 * 60)),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            rate_limit: RateLimitSettings {
                window: Duration::from_secs(parse_var(
                    "RATE_LIMIT_WINDOW_SECS",
                    defaults.window.as_secs(),
                )),
                general_max: parse_var("RATE_LIMIT_MAX", defaults.general_max),
                login_max: parse_var("LOGIN_RATE_LIMIT_MAX", defaults.login_max),
            },
            persistence_timeout: Duration::from_secs(parse_var("PERSISTENCE_TIMEOUT_SECS", 10)),
            password_iterations: parse_var("PASSWORD_HASH_ITERATIONS", 600_000),
            cors_origins,
            seed_admin,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} has an invalid value: {raw}")),
        Err(_) => default,
    }
}
