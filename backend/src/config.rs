use crate::error::{AgriTechError, AgriTechResult};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const INSECURE_SECRET: &str = "insecure-development-secret-key-replace-me-immediately";
// Ten years.
const MAX_TOKEN_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Bootstrap superuser created at startup when all three values are set.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Process-wide settings, built once in `main` and handed to every service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub database_url: String,
    pub secret_key: String,
    pub access_token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub allowed_origins: Vec<String>,
    pub port: u16,
    pub task_workers: usize,
    pub task_time_limit: Duration,
    pub enable_scheduler: bool,
    pub log_format: LogFormat,
    pub admin: Option<AdminSeed>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_name: "AgriTech".to_string(),
            environment: "development".to_string(),
            api_prefix: "/api/v1".to_string(),
            database_url: "sqlite://agritech.db?mode=rwc".to_string(),
            secret_key: INSECURE_SECRET.to_string(),
            access_token_ttl: chrono::Duration::minutes(60 * 24 * 8),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            port: 8000,
            task_workers: 4,
            task_time_limit: Duration::from_secs(30 * 60),
            enable_scheduler: true,
            log_format: LogFormat::Pretty,
            admin: None,
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and overlays the process environment on the defaults.
    pub fn from_env() -> AgriTechResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AgriTechResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(v) = lookup("PROJECT_NAME") {
            settings.project_name = v;
        }
        if let Some(v) = lookup("ENVIRONMENT") {
            settings.environment = v;
        }
        if let Some(v) = lookup("API_V1_STR") {
            settings.api_prefix = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("DATABASE_URL") {
            settings.database_url = v;
        }
        if let Some(v) = lookup("SECRET_KEY").filter(|v| !v.trim().is_empty()) {
            settings.secret_key = v;
        }
        if let Some(minutes) = parse_var::<i64>(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES")? {
            if !(1..=MAX_TOKEN_MINUTES).contains(&minutes) {
                return Err(AgriTechError::Validation(format!(
                    "ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {}",
                    MAX_TOKEN_MINUTES
                )));
            }
            settings.access_token_ttl = chrono::Duration::minutes(minutes);
        }
        if let Some(cost) = parse_var::<u32>(&lookup, "BCRYPT_COST")? {
            if !(4..=31).contains(&cost) {
                return Err(AgriTechError::Validation(
                    "BCRYPT_COST must be between 4 and 31".to_string(),
                ));
            }
            settings.bcrypt_cost = cost;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            settings.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(port) = parse_var::<u16>(&lookup, "PORT")? {
            settings.port = port;
        }
        if let Some(workers) = parse_var::<usize>(&lookup, "TASK_WORKERS")? {
            settings.task_workers = workers.max(1);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TASK_TIME_LIMIT_SECS")? {
            settings.task_time_limit = Duration::from_secs(secs.max(1));
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "ENABLE_SCHEDULER")? {
            settings.enable_scheduler = enabled;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            settings.log_format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }

        settings.admin = match (
            lookup("ADMIN_USERNAME"),
            lookup("ADMIN_EMAIL"),
            lookup("ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(AdminSeed {
                username,
                email,
                password,
            }),
            _ => None,
        };

        if settings.is_production() && settings.uses_insecure_secret() {
            return Err(AgriTechError::Validation(
                "SECRET_KEY must be set in production".to_string(),
            ));
        }

        Ok(settings)
    }

    /// True when `SECRET_KEY` was missing or blank and the built-in key is in use.
    pub fn uses_insecure_secret(&self) -> bool {
        self.secret_key == INSECURE_SECRET
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> AgriTechResult<Option<T>>
where
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AgriTechError::Validation(format!("{} has an invalid value: {}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_eight_day_token_lifetime() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.access_token_ttl, chrono::Duration::days(8));
        assert_eq!(settings.api_prefix, "/api/v1");
        assert_eq!(settings.task_time_limit, Duration::from_secs(1800));
        assert!(settings.admin.is_none());
    }

    #[test]
    fn test_overrides_from_environment() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s3cret"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "30"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("TASK_WORKERS", "0"),
            ("LOG_FORMAT", "JSON"),
            ("API_V1_STR", "/api/v2/"),
        ]))
        .unwrap();

        assert_eq!(settings.secret_key, "s3cret");
        assert_eq!(settings.access_token_ttl, chrono::Duration::minutes(30));
        assert_eq!(
            settings.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(settings.task_workers, 1);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.api_prefix, "/api/v2");
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let result = Settings::from_lookup(lookup_from(&[("PORT", "eighty")]));
        assert!(matches!(result, Err(AgriTechError::Validation(_))));

        let result = Settings::from_lookup(lookup_from(&[("ACCESS_TOKEN_EXPIRE_MINUTES", "-5")]));
        assert!(matches!(result, Err(AgriTechError::Validation(_))));
    }

    #[test]
    fn test_missing_secret_is_flagged() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert!(settings.uses_insecure_secret());

        let blank = Settings::from_lookup(lookup_from(&[("SECRET_KEY", "  ")])).unwrap();
        assert!(blank.uses_insecure_secret());

        let set = Settings::from_lookup(lookup_from(&[("SECRET_KEY", "s3cret")])).unwrap();
        assert!(!set.uses_insecure_secret());
    }

    #[test]
    fn test_out_of_range_numbers_are_rejected() {
        let huge = Settings::from_lookup(lookup_from(&[(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            "9223372036854775807",
        )]));
        assert!(matches!(huge, Err(AgriTechError::Validation(_))));

        for cost in ["3", "32"] {
            let result = Settings::from_lookup(lookup_from(&[("BCRYPT_COST", cost)]));
            assert!(matches!(result, Err(AgriTechError::Validation(_))), "cost {}", cost);
        }

        let ok = Settings::from_lookup(lookup_from(&[
            ("BCRYPT_COST", "4"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "525600"),
        ]))
        .unwrap();
        assert_eq!(ok.bcrypt_cost, 4);
        assert_eq!(ok.access_token_ttl, chrono::Duration::days(365));
    }

    #[test]
    fn test_production_requires_secret() {
        let result = Settings::from_lookup(lookup_from(&[("ENVIRONMENT", "production")]));
        assert!(matches!(result, Err(AgriTechError::Validation(_))));

        let settings = Settings::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "Production"),
            ("SECRET_KEY", "s3cret"),
        ]))
        .unwrap();
        assert!(settings.is_production());
    }

    #[test]
    fn test_admin_seed_requires_all_fields() {
        let partial = Settings::from_lookup(lookup_from(&[("ADMIN_USERNAME", "root")])).unwrap();
        assert!(partial.admin.is_none());

        let full = Settings::from_lookup(lookup_from(&[
            ("ADMIN_USERNAME", "root"),
            ("ADMIN_EMAIL", "root@farm.test"),
            ("ADMIN_PASSWORD", "changeme"),
        ]))
        .unwrap();
        assert_eq!(full.admin.unwrap().username, "root");
    }
}
