// utils/config.rs
use crate::utils::error::{AppError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Serveur
    pub server_host: String,
    pub server_port: u16,
    pub shutdown_timeout_secs: u64,

    // Base de données
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_connection_timeout: u64,

    // CORS
    pub client_url: Option<String>,

    // Limites
    pub rate_limit_max: usize,
    pub rate_limit_window_secs: u64,
    pub json_body_limit: usize,
}

impl Config {
    /// Charger la configuration depuis les variables d'environnement
    /// (le fichier .env est chargé par `main`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construire la configuration à partir d'une source clé/valeur arbitraire
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation(
                    "Variable d'environnement requise manquante: DATABASE_URL".to_string(),
                )
            })?;

        let config = Config {
            server_host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: var_or(&lookup, "PORT", 5000)?,
            shutdown_timeout_secs: var_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 10)?,

            database_url,
            database_max_connections: var_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            database_connection_timeout: var_or(&lookup, "DATABASE_CONNECTION_TIMEOUT", 30)?,

            client_url: lookup("CLIENT_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),

            rate_limit_max: var_or(&lookup, "RATE_LIMIT_MAX", 100)?,
            rate_limit_window_secs: var_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 15 * 60)?,
            json_body_limit: var_or(&lookup, "JSON_BODY_LIMIT", 100 * 1024)?,
        };

        if config.database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if config.rate_limit_window_secs == 0 {
            return Err(AppError::Validation(
                "RATE_LIMIT_WINDOW_SECS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn database_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.database_connection_timeout)
    }
}

/// Taille du pool de workers, seule valeur dont le superviseur a besoin.
///
/// `CLUSTER_WORKERS` remplace le nombre de CPU logiques ; une valeur
/// invalide ou nulle est ignorée avec un avertissement.
pub fn cluster_size_from_env() -> usize {
    cluster_size(|key| env::var(key).ok())
}

pub fn cluster_size<F>(lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let cpus = num_cpus::get();

    match lookup("CLUSTER_WORKERS") {
        None => cpus,
        Some(raw) => match parse_var::<usize>("CLUSTER_WORKERS", &raw) {
            Ok(size) if size > 0 => size,
            _ => {
                tracing::warn!(
                    "⚠️  CLUSTER_WORKERS invalide ({:?}), utilisation de {} workers",
                    raw,
                    cpus
                );
                cpus
            }
        },
    }
}

fn var_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => parse_var(key, &raw),
        None => Ok(default),
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be a number", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/shop")]))
                .unwrap();

        assert_eq!(config.server_port, 5000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(900));
        assert_eq!(config.json_body_limit, 102_400);
        assert!(config.client_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/shop"),
            ("PORT", "8080"),
            ("CLIENT_URL", "https://shop.example.com/"),
            ("RATE_LIMIT_MAX", "5"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.client_url.as_deref(), Some("https://shop.example.com"));
        assert_eq!(config.rate_limit_max, 5);
    }

    #[test]
    fn test_missing_database_url() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "8080")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/shop"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("PORT")));
    }

    #[test]
    fn test_cluster_size_defaults_to_cpu_count() {
        assert_eq!(cluster_size(lookup_from(&[])), num_cpus::get());
    }

    #[test]
    fn test_cluster_size_override() {
        assert_eq!(cluster_size(lookup_from(&[("CLUSTER_WORKERS", "3")])), 3);
    }

    #[test]
    fn test_cluster_size_ignores_invalid_values() {
        assert_eq!(cluster_size(lookup_from(&[("CLUSTER_WORKERS", "0")])), num_cpus::get());
        assert_eq!(cluster_size(lookup_from(&[("CLUSTER_WORKERS", "many")])), num_cpus::get());
    }

    #[test]
    fn test_cluster_size_needs_no_worker_settings() {
        // Ni DATABASE_URL ni PORT valide : le superviseur démarre quand même
        let lookup = lookup_from(&[("PORT", "not-a-port")]);
        assert!(Config::from_lookup(&lookup).is_err());
        assert_eq!(cluster_size(&lookup), num_cpus::get());
    }
}
