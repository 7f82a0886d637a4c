use std::{env, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
    #[error("environment variable {name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Clinic inserted at startup so an in-memory desk can be logged into.
#[derive(Clone, Debug)]
pub struct SeedClinic {
    pub id: String,
    pub name: String,
    pub email: String,
    pub api_key: String,
}

#[derive(Clone, Debug)]
pub struct DeskConfig {
    pub listen_addr: String,
    pub session_ttl: Duration,
    pub intake_api_key: String,
    pub cors_origin: Option<String>,
    pub mongo_url: Option<String>,
    pub mongo_database: String,
    pub seed_clinic: Option<SeedClinic>,
}

impl DeskConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = env::var("DESK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let session_ttl = match env::var("SESSION_TTL_SECS") {
            Ok(value) => Duration::from_secs(value.parse().map_err(|_| ConfigError::Invalid {
                name: "SESSION_TTL_SECS",
                value,
            })?),
            Err(_) => Duration::from_secs(8 * 60 * 60),
        };

        let intake_api_key =
            env::var("INTAKE_API_KEY").map_err(|_| ConfigError::Missing("INTAKE_API_KEY"))?;
        if intake_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "INTAKE_API_KEY",
                value: intake_api_key,
            });
        }

        let seed_clinic = match (
            env::var("SEED_CLINIC_ID"),
            env::var("SEED_CLINIC_NAME"),
            env::var("SEED_CLINIC_API_KEY"),
        ) {
            (Ok(id), Ok(name), Ok(api_key)) => Some(SeedClinic {
                email: env::var("SEED_CLINIC_EMAIL").unwrap_or_else(|_| format!("{id}@localhost")),
                id,
                name,
                api_key,
            }),
            _ => None,
        };

        Ok(Self {
            listen_addr,
            session_ttl,
            intake_api_key,
            cors_origin: env::var("CORS_ORIGIN").ok(),
            mongo_url: env::var("MONGO_URL").ok(),
            mongo_database: env::var("MONGO_DATABASE")
                .unwrap_or_else(|_| "clinic_desk".to_string()),
            seed_clinic,
        })
    }
}
