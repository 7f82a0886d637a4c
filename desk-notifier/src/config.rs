use std::{env, time::Duration};

use clinic_desk::{config::ConfigError, models::ClinicSettings};

#[derive(Clone, Debug)]
pub struct NotifierConfig {
    pub desk_url: String,
    pub clinic_id: String,
    pub api_key: String,
    pub chat_interval: Duration,
    pub appointment_interval: Duration,
    pub window: Duration,
    pub play_sound: bool,
    /// Poll intervals came from the environment and outrank clinic settings.
    pub intervals_from_env: bool,
    pub sound_from_env: bool,
}

fn secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid { name, value }),
            Ok(n) => Ok(Duration::from_secs(n)),
        },
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let intervals_from_env =
            env::var("CHAT_POLL_SECS").is_ok() || env::var("APPOINTMENT_POLL_SECS").is_ok();
        let sound_from_env = env::var("NOTIFY_SOUND").is_ok();

        let play_sound = match env::var("NOTIFY_SOUND") {
            Ok(value) => match value.as_str() {
                "1" | "true" | "on" => true,
                "0" | "false" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "NOTIFY_SOUND",
                        value,
                    });
                }
            },
            Err(_) => true,
        };

        Ok(Self {
            desk_url: env::var("DESK_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            clinic_id: required("DESK_CLINIC_ID")?,
            api_key: required("DESK_API_KEY")?,
            chat_interval: secs("CHAT_POLL_SECS", 10)?,
            appointment_interval: secs("APPOINTMENT_POLL_SECS", 15)?,
            window: secs("NOTIFY_WINDOW_SECS", 300)?,
            play_sound,
            intervals_from_env,
            sound_from_env,
        })
    }

    /// Adopts the clinic's stored preferences wherever the environment left
    /// the value unset.
    pub fn apply_clinic_settings(&mut self, settings: &ClinicSettings) {
        if !self.intervals_from_env {
            let interval = Duration::from_secs(u64::from(settings.poll_interval_secs.max(1)));
            self.chat_interval = interval;
            self.appointment_interval = interval;
        }
        if !self.sound_from_env {
            self.play_sound = settings.notification_sound;
        }
    }
}
