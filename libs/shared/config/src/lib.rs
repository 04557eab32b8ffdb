use std::env;
use std::path::PathBuf;
use std::time::Duration;
use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// How often a Supabase-backed subscription re-reads its collection.
    pub realtime_poll_interval_ms: u64,
    pub preferences_path: PathBuf,
    /// Offset used for store times that carry none, e.g. `+02:00`.
    pub clinic_utc_offset: FixedOffset,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            realtime_poll_interval_ms: match env::var("REALTIME_POLL_INTERVAL_MS") {
                Ok(raw) => raw.parse().unwrap_or_else(|_| {
                    warn!("REALTIME_POLL_INTERVAL_MS is not a number ({}), using default", raw);
                    DEFAULT_POLL_INTERVAL_MS
                }),
                Err(_) => DEFAULT_POLL_INTERVAL_MS,
            },
            preferences_path: env::var("PREFERENCES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    warn!("PREFERENCES_PATH not set, using default");
                    PathBuf::from("preferences.json")
                }),
            clinic_utc_offset: match env::var("CLINIC_UTC_OFFSET") {
                Ok(raw) => parse_offset(&raw).unwrap_or_else(|| {
                    warn!("CLINIC_UTC_OFFSET is not an offset like +02:00 ({}), using UTC", raw);
                    Utc.fix()
                }),
                Err(_) => Utc.fix(),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the polling task.
        Duration::from_millis(self.realtime_poll_interval_ms.max(100))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            realtime_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            preferences_path: PathBuf::from("preferences.json"),
            clinic_utc_offset: Utc.fix(),
        }
    }
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(Utc.fix());
    }
    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else {
        (-1, raw.strip_prefix('-')?)
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
