use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_SLOT_CAPACITY: u32 = 10;
pub const DEFAULT_EXAMINATION_FEE: f64 = 150_000.0;
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 1024;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub redis_url: Option<String>,
    pub notification_webhook_url: Option<String>,
    pub default_slot_capacity: u32,
    pub examination_fee: f64,
    pub notification_buffer: usize,
    pub statistics_refresh_seconds: u64,
    pub port: u16,
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
            redis_url: optional_var("REDIS_URL"),
            notification_webhook_url: optional_var("NOTIFICATION_WEBHOOK_URL"),
            default_slot_capacity: parsed_var("SLOT_CAPACITY", DEFAULT_SLOT_CAPACITY),
            examination_fee: parsed_var("EXAMINATION_FEE", DEFAULT_EXAMINATION_FEE),
            notification_buffer: parsed_var("NOTIFICATION_BUFFER", DEFAULT_NOTIFICATION_BUFFER),
            statistics_refresh_seconds: parsed_var("STATISTICS_REFRESH_SECONDS", 0),
            port: parsed_var("PORT", DEFAULT_PORT),
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

    /// Whether registrations and doctors should be read from Supabase rather than memory.
    pub fn is_ledger_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
