use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::consent_record::DEFAULT_RETENTION_MONTHS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Statutory retention period applied when a consent record is created.
    /// Changing it never moves deadlines already fixed on existing records.
    pub retention_months: u32,
    pub voice_api_base_url: Option<String>,
    pub voice_api_key: Option<String>,
    pub recordings_bucket: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/consentkeeper".to_string());

        let retention_months = env::var("CONSENT_RETENTION_MONTHS")
            .unwrap_or_else(|_| DEFAULT_RETENTION_MONTHS.to_string())
            .parse()
            .unwrap_or(DEFAULT_RETENTION_MONTHS);
        if retention_months == 0 {
            return Err(anyhow!("CONSENT_RETENTION_MONTHS must be positive"));
        }

        let voice_api_base_url = env::var("VOICE_API_BASE_URL").ok();
        let voice_api_key = env::var("VOICE_API_KEY").ok();
        let recordings_bucket = env::var("RECORDINGS_BUCKET").ok();

        Ok(Config {
            database_url,
            retention_months,
            voice_api_base_url,
            voice_api_key,
            recordings_bucket,
        })
    }

    pub fn retention_period(&self) -> chrono::Months {
        chrono::Months::new(self.retention_months)
    }
}
