use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consentkeeper_backend::{
    config::Config, db::connection::create_pool, repositories::PgConsentStore,
    services::retention::RetentionScanner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consentkeeper_backend=info,retention_dry_run=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;

    let scanner = RetentionScanner::new(Arc::new(PgConsentStore::new(pool)));
    let now = Utc::now();
    let due = scanner.find_due_records(now).await?;

    for record in &due {
        tracing::info!(
            record_id = %record.id,
            subject_id = %record.subject_id,
            agreed_at = %record.agreed_at,
            retention_deadline = %record.retention_deadline,
            "record due for retention enforcement"
        );
    }

    tracing::info!(count = due.len(), %now, "dry run complete; no records were modified");

    Ok(())
}
