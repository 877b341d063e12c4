use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consentkeeper_backend::{
    config::Config,
    db::connection::create_pool,
    repositories::{PgAuditLog, PgConsentStore},
    services::{
        deletion_gateway::{
            CompositeDeletionGateway, DeletionGateway, RecordingStorageGateway,
            VoiceProfileGateway,
        },
        retention_job::RetentionJob,
    },
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<unset>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

async fn build_gateway(config: &Config) -> CompositeDeletionGateway {
    let mut gateways: Vec<Box<dyn DeletionGateway>> = Vec::new();

    if let (Some(base_url), Some(api_key)) =
        (&config.voice_api_base_url, &config.voice_api_key)
    {
        gateways.push(Box::new(VoiceProfileGateway::new(
            base_url.clone(),
            api_key.clone(),
        )));
    }

    if let Some(bucket) = &config.recordings_bucket {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&aws_config);
        gateways.push(Box::new(RecordingStorageGateway::new(
            client,
            bucket.clone(),
        )));
    }

    if gateways.is_empty() {
        tracing::warn!("no deletion gateways configured; dependent artifacts will not be purged");
    }

    CompositeDeletionGateway::new(gateways)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consentkeeper_backend=info,retention_job=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        retention_months = config.retention_months,
        voice_api_base_url = config.voice_api_base_url.as_deref().unwrap_or("<unset>"),
        voice_api_key = %mask_secret(config.voice_api_key.as_deref().unwrap_or("")),
        recordings_bucket = config.recordings_bucket.as_deref().unwrap_or("<unset>"),
        "Loaded configuration from environment/.env"
    );

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(pool.as_ref()).await?;

    let store = Arc::new(PgConsentStore::new(pool.clone()));
    let audit = Arc::new(PgAuditLog::new(pool.clone()));
    let gateway = Arc::new(build_gateway(&config).await);

    // The engine never reads the wall clock itself; this is the single
    // place `now` enters the run.
    let job = RetentionJob::new(store, audit, gateway);
    let summary = job.run(Utc::now()).await?;

    if summary.needs_attention() {
        tracing::warn!(
            failures = summary.failures.len(),
            "retention run requires operator attention"
        );
    }

    // Structured payload for the notification collaborator.
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
