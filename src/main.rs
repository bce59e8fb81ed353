use anyhow::Context;
use signtalk_admin::auth::verifier::IdTokenVerifier;
use signtalk_admin::config::Config;
use signtalk_admin::server::{create_router, AppState};
use signtalk_admin::SignTalkApp;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let key = yup_oauth2::read_service_account_key(&config.service_account_path)
        .await
        .with_context(|| format!("reading service account {}", config.service_account_path.display()))?;

    let app = SignTalkApp::new(key, config.api_key.clone(), config.storage_bucket.clone());
    let project_id = app
        .project_id()
        .context("the service account key has no project_id")?
        .to_string();

    tracing::info!(project_id = %project_id, "starting SignTalk admin backend");

    let state = AppState::new(app.console(), IdTokenVerifier::new(project_id));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, router).await?;

    Ok(())
}
