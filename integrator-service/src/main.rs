use aws_config::{timeout::TimeoutConfig, BehaviorVersion, Region};
use integrator_service::{
    build_router,
    config::IntegratorConfig,
    services::{CognitoIdentityProvider, DynamoRelationStore, S3ObjectStore},
    AppState,
};
use service_core::observability::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    let config = IntegratorConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting integrator service"
    );

    let timeout = Duration::from_millis(config.aws.timeout_ms);
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws.region.clone()))
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(timeout)
                .operation_timeout(timeout)
                .build(),
        );
    if let Some(endpoint) = &config.aws.endpoint_url {
        tracing::info!(endpoint = %endpoint, "Using AWS endpoint override");
        loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;

    let store = DynamoRelationStore::new(
        aws_sdk_dynamodb::Client::new(&sdk_config),
        &config.dynamodb.table_name,
    );
    let identity = CognitoIdentityProvider::new(
        aws_sdk_cognitoidentityprovider::Client::new(&sdk_config),
        &config.cognito.user_pool_id,
        &config.cognito.client_id,
    );
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.aws.endpoint_url.is_some())
        .build();
    let objects = S3ObjectStore::new(aws_sdk_s3::Client::from_conf(s3_config), &config.s3.bucket);
    tracing::info!(
        table = %config.dynamodb.table_name,
        bucket = %config.s3.bucket,
        region = %config.aws.region,
        "AWS clients initialized"
    );

    let state = AppState::new(Arc::new(store), Arc::new(identity), Arc::new(objects));
    let app = build_router(state);

    let addr = config.common.socket_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
