//! Lambda entrypoint.
//!
//! Cold start resolves configuration once (the JWT secret from SSM when a
//! parameter is named), builds the DynamoDB and HTTP clients and shares them
//! with every invocation through an `AppContext`.

use std::{env, sync::Arc};

use aws_config::SdkConfig;
use bedrock_auth_proxy::{
    bootstrap::ensure_users_table,
    config::Settings,
    handle_request, logging,
    runtime_env::DeploymentEnv,
    store::{DynamoUserStore, UserStore},
    AppContext,
};
use lambda_http::{run, service_fn, Error as LambdaError};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    logging::init_json();

    let environment = DeploymentEnv::detect();
    let mut settings = Settings::from_env()?;
    // a deployed function without USERS_TABLE rejects logins as misconfigured
    let users_table = settings
        .users_table
        .clone()
        .or_else(|| environment.is_local().then(|| environment.default_users_table()));
    info!(
        environment = environment.name(),
        detected_from = %environment.source(),
        users_table = users_table.as_deref().unwrap_or("<unset>"),
        routes = settings.routes.len(),
        "cold start"
    );

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let dynamo = aws_sdk_dynamodb::Client::new(&sdk_config);

    match users_table.as_deref() {
        Some(table) if bootstrap_requested(&environment) => {
            ensure_users_table(&dynamo, table)
                .await
                .map_err(|e| LambdaError::from(format!("users table bootstrap failed: {e}")))?;
        }
        _ => info!("users table bootstrap skipped"),
    }

    if let Ok(parameter) = env::var("JWT_SECRET_PARAMETER") {
        if let Some(secret) = secret_from_ssm(&sdk_config, &parameter).await {
            settings = settings.with_jwt_secret(secret);
        }
    }
    if settings.jwt_secret.is_none() {
        warn!("no JWT secret configured; login and proxy requests will fail");
    }

    let store = users_table.map(|table| {
        Arc::new(DynamoUserStore::new(dynamo, table)) as Arc<dyn UserStore>
    });
    let http = reqwest::Client::builder()
        .timeout(settings.upstream_timeout)
        .build()?;
    let ctx = Arc::new(AppContext::new(store, http, settings));

    run(service_fn(move |event| {
        let ctx = ctx.clone();
        async move { handle_request(ctx, event).await }
    }))
    .await
}

/// `BOOTSTRAP_DYNAMODB_TABLES` when set, otherwise only in the local environment.
fn bootstrap_requested(environment: &DeploymentEnv) -> bool {
    env::var("BOOTSTRAP_DYNAMODB_TABLES")
        .map(|raw| {
            matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or_else(|_| environment.is_local())
}

/// Decrypted value of an SSM SecureString. Failures are logged and yield
/// `None`, leaving `JWT_SECRET` from the environment in effect.
async fn secret_from_ssm(sdk_config: &SdkConfig, parameter: &str) -> Option<String> {
    let ssm = aws_sdk_ssm::Client::new(sdk_config);
    let result = ssm
        .get_parameter()
        .name(parameter)
        .with_decryption(true)
        .send()
        .await;
    match result {
        Ok(output) => {
            let value = output.parameter.and_then(|p| p.value);
            if value.is_none() {
                warn!(%parameter, "SSM parameter has no value; using JWT_SECRET");
            }
            value
        }
        Err(err) => {
            warn!(
                %parameter,
                error = %aws_sdk_ssm::error::DisplayErrorContext(&err),
                "SSM lookup failed; using JWT_SECRET"
            );
            None
        }
    }
}
