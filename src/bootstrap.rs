//! Cold-start creation of the users table for local and test stacks.

use aws_sdk_dynamodb::{
    types::{
        AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
        TableStatus,
    },
    Client, Error,
};
use tokio::time::{sleep, Duration, Instant};
use tracing::{info, warn};

const ACTIVE_DEADLINE: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Make sure `table` exists with `username` as its string partition key.
///
/// A table that is already there is left untouched, whatever its schema.
pub async fn ensure_users_table(client: &Client, table: &str) -> Result<(), Error> {
    match table_status(client, table).await? {
        Some(TableStatus::Active) => return Ok(()),
        Some(status) => info!(%table, ?status, "users table exists but is not active yet"),
        None => create_users_table(client, table).await?,
    }
    wait_until_active(client, table).await
}

async fn create_users_table(client: &Client, table: &str) -> Result<(), Error> {
    info!(%table, "creating users table");
    let key = "username";
    let result = client
        .create_table()
        .table_name(table)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(key)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(key)
                .key_type(KeyType::Hash)
                .build()?,
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        // another cold start got there first
        Err(err)
            if err
                .as_service_error()
                .is_some_and(|e| e.is_resource_in_use_exception()) =>
        {
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// `None` when the table does not exist.
async fn table_status(client: &Client, table: &str) -> Result<Option<TableStatus>, Error> {
    match client.describe_table().table_name(table).send().await {
        Ok(output) => Ok(output.table.and_then(|t| t.table_status)),
        Err(err)
            if err
                .as_service_error()
                .is_some_and(|e| e.is_resource_not_found_exception()) =>
        {
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

async fn wait_until_active(client: &Client, table: &str) -> Result<(), Error> {
    let deadline = Instant::now() + ACTIVE_DEADLINE;
    while Instant::now() < deadline {
        if table_status(client, table).await? == Some(TableStatus::Active) {
            return Ok(());
        }
        sleep(POLL_INTERVAL).await;
    }
    warn!(%table, "users table still not active; continuing");
    Ok(())
}
