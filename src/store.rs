//! User lookup seam and its DynamoDB implementation.

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::DisplayErrorContext,
    operation::{delete_item::DeleteItemError, put_item::PutItemError},
    types::AttributeValue,
    Client,
};
use tracing::debug;

use crate::{error::AppError, user::UserRecord};

/// Read/write access to user records.
///
/// The login handler only ever calls [`UserStore::get_user`]; the write
/// operations exist for the `manage-users` tool.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, AppError>;

    /// Insert `record`. Returns `false` without writing if the username is taken.
    async fn create_user(&self, record: UserRecord) -> Result<bool, AppError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError>;

    /// Remove `username`. Returns `false` if no such user existed.
    async fn delete_user(&self, username: &str) -> Result<bool, AppError>;
}

/// Users table in DynamoDB with `username` as the partition key.
#[derive(Clone)]
pub struct DynamoUserStore {
    client: Client,
    table: String,
}

impl DynamoUserStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

fn store_error<E: std::error::Error>(err: E) -> AppError {
    AppError::Store(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl UserStore for DynamoUserStore {
    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("username", AttributeValue::S(username.to_string()))
            .send()
            .await
            .map_err(store_error)?;
        output.item.as_ref().map(UserRecord::from_item).transpose()
    }

    async fn create_user(&self, record: UserRecord) -> Result<bool, AppError> {
        let username = record.username.clone();
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record.into_item()))
            .condition_expression("attribute_not_exists(username)")
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err)
                if matches!(
                    err.as_service_error(),
                    Some(PutItemError::ConditionalCheckFailedException(_))
                ) =>
            {
                debug!(%username, "user already exists");
                Ok(false)
            }
            Err(err) => Err(store_error(err)),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let mut users = Vec::new();
        let mut start_key = None;
        loop {
            let resp = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(store_error)?;
            for item in resp.items() {
                users.push(UserRecord::from_item(item)?);
            }
            match resp.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn delete_user(&self, username: &str) -> Result<bool, AppError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key("username", AttributeValue::S(username.to_string()))
            .condition_expression("attribute_exists(username)")
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err)
                if matches!(
                    err.as_service_error(),
                    Some(DeleteItemError::ConditionalCheckFailedException(_))
                ) =>
            {
                Ok(false)
            }
            Err(err) => Err(store_error(err)),
        }
    }
}
