use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::error::AppError;

/// Offset-less layouts written by older tooling; read as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A user record as stored in the users table, keyed by `username`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    /// Empty when the item carries no hash; such a user can never log in.
    pub password_hash: String,
    pub email: Option<String>,
    /// `None` when the item has no timestamp or one in an unknown layout.
    pub created_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Build a record for a new user, stamping `created_at` with the current time.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            email: email.filter(|e| !e.trim().is_empty()),
            created_at: Some(Utc::now()),
        }
    }

    /// Convert the record into a DynamoDB attribute map.
    pub fn into_item(self) -> HashMap<String, AttributeValue> {
        let mut map = HashMap::new();
        map.insert("username".into(), AttributeValue::S(self.username));
        map.insert("password_hash".into(), AttributeValue::S(self.password_hash));
        if let Some(email) = self.email {
            map.insert("email".into(), AttributeValue::S(email));
        }
        if let Some(created_at) = self.created_at {
            map.insert(
                "created_at".into(),
                AttributeValue::S(created_at.to_rfc3339()),
            );
        }
        map
    }

    /// Rehydrate a record from a DynamoDB attribute map.
    ///
    /// Only `username` is required. Everything else degrades: a missing hash
    /// reads as empty and an unreadable `created_at` as `None`.
    pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Self, AppError> {
        let get_str = |key: &str| item.get(key).and_then(|v| v.as_s().ok()).cloned();
        let username =
            get_str("username").ok_or_else(|| AppError::Store("missing attribute `username`".into()))?;
        let created_at = get_str("created_at").and_then(|raw| {
            let parsed = parse_created_at(&raw);
            if parsed.is_none() {
                debug!(%username, %raw, "unreadable created_at");
            }
            parsed
        });
        Ok(Self {
            password_hash: get_str("password_hash").unwrap_or_default(),
            email: get_str("email").filter(|e| !e.trim().is_empty()),
            created_at,
            username,
        })
    }
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
