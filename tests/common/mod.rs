#![allow(dead_code)]

use std::{
    collections::HashMap,
    env,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::{config::Region, types::AttributeValue, Client, Config};
use bedrock_auth_proxy::{
    auth::hash_password, bootstrap::ensure_users_table, config::Settings, error::AppError,
    store::UserStore, user::UserRecord, AppContext, Clock,
};
use lambda_http::{http::Request, Body};
use uuid::Uuid;

pub const SECRET: &str = "integration-secret";
pub const NOW: i64 = 1_700_000_000;

pub fn body_as_string(body: &Body) -> String {
    match body {
        Body::Text(s) => s.clone(),
        Body::Binary(b) => String::from_utf8_lossy(b).to_string(),
        Body::Empty => String::new(),
    }
}

pub fn body_json(body: &Body) -> serde_json::Value {
    serde_json::from_str(&body_as_string(body)).expect("JSON body")
}

/// Users kept in a map; stands in for the DynamoDB table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn with_user(self, username: &str, password: &str) -> Self {
        let record = UserRecord::new(username, hash_password(password), None);
        self.users
            .lock()
            .unwrap()
            .insert(username.to_string(), record);
        self
    }

    /// Seed a raw item the way it sits in the table, decoded as the real store would.
    pub fn with_item(self, pairs: &[(&str, &str)]) -> Self {
        let item: HashMap<String, AttributeValue> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::S(v.to_string())))
            .collect();
        let record = UserRecord::from_item(&item).expect("item decodes");
        self.users
            .lock()
            .unwrap()
            .insert(record.username.clone(), record);
        self
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.lock().unwrap().get(username).cloned())
    }

    async fn create_user(&self, record: UserRecord) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&record.username) {
            return Ok(false);
        }
        users.insert(record.username.clone(), record);
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }

    async fn delete_user(&self, username: &str) -> Result<bool, AppError> {
        Ok(self.users.lock().unwrap().remove(username).is_some())
    }
}

/// A store whose every call fails, as an unreachable table would.
pub struct FailingStore;

#[async_trait]
impl UserStore for FailingStore {
    async fn get_user(&self, _username: &str) -> Result<Option<UserRecord>, AppError> {
        Err(AppError::Store("ResourceNotFoundException".into()))
    }

    async fn create_user(&self, _record: UserRecord) -> Result<bool, AppError> {
        Err(AppError::Store("ResourceNotFoundException".into()))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        Err(AppError::Store("ResourceNotFoundException".into()))
    }

    async fn delete_user(&self, _username: &str) -> Result<bool, AppError> {
        Err(AppError::Store("ResourceNotFoundException".into()))
    }
}

/// Clock that only moves when told to.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(now: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn settings(vars: &[(&str, &str)]) -> Settings {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(|key| vars.get(key).cloned()).expect("settings")
}

pub fn context(
    settings: Settings,
    store: Option<Arc<dyn UserStore>>,
    clock: Arc<ManualClock>,
) -> Arc<AppContext> {
    Arc::new(AppContext::new(store, reqwest::Client::new(), settings).with_clock(clock))
}

pub fn login_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::Text(body.to_string()))
        .expect("login request")
}

pub fn proxy_request(uri: &str, authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    builder
        .body(Body::Text(body.to_string()))
        .expect("proxy request")
}

/// A uniquely named users table in DynamoDB Local. Tests call
/// [`DynamoTable::teardown`] when done.
pub struct DynamoTable {
    pub client: Client,
    pub table: String,
}

impl DynamoTable {
    pub async fn teardown(self) -> anyhow::Result<()> {
        self.client
            .delete_table()
            .table_name(&self.table)
            .send()
            .await?;
        Ok(())
    }
}

/// Connect to DynamoDB Local and create a fresh users table, or return `None`
/// when no endpoint answers so the calling test can skip itself.
pub async fn setup_dynamo() -> Option<DynamoTable> {
    let endpoint =
        env::var("DYNAMODB_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
    let region = Region::new(env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()));
    let config = Config::builder()
        .endpoint_url(endpoint)
        .region(region)
        .credentials_provider(Credentials::new("test", "test", None, None, "integration-test"))
        .behavior_version_latest()
        .build();
    let client = Client::from_conf(config);

    if client.list_tables().send().await.is_err() {
        eprintln!("skipping integration test: DynamoDB not reachable");
        return None;
    }

    let table = format!("integration-users-{}", Uuid::new_v4().simple());
    ensure_users_table(&client, &table).await.ok()?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    Some(DynamoTable { client, table })
}
