use std::sync::Arc;

use lambda_http::{
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode},
    Body, Error as LambdaError, Request, RequestExt, Response,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    auth::{issue_token, validate_token, verify_password},
    context::AppContext,
    error::AppError,
    routes::target_url,
};

const BEARER_PREFIX: &str = "Bearer ";
const JSON: &str = "application/json";
const ALLOW_ORIGIN: &str = "*";
const ALLOW_HEADERS: &str = "Content-Type,Authorization,x-api-key";
const ALLOW_METHODS: &str = "GET,POST,OPTIONS";

/// Top-level request dispatcher used by the Lambda runtime.
///
/// `/login` (optionally under one stage segment such as `/prod/login`) goes
/// to the login handler, `OPTIONS` is answered as a CORS preflight,
/// everything else is proxied. Failures never reach the runtime:
/// they are rendered as `{"error": ...}` responses here.
pub async fn handle_request(
    ctx: Arc<AppContext>,
    event: Request,
) -> Result<Response<Body>, LambdaError> {
    let result = if event.method() == Method::OPTIONS {
        preflight()
    } else if is_login_path(event.uri().path()) {
        login(ctx.as_ref(), &event).await
    } else {
        proxy(ctx.as_ref(), &event).await
    };

    match result {
        Ok(response) => Ok(response),
        Err(err) => Ok(error_response(&err)?),
    }
}

fn is_login_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["login"] => true,
        [stage, "login"] => *stage != "proxy",
        _ => false,
    }
}

fn preflight() -> Result<Response<Body>, AppError> {
    Ok(with_cors(Response::builder().status(StatusCode::OK)).body(Body::Empty)?)
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse<'a> {
    token: &'a str,
    username: &'a str,
    expires_in: i64,
}

/// Only a JSON object is a login payload; arrays would otherwise bind
/// positionally to the struct fields.
fn parse_login(body: &[u8]) -> Result<LoginRequest, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(serde::de::Error::custom("login payload must be a JSON object"));
    }
    serde_json::from_value(value)
}

async fn login(ctx: &AppContext, event: &Request) -> Result<Response<Body>, AppError> {
    let payload = parse_login(body_or_empty_object(event.body())).map_err(|e| {
        warn!("failed to parse login payload: {e}");
        AppError::BadRequest("Invalid JSON in request body")
    })?;
    let username = payload.username.as_deref().unwrap_or_default().trim();
    let password = payload.password.as_deref().unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Username and password required"));
    }

    let (Some(store), Some(secret)) = (ctx.store(), ctx.jwt_secret()) else {
        error!("users table or JWT secret not configured");
        return Err(AppError::InternalConfig("Server configuration error"));
    };

    let Some(user) = store.get_user(username).await? else {
        info!(%username, reason = "unknown user", "login rejected");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash) {
        info!(%username, reason = "password mismatch", "login rejected");
        return Err(AppError::InvalidCredentials);
    }

    let issued = issue_token(
        secret,
        &user.username,
        ctx.settings().token_lifetime_hours,
        ctx.now(),
    )?;
    info!(%username, exp = issued.claims.exp, "login succeeded");

    json_response(
        StatusCode::OK,
        &LoginResponse {
            token: &issued.token,
            username: &user.username,
            expires_in: issued.expires_in,
        },
    )
}

async fn proxy(ctx: &AppContext, event: &Request) -> Result<Response<Body>, AppError> {
    let token = bearer_token(event.headers())?;
    let Some(secret) = ctx.jwt_secret() else {
        error!("JWT secret not configured");
        return Err(AppError::InternalConfig("Server configuration error"));
    };
    let claims = validate_token(secret, token, ctx.now())?;

    let path = event.uri().path();
    let route = ctx
        .settings()
        .routes
        .classify(path)
        .ok_or_else(|| AppError::NotFound(path.to_string()))?;
    let backend = route.backend().inspect_err(|_| {
        error!(route = route.name(), "backend URL or API key not configured");
    })?;

    let query = if route.forwards_query() {
        inbound_query(event)
    } else {
        Vec::new()
    };
    let url = target_url(
        backend.base_url,
        query.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )?;

    info!(
        username = %claims.username,
        route = route.name(),
        query_params = query.len(),
        "forwarding request"
    );

    let upstream = ctx
        .http()
        .post(url)
        .header("x-api-key", backend.api_key)
        .header(CONTENT_TYPE, JSON)
        .timeout(ctx.settings().upstream_timeout)
        .body(body_or_empty_object(event.body()).to_vec())
        .send()
        .await
        .map_err(|e| upstream_error(route.name(), e))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| AppError::Internal(format!("invalid upstream status: {e}")))?;
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| upstream_error(route.name(), e))?;

    info!(
        route = route.name(),
        http_status = status.as_u16(),
        bytes = bytes.len(),
        "relaying upstream response"
    );

    let body = match String::from_utf8(bytes.to_vec()) {
        Ok(text) => Body::Text(text),
        Err(e) => Body::Binary(e.into_bytes()),
    };
    // backends answer JSON; their own content-type is not relayed
    Ok(with_cors(Response::builder().status(status))
        .header(CONTENT_TYPE, JSON)
        .body(body)?)
}

/// Extract the raw token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .ok_or(AppError::Unauthorized("Missing or invalid Authorization header"))
}

/// Query parameters of the inbound request, from the gateway's parsed map
/// when present and from the raw URI otherwise.
fn inbound_query(event: &Request) -> Vec<(String, String)> {
    let parsed: Vec<(String, String)> = event
        .query_string_parameters_ref()
        .map(|params| {
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();
    if !parsed.is_empty() {
        return parsed;
    }
    event
        .uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Request body bytes; an absent body reads as `{}`.
fn body_or_empty_object(body: &Body) -> &[u8] {
    match body {
        Body::Empty => b"{}".as_slice(),
        Body::Text(text) => text.as_bytes(),
        Body::Binary(bytes) => bytes.as_slice(),
    }
}

fn upstream_error(route: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        error!(%route, "upstream request timed out");
        AppError::UpstreamTimeout(route.to_string())
    } else {
        // the target URL may carry forwarded query values
        let err = err.without_url();
        error!(%route, error = %err, "upstream request failed");
        AppError::UpstreamUnreachable {
            route: route.to_string(),
            reason: err.to_string(),
        }
    }
}

fn with_cors(builder: lambda_http::http::response::Builder) -> lambda_http::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", ALLOW_ORIGIN)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, AppError> {
    let body = serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("failed to encode response: {e}")))?;
    Ok(with_cors(Response::builder().status(status))
        .header(CONTENT_TYPE, JSON)
        .body(Body::Text(body))?)
}

fn error_response(err: &AppError) -> Result<Response<Body>, lambda_http::http::Error> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(
            http_status = status.as_u16(),
            category = err.category(),
            error = %err,
            "returning server error response"
        );
    } else {
        warn!(
            http_status = status.as_u16(),
            category = err.category(),
            "returning client error response"
        );
    }

    let body = serde_json::json!({ "error": err.user_message() }).to_string();
    with_cors(Response::builder().status(status))
        .header(CONTENT_TYPE, JSON)
        .body(Body::Text(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_path_detection() {
        assert!(is_login_path("/login"));
        assert!(is_login_path("/prod/login/"));
        assert!(!is_login_path("/proxy/text"));
        assert!(!is_login_path("/loginx"));
        assert!(!is_login_path("/proxy/login"));
        assert!(!is_login_path("/prod/proxy/login"));
    }

    #[test]
    fn login_payload_must_be_an_object() {
        assert!(parse_login(br#"["alice","pw1"]"#).is_err());
        assert!(parse_login(b"\"alice\"").is_err());
        let payload = parse_login(br#"{"username":"alice","password":"pw1"}"#).unwrap();
        assert_eq!(payload.username.as_deref(), Some("alice"));
    }

    #[test]
    fn bearer_prefix_is_case_sensitive() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", "bearer abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", "Token abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn empty_body_reads_as_empty_object() {
        assert_eq!(body_or_empty_object(&Body::Empty), b"{}");
        assert_eq!(body_or_empty_object(&Body::Text("{\"a\":1}".into())), b"{\"a\":1}");
    }

    #[test]
    fn error_response_carries_cors_and_message() {
        let response = error_response(&AppError::NotFound("/proxy/video".into())).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "Content-Type,Authorization,x-api-key"
        );
        assert_eq!(response.headers()["content-type"], "application/json");
        match response.body() {
            Body::Text(text) => assert_eq!(text, r#"{"error":"Unknown endpoint"}"#),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn preflight_is_empty_ok() {
        let response = preflight().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-methods"], "GET,POST,OPTIONS");
    }
}
