//! Static mapping from inbound proxy paths to backend APIs.

use url::Url;

use crate::error::AppError;

/// One proxied backend.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    keyword: String,
    base_url: Option<String>,
    api_key: Option<String>,
    forward_query: bool,
}

/// Resolved target of a route; only exists when both halves are configured.
#[derive(Debug, Clone, Copy)]
pub struct Backend<'a> {
    pub base_url: &'a str,
    pub api_key: &'a str,
}

impl Route {
    /// A route selected when a path segment equals `keyword`.
    pub fn new(name: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyword: keyword.into(),
            base_url: None,
            api_key: None,
            forward_query: false,
        }
    }

    pub fn with_backend(mut self, base_url: Option<String>, api_key: Option<String>) -> Self {
        self.base_url = base_url.filter(|v| !v.trim().is_empty());
        self.api_key = api_key.filter(|v| !v.trim().is_empty());
        self
    }

    /// Append the inbound query string to the backend URL.
    pub fn forwarding_query(mut self, forward: bool) -> Self {
        self.forward_query = forward;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn forwards_query(&self) -> bool {
        self.forward_query
    }

    fn matches(&self, path: &str) -> bool {
        path.split('/').any(|segment| segment == self.keyword)
    }

    /// The configured backend, or a configuration error if either the URL or
    /// the API key is missing.
    pub fn backend(&self) -> Result<Backend<'_>, AppError> {
        match (self.base_url.as_deref(), self.api_key.as_deref()) {
            (Some(base_url), Some(api_key)) => Ok(Backend { base_url, api_key }),
            _ => Err(AppError::InternalConfig("Backend configuration error")),
        }
    }
}

/// Ordered route list; the first route whose keyword appears as a path
/// segment wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// The image and text backends, configured from `IMAGE_API_URL`,
    /// `IMAGE_API_KEY`, `TEXT_API_URL` and `TEXT_API_KEY`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new()
            .with_route(
                Route::new("image", "image")
                    .with_backend(lookup("IMAGE_API_URL"), lookup("IMAGE_API_KEY")),
            )
            .with_route(
                Route::new("text", "text")
                    .with_backend(lookup("TEXT_API_URL"), lookup("TEXT_API_KEY"))
                    .forwarding_query(true),
            )
    }

    pub fn classify(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Build the outbound URL: `base_url` with `query` appended to whatever query
/// string it already carries.
pub fn target_url<'a, I>(base_url: &str, query: I) -> Result<Url, AppError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut url = Url::parse(base_url)
        .map_err(|_| AppError::InternalConfig("Backend configuration error"))?;
    let mut pairs = query.into_iter().peekable();
    if pairs.peek().is_some() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}
