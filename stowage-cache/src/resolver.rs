//! Cache key to origin request resolution.
//!
//! A [`Resolver`] turns a cache key plus a template request into a request
//! that can be replayed against the origin. The template is never mutated:
//! every resolution starts from a structurally independent copy.

use std::collections::HashMap;

use http::uri::{PathAndQuery, Uri};
use http::Request;
use stowage_core::{ResolveError, StowageConfig, StowageResult};

/// Maps cache keys to replayable origin requests.
pub trait Resolver: Send + Sync {
    /// Deep copy of `template`: method, target URI, version and headers.
    fn resolve_request(&self, template: &Request<()>) -> StowageResult<Request<()>> {
        Ok(clone_request(template))
    }

    /// Copy `template` and point it at the origin path for `key`.
    fn resolve(&self, key: &str, template: &Request<()>) -> StowageResult<Request<()>>;
}

/// Independent copy of a body-less request.
///
/// Extensions are not carried over; they hold per-request state that a
/// replayed request must not share.
pub fn clone_request(template: &Request<()>) -> Request<()> {
    let mut request = Request::new(());
    *request.method_mut() = template.method().clone();
    *request.uri_mut() = template.uri().clone();
    *request.version_mut() = template.version();
    *request.headers_mut() = template.headers().clone();
    request
}

/// Replace the path of `uri`, keeping scheme, authority and query.
pub fn with_path(uri: &Uri, path: &str) -> Result<Uri, String> {
    let target = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(target.as_str()).map_err(|e| e.to_string())?);
    Uri::from_parts(parts).map_err(|e| e.to_string())
}

/// Table-driven resolver mapping exact keys to origin paths.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    routes: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new<I, K, P>(routes: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<String>,
    {
        Self {
            routes: routes
                .into_iter()
                .map(|(k, p)| (k.into(), p.into()))
                .collect(),
        }
    }

    pub fn from_config(config: &StowageConfig) -> Self {
        Self::new(config.routes.iter().cloned())
    }

    pub fn with_route(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.routes.insert(key.into(), path.into());
        self
    }

    pub fn path_for(&self, key: &str) -> Option<&str> {
        self.routes.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, key: &str, template: &Request<()>) -> StowageResult<Request<()>> {
        let path = self.path_for(key).ok_or_else(|| ResolveError::UnknownKey {
            key: key.to_string(),
        })?;

        let mut request = self.resolve_request(template)?;
        let uri = with_path(request.uri(), path).map_err(|reason| ResolveError::InvalidTarget {
            key: key.to_string(),
            reason,
        })?;
        *request.uri_mut() = uri;
        Ok(request)
    }
}
