//! Request routing.
//!
//! Maps (method, path) to a handler by scanning regular expressions. All
//! clones of a [`Router`] share one table set behind a single lock, so routes
//! registered at runtime are seen by every session created from it.
//!
//! Lookup order:
//! 1. patterns registered for the request's method, in registration order
//! 2. patterns registered with [`Router::all`], in registration order
//! 3. the fallback handler (404 unless replaced)

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tokio::sync::RwLock;

use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::session::Context;

/// A request handler. It runs on the session's task and must not block.
pub type Handler = Arc<dyn Fn(Request, Context) + Send + Sync>;

struct Route {
    pattern: Regex,
    handler: Handler,
}

struct Tables {
    methods: HashMap<Method, Vec<Route>>,
    any: Vec<Route>,
    fallback: Handler,
}

/// Shared resource tables.
#[derive(Clone)]
pub struct Router {
    tables: Arc<RwLock<Tables>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables {
                methods: HashMap::new(),
                any: Vec::new(),
                fallback: Arc::new(not_found),
            })),
        }
    }

    /// Registers `handler` for `method` requests whose path matches `pattern`.
    pub async fn route<F>(&self, method: Method, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        let route = Route {
            pattern: Regex::new(pattern)?,
            handler: Arc::new(handler),
        };
        self.tables
            .write()
            .await
            .methods
            .entry(method)
            .or_default()
            .push(route);
        tracing::debug!(%method, pattern, "route registered");
        Ok(())
    }

    /// Registers `handler` for every method.
    pub async fn all<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        let route = Route {
            pattern: Regex::new(pattern)?,
            handler: Arc::new(handler),
        };
        self.tables.write().await.any.push(route);
        tracing::debug!(pattern, "route registered for all methods");
        Ok(())
    }

    pub async fn get<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, handler).await
    }

    pub async fn post<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, handler).await
    }

    pub async fn put<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, handler).await
    }

    pub async fn delete<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, handler).await
    }

    pub async fn head<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.route(Method::HEAD, pattern, handler).await
    }

    pub async fn options<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.route(Method::OPTIONS, pattern, handler).await
    }

    pub async fn patch<F>(&self, pattern: &str, handler: F) -> Result<(), regex::Error>
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.route(Method::PATCH, pattern, handler).await
    }

    /// Replaces the handler used when nothing matches.
    pub async fn fallback<F>(&self, handler: F)
    where
        F: Fn(Request, Context) + Send + Sync + 'static,
    {
        self.tables.write().await.fallback = Arc::new(handler);
    }

    /// Finds the handler for a request. Always returns one.
    ///
    /// The lock is held only for the scan; the handler runs after it is released.
    pub async fn resolve(&self, method: &Method, path: &str) -> Handler {
        let tables = self.tables.read().await;

        let matched = tables
            .methods
            .get(method)
            .into_iter()
            .flatten()
            .chain(tables.any.iter())
            .find(|route| route.pattern.is_match(path));

        match matched {
            Some(route) => Arc::clone(&route.handler),
            None => {
                tracing::trace!(%method, path, "no route matched");
                Arc::clone(&tables.fallback)
            }
        }
    }

    /// Number of registered routes, fallback excluded.
    pub async fn len(&self) -> usize {
        let tables = self.tables.read().await;
        tables.methods.values().map(Vec::len).sum::<usize>() + tables.any.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn not_found(request: Request, context: Context) {
    let response = Response::not_found().with_keep_alive(request.keep_alive());
    if let Err(e) = context.send(response) {
        tracing::debug!(error = %e, "could not send 404");
    }
}
