//! Middleware stack
//!
//! A linear chain in registration order. Each middleware either answers the
//! request or hands it to `next`; falling off the end yields 404.
//! Plugins append through the façade's `middlewares` handle, so the stack is
//! shared and appendable after the server is built.

use std::fmt;
use std::sync::{Arc, RwLock};

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

/// A stage in the middleware stack
pub trait Middleware: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Answer the request or pass it on
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// Remainder of the chain after the current middleware
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Run the next middleware, or produce 404 at the end of the chain
    pub fn run(self, req: Request) -> BoxFuture<'a, Response> {
        match self.middleware.split_first() {
            Some((first, rest)) => first.handle(req, Next { middleware: rest }),
            None => Box::pin(async { (StatusCode::NOT_FOUND, "Not Found").into_response() }),
        }
    }
}

/// Shared, appendable middleware chain
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    inner: Arc<RwLock<Vec<Arc<dyn Middleware>>>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware to the end of the chain
    pub fn use_middleware(&self, middleware: impl Middleware + 'static) {
        self.use_arc(Arc::new(middleware));
    }

    /// Append an already shared middleware
    pub fn use_arc(&self, middleware: Arc<dyn Middleware>) {
        match self.inner.write() {
            Ok(mut chain) => chain.push(middleware),
            Err(poisoned) => poisoned.into_inner().push(middleware),
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Middleware>> {
        match self.inner.read() {
            Ok(chain) => chain.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of middleware stages
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Middleware names in chain order
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|m| m.name().to_string()).collect()
    }

    /// Run a request through the chain
    ///
    /// The chain is snapshotted per request; middleware appended while a
    /// request is in flight applies from the next request on.
    pub async fn handle(&self, req: Request) -> Response {
        let chain = self.snapshot();
        Next { middleware: &chain }.run(req).await
    }

    /// Whether two handles share one chain
    pub fn ptr_eq(&self, other: &MiddlewareStack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("names", &self.names())
            .finish()
    }
}

/// Empty response with the given status
pub(crate) fn status_response(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap_or_else(|_| status.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    struct Answer(&'static str, &'static str);

    impl Middleware for Answer {
        fn name(&self) -> &str {
            self.0
        }

        fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                if req.uri().path() == self.1 {
                    (StatusCode::OK, self.0).into_response()
                } else {
                    next.run(req).await
                }
            })
        }
    }

    fn get(path: &str) -> Request {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_stack_is_404() {
        let stack = MiddlewareStack::new();
        let response = stack.handle(get("/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chain_order() {
        let stack = MiddlewareStack::new();
        stack.use_middleware(Answer("first", "/a"));
        stack.use_middleware(Answer("second", "/a"));
        stack.use_middleware(Answer("third", "/b"));

        assert_eq!(stack.names(), vec!["first", "second", "third"]);
        assert_eq!(body_text(stack.handle(get("/a")).await).await, "first");
        assert_eq!(body_text(stack.handle(get("/b")).await).await, "third");
    }

    #[tokio::test]
    async fn test_clones_share_chain() {
        let stack = MiddlewareStack::new();
        let handle = stack.clone();
        handle.use_middleware(Answer("plugin", "/p"));

        assert!(stack.ptr_eq(&handle));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.handle(get("/p")).await.status(), StatusCode::OK);
    }
}
