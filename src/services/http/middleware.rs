//! Request pipeline layers
//!
//! Each concern is a separate `tower` layer so it can be stacked and tested
//! on its own:
//! - [`JsonContentLayer`] marks requests as JSON.
//! - [`BearerAuthLayer`] attaches the session token.
//! - [`SessionGuardLayer`] turns 401 into a cleared session plus
//!   `SessionExpired`, and 403 into `AccessDenied`.

use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::{
    error::{extract_message, AppError, AppResult},
    services::session::SessionStore,
};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Bottom of every stack: hands the request to reqwest
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<Request> for HttpTransport {
    type Response = Response;
    type Error = AppError;
    type Future = BoxFuture<AppResult<Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let method = req.method().clone();
            let url = req.url().clone();
            let resp = client.execute(req).await.map_err(|e| {
                tracing::debug!("{} {} failed: {}", method, url.path(), e);
                AppError::Network(e.to_string())
            })?;
            tracing::debug!("{} {} -> {}", method, url.path(), resp.status());
            Ok(resp)
        })
    }
}

#[derive(Clone, Copy, Default)]
pub struct JsonContentLayer;

impl<S> Layer<S> for JsonContentLayer {
    type Service = JsonContent<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JsonContent { inner }
    }
}

#[derive(Clone)]
pub struct JsonContent<S> {
    inner: S,
}

impl<S> Service<Request> for JsonContent<S>
where
    S: Service<Request, Response = Response, Error = AppError>,
{
    type Response = Response;
    type Error = AppError;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let json = HeaderValue::from_static("application/json");
        req.headers_mut().insert(CONTENT_TYPE, json.clone());
        req.headers_mut().entry(ACCEPT).or_insert(json);
        self.inner.call(req)
    }
}

#[derive(Clone)]
pub struct BearerAuthLayer {
    session: SessionStore,
}

impl BearerAuthLayer {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuth {
            inner,
            session: self.session.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BearerAuth<S> {
    inner: S,
    session: SessionStore,
}

impl<S> Service<Request> for BearerAuth<S>
where
    S: Service<Request, Response = Response, Error = AppError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = AppError;
    type Future = BoxFuture<AppResult<Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // The ready service goes into the future, a fresh clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let session = self.session.clone();

        Box::pin(async move {
            if let Some(token) = session.token_or_reload().await {
                let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                    AppError::Configuration("Session token is not a valid header value".to_string())
                })?;
                req.headers_mut().insert(AUTHORIZATION, value);
            }
            inner.call(req).await
        })
    }
}

#[derive(Clone)]
pub struct SessionGuardLayer {
    session: SessionStore,
}

impl SessionGuardLayer {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

impl<S> Layer<S> for SessionGuardLayer {
    type Service = SessionGuard<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionGuard {
            inner,
            session: self.session.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SessionGuard<S> {
    inner: S,
    session: SessionStore,
}

impl<S> Service<Request> for SessionGuard<S>
where
    S: Service<Request, Response = Response, Error = AppError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = AppError;
    type Future = BoxFuture<AppResult<Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let session = self.session.clone();

        Box::pin(async move {
            let path = req.url().path().to_string();
            let resp = inner.call(req).await?;

            match resp.status() {
                StatusCode::UNAUTHORIZED => {
                    // The caller only sees the error once the session is gone
                    match session.clear().await {
                        Ok(true) => tracing::warn!("Session rejected by server on {}, logged out", path),
                        Ok(false) => tracing::debug!("Unauthenticated request to {} rejected", path),
                        Err(e) => tracing::warn!("Session rejected on {} but storage clear failed: {}", path, e),
                    }
                    Err(AppError::SessionExpired)
                }
                StatusCode::FORBIDDEN => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::debug!("Access denied on {}", path);
                    Err(AppError::AccessDenied(extract_message(status, &body)))
                }
                _ => Ok(resp),
            }
        })
    }
}
