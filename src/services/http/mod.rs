//! HTTP client for the library backend
//!
//! Two middleware stacks share one connection pool: a public one for
//! health, login and registration, and an authenticated one that carries
//! the bearer token and reacts to session invalidation.

pub mod middleware;

use reqwest::{Method, Request, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tower::{ServiceBuilder, ServiceExt};

use self::middleware::{
    BearerAuth, BearerAuthLayer, HttpTransport, JsonContent, JsonContentLayer, SessionGuard,
    SessionGuardLayer,
};
use crate::{
    config::HttpConfig,
    error::{AppError, AppResult},
    services::{discovery::ServerResolver, session::SessionStore},
};

type PublicStack = JsonContent<HttpTransport>;
type AuthenticatedStack = JsonContent<BearerAuth<SessionGuard<HttpTransport>>>;

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    resolver: ServerResolver,
    public: PublicStack,
    authenticated: AuthenticatedStack,
}

impl ApiClient {
    pub fn new(config: &HttpConfig, resolver: ServerResolver, session: SessionStore) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("campus-library-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, resolver, session))
    }

    pub fn with_client(client: reqwest::Client, resolver: ServerResolver, session: SessionStore) -> Self {
        let transport = HttpTransport::new(client.clone());

        let public = ServiceBuilder::new()
            .layer(JsonContentLayer)
            .service(transport.clone());

        let authenticated = ServiceBuilder::new()
            .layer(JsonContentLayer)
            .layer(BearerAuthLayer::new(session.clone()))
            .layer(SessionGuardLayer::new(session))
            .service(transport);

        Self {
            client,
            resolver,
            public,
            authenticated,
        }
    }

    /// Shared reqwest client (connection pool)
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET an authenticated resource
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let req = self.build::<()>(Method::GET, path, None).await?;
        let resp = self.authenticated.clone().oneshot(req).await?;
        decode(resp).await
    }

    /// POST to an authenticated resource
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> AppResult<T> {
        let req = self.build(Method::POST, path, Some(body)).await?;
        let resp = self.authenticated.clone().oneshot(req).await?;
        decode(resp).await
    }

    /// POST without credentials (login, registration)
    pub async fn post_public_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> AppResult<T> {
        let req = self.build(Method::POST, path, Some(body)).await?;
        let resp = self.public.clone().oneshot(req).await?;
        decode(resp).await
    }

    async fn build<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: Option<&B>) -> AppResult<Request> {
        let url = format!("{}{}", self.resolver.base_url().await, path);
        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
            .build()
            .map_err(|e| AppError::Configuration(format!("Invalid request to {}: {}", url, e)))
    }
}

/// Map non-2xx to `AppError::Server` and decode the JSON body otherwise
async fn decode<T: DeserializeOwned>(resp: Response) -> AppResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::from_status(status, &body));
    }

    resp.json::<T>()
        .await
        .map_err(|e| AppError::InvalidResponse(e.to_string()))
}
