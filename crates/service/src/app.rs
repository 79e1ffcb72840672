//! Application wiring: owns the shared store client and the order service.

use std::future::Future;

use domain::OrderService;
use kv_store::{InMemoryKvStore, KvStore, KvStoreError, RedisKvStore};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Result, ServiceError};

/// The running application.
///
/// Holds one store client shared by every clone. Cancelling the app (through
/// [`App::shutdown`]) cancels every token handed out by
/// [`App::request_token`], so in-flight order operations stop with a
/// cancelled error.
#[derive(Debug, Clone)]
pub struct App<S> {
    config: Config,
    service: OrderService<S>,
    shutdown: CancellationToken,
}

impl App<RedisKvStore> {
    /// Connects to the store at `config.redis_url` and checks it answers a
    /// PING.
    ///
    /// # Errors
    ///
    /// `Connect` if the URL is malformed, the server is unreachable, or the
    /// PING fails.
    pub async fn connect(config: Config) -> Result<Self> {
        let connect_error = |source: KvStoreError| ServiceError::Connect {
            url: config.redis_url.clone(),
            source,
        };

        let store = RedisKvStore::connect(&config.redis_url)
            .await
            .map_err(connect_error)?;
        store.ping().await.map_err(connect_error)?;

        tracing::info!("connected to store");
        Ok(Self::with_store(config, store))
    }

    /// Connects, runs `f` with the app, then shuts down whether `f`
    /// succeeded or not.
    pub async fn scoped<F, Fut, T>(config: Config, f: F) -> Result<T>
    where
        F: FnOnce(App<RedisKvStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let app = Self::connect(config).await?;
        let result = f(app.clone()).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "scoped run failed");
        }
        app.shutdown();
        result
    }
}

impl App<InMemoryKvStore> {
    /// Builds an app over a fresh in-process store.
    pub fn in_memory(config: Config) -> Self {
        Self::with_store(config, InMemoryKvStore::new())
    }
}

impl<S: KvStore> App<S> {
    /// Builds an app over an existing store client.
    pub fn with_store(config: Config, store: S) -> Self {
        let service = OrderService::new(store).with_page_size(config.page_size);
        Self {
            config,
            service,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The order service.
    pub fn service(&self) -> &OrderService<S> {
        &self.service
    }

    /// A token for one request. It fires when the app shuts down, or earlier
    /// if the caller cancels it.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called on any
    /// clone.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancels outstanding requests and releases this handle on the store
    /// client. The connection closes once the last clone is gone.
    pub fn shutdown(self) {
        self.shutdown.cancel();
        tracing::info!("app shut down");
    }
}
