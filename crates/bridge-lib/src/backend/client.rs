//! gRPC client for the flow scheduler backend
//!
//! This module provides the production backend client:
//! - Lazy channel establishment with keepalive
//! - Optional mTLS with certificate rotation support
//! - Reconnection state with exponential backoff
//! - Reply-code mapping onto the error taxonomy

use super::proto::FlowSchedulerClient;
use super::{check_reply, to_task_description, to_task_ref, BackendError, SchedulerBackend};
use crate::models::{Task, TaskId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};
use tracing::{debug, info, warn};

/// Certificate material for mutual TLS
#[derive(Debug, Clone)]
pub struct TlsPaths {
    /// Path to CA certificate for server verification
    pub ca_cert_path: PathBuf,
    /// Path to client certificate
    pub client_cert_path: PathBuf,
    /// Path to client private key
    pub client_key_path: PathBuf,
}

/// Configuration for the backend client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend endpoint URL (e.g., "http://flow-scheduler:9090")
    pub endpoint: String,
    /// Mutual TLS material; plaintext when absent
    pub tls: Option<TlsPaths>,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
    /// Keepalive interval
    pub keepalive_interval: Duration,
    /// Keepalive timeout
    pub keepalive_timeout: Duration,
    /// Initial backoff for reconnection
    pub initial_backoff: Duration,
    /// Maximum backoff for reconnection
    pub max_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://flow-scheduler:9090".to_string(),
            tls: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Connection state for tracking reconnection attempts
#[derive(Debug, Clone)]
struct ConnectionState {
    connected: bool,
    last_error: Option<String>,
    reconnect_attempts: u32,
    current_backoff: Duration,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            connected: false,
            last_error: None,
            reconnect_attempts: 0,
            current_backoff: Duration::from_secs(1),
        }
    }
}

/// TLS configuration holder that can be refreshed
struct TlsState {
    config: ClientTlsConfig,
    cert_modified_time: std::time::SystemTime,
}

/// Production client for the flow scheduler's task lifecycle API
pub struct BackendClient {
    config: ClientConfig,
    channel: Arc<RwLock<Option<Channel>>>,
    connection_state: Arc<RwLock<ConnectionState>>,
    tls_state: Arc<RwLock<Option<TlsState>>>,
}

impl BackendClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            channel: Arc::new(RwLock::new(None)),
            connection_state: Arc::new(RwLock::new(ConnectionState::default())),
            tls_state: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a new client for a plaintext endpoint with default settings
    pub fn with_defaults(endpoint: impl Into<String>) -> Self {
        let mut config = ClientConfig::default();
        config.endpoint = endpoint.into();
        Self::new(config)
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Load TLS configuration from certificate files
    async fn load_tls_config(&self, tls: &TlsPaths) -> Result<ClientTlsConfig> {
        let ca_cert = tokio::fs::read(&tls.ca_cert_path)
            .await
            .with_context(|| format!("Failed to read CA certificate from {:?}", tls.ca_cert_path))?;
        let ca = Certificate::from_pem(ca_cert);

        let client_cert = tokio::fs::read(&tls.client_cert_path).await.with_context(|| {
            format!(
                "Failed to read client certificate from {:?}",
                tls.client_cert_path
            )
        })?;
        let client_key = tokio::fs::read(&tls.client_key_path)
            .await
            .with_context(|| format!("Failed to read client key from {:?}", tls.client_key_path))?;
        let identity = Identity::from_pem(client_cert, client_key);

        let tls_config = ClientTlsConfig::new()
            .ca_certificate(ca)
            .identity(identity)
            .domain_name(self.extract_domain()?);

        Ok(tls_config)
    }

    /// Extract domain name from endpoint URL
    fn extract_domain(&self) -> Result<String> {
        let url = url::Url::parse(&self.config.endpoint)
            .with_context(|| format!("Invalid endpoint URL: {}", self.config.endpoint))?;
        url.host_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("No host in endpoint URL"))
    }

    /// Check if certificates have been rotated
    async fn check_cert_rotation(&self, tls: &TlsPaths) -> Result<bool> {
        let metadata = tokio::fs::metadata(&tls.client_cert_path).await?;
        let modified = metadata.modified()?;

        let tls_state = self.tls_state.read().await;
        if let Some(state) = tls_state.as_ref() {
            Ok(modified > state.cert_modified_time)
        } else {
            Ok(true) // No previous state, need to load
        }
    }

    /// Refresh TLS configuration if certificates have changed
    async fn refresh_tls_if_needed(&self) -> Result<()> {
        let Some(tls) = self.config.tls.as_ref() else {
            return Ok(());
        };
        if !self.check_cert_rotation(tls).await? {
            return Ok(());
        }

        info!("Certificate rotation detected, refreshing TLS configuration");

        let new_config = self.load_tls_config(tls).await?;
        let modified_time = tokio::fs::metadata(&tls.client_cert_path)
            .await?
            .modified()?;

        let mut tls_state = self.tls_state.write().await;
        *tls_state = Some(TlsState {
            config: new_config,
            cert_modified_time: modified_time,
        });

        // Force reconnection with new certificates
        let mut channel = self.channel.write().await;
        *channel = None;

        Ok(())
    }

    /// Create a new gRPC channel
    async fn create_channel(&self) -> Result<Channel> {
        self.refresh_tls_if_needed().await?;

        let mut endpoint = Channel::from_shared(self.config.endpoint.clone())?
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .http2_keep_alive_interval(self.config.keepalive_interval)
            .keep_alive_timeout(self.config.keepalive_timeout)
            .keep_alive_while_idle(true);

        if self.config.tls.is_some() {
            let tls_state = self.tls_state.read().await;
            let tls_config = tls_state
                .as_ref()
                .map(|s| s.config.clone())
                .ok_or_else(|| anyhow::anyhow!("TLS configuration not loaded"))?;
            endpoint = endpoint.tls_config(tls_config)?;
        }

        let channel = endpoint
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", self.config.endpoint))?;

        Ok(channel)
    }

    /// Get or create a connected channel
    async fn get_channel(&self) -> Result<Channel> {
        // Try to use existing channel
        {
            let channel = self.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                return Ok(ch.clone());
            }
        }

        // Create new channel
        let new_channel = self.create_channel().await?;

        // Store and return
        let mut channel = self.channel.write().await;
        *channel = Some(new_channel.clone());

        // Update connection state
        let mut state = self.connection_state.write().await;
        state.connected = true;
        state.reconnect_attempts = 0;
        state.current_backoff = self.config.initial_backoff;
        state.last_error = None;

        info!(
            endpoint = %self.config.endpoint,
            "Connected to flow scheduler backend"
        );

        Ok(new_channel)
    }

    /// Handle connection failure with exponential backoff
    async fn handle_connection_failure(&self, error: &str) {
        let mut state = self.connection_state.write().await;
        state.connected = false;
        state.last_error = Some(error.to_string());
        state.reconnect_attempts += 1;

        let next_backoff = std::cmp::min(state.current_backoff * 2, self.config.max_backoff);
        state.current_backoff = next_backoff;

        // Clear the channel
        let mut channel = self.channel.write().await;
        *channel = None;

        warn!(
            error = %error,
            attempts = state.reconnect_attempts,
            next_backoff_secs = next_backoff.as_secs(),
            "Connection to flow scheduler backend failed"
        );
    }

    /// Get current backoff duration for reconnection
    pub async fn get_reconnect_backoff(&self) -> Duration {
        let state = self.connection_state.read().await;
        state.current_backoff
    }

    /// Check if client is currently connected
    pub async fn is_connected(&self) -> bool {
        let state = self.connection_state.read().await;
        state.connected
    }

    /// Get connection statistics
    pub async fn connection_stats(&self) -> (bool, u32, Option<String>) {
        let state = self.connection_state.read().await;
        (
            state.connected,
            state.reconnect_attempts,
            state.last_error.clone(),
        )
    }

    /// Disconnect from the backend
    pub async fn disconnect(&self) {
        let mut channel = self.channel.write().await;
        *channel = None;

        let mut state = self.connection_state.write().await;
        state.connected = false;

        info!("Disconnected from flow scheduler backend");
    }

    /// Resolve a ready RPC client, recording connection failures.
    async fn rpc_client(&self) -> Result<FlowSchedulerClient<Channel>, BackendError> {
        match self.get_channel().await {
            Ok(channel) => Ok(FlowSchedulerClient::new(channel)),
            Err(e) => {
                self.handle_connection_failure(&e.to_string()).await;
                Err(BackendError::Transport(e.to_string()))
            }
        }
    }

    async fn transport_failure(&self, status: tonic::Status) -> BackendError {
        self.handle_connection_failure(&status.to_string()).await;
        BackendError::Transport(status.to_string())
    }
}

#[async_trait]
impl SchedulerBackend for BackendClient {
    async fn submit(&self, task: &Task) -> Result<(), BackendError> {
        let mut client = self.rpc_client().await?;
        let request = tonic::Request::new(to_task_description(task));
        match client.submit_task(request).await {
            Ok(response) => {
                debug!(key = %task.id, "Task submitted");
                check_reply(response.into_inner())
            }
            Err(status) => Err(self.transport_failure(status).await),
        }
    }

    async fn update(&self, task: &Task) -> Result<(), BackendError> {
        let mut client = self.rpc_client().await?;
        let request = tonic::Request::new(to_task_description(task));
        match client.update_task(request).await {
            Ok(response) => {
                debug!(key = %task.id, "Task updated");
                check_reply(response.into_inner())
            }
            Err(status) => Err(self.transport_failure(status).await),
        }
    }

    async fn remove(&self, id: &TaskId) -> Result<(), BackendError> {
        let mut client = self.rpc_client().await?;
        let request = tonic::Request::new(to_task_ref(id));
        match client.remove_task(request).await {
            Ok(response) => {
                debug!(key = %id, "Task removed");
                check_reply(response.into_inner())
            }
            Err(status) => Err(self.transport_failure(status).await),
        }
    }

    async fn complete(&self, id: &TaskId) -> Result<(), BackendError> {
        let mut client = self.rpc_client().await?;
        let request = tonic::Request::new(to_task_ref(id));
        match client.complete_task(request).await {
            Ok(response) => {
                debug!(key = %id, "Task completed");
                check_reply(response.into_inner())
            }
            Err(status) => Err(self.transport_failure(status).await),
        }
    }

    async fn fail(&self, id: &TaskId) -> Result<(), BackendError> {
        let mut client = self.rpc_client().await?;
        let request = tonic::Request::new(to_task_ref(id));
        match client.fail_task(request).await {
            Ok(response) => {
                debug!(key = %id, "Task failed");
                check_reply(response.into_inner())
            }
            Err(status) => Err(self.transport_failure(status).await),
        }
    }
}

/// Builder for backend client configuration
pub struct BackendClientBuilder {
    config: ClientConfig,
}

impl BackendClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn tls(mut self, tls: TlsPaths) -> Self {
        self.config.tls = Some(tls);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    pub fn keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.config.keepalive_timeout = timeout;
        self
    }

    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.initial_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.config.max_backoff = backoff;
        self
    }

    pub fn build(self) -> BackendClient {
        BackendClient::new(self.config)
    }
}

impl Default for BackendClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
