//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyClient`] holds the connection configuration for a single ComfyUI
//! server. Call [`ComfyClient::connect`] to establish a live
//! [`ComfySession`] over WebSocket.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Configuration handle for one ComfyUI server.
#[derive(Debug, Clone)]
pub struct ComfyClient {
    ws_url: String,
    api_url: String,
}

/// A live WebSocket connection to a ComfyUI server.
///
/// The `client_id` sent during the handshake is how ComfyUI addresses
/// execution messages back to this session; reuse it across reconnects so
/// the server keeps routing events for in-flight prompts to us.
pub struct ComfySession {
    /// Client ID sent as the `clientId` query parameter.
    pub client_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

/// Errors that can occur when establishing the WebSocket connection.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ComfyClient {
    /// Create a new client.
    ///
    /// * `ws_url`  - WebSocket base URL, e.g. `ws://host:8188`.
    /// * `api_url` - HTTP base URL, e.g. `http://host:8188`.
    pub fn new(ws_url: String, api_url: String) -> Self {
        Self { ws_url, api_url }
    }

    /// WebSocket base URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// HTTP API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Connect with a freshly generated client ID.
    pub async fn connect(&self) -> Result<ComfySession, ClientError> {
        self.connect_with_client_id(&uuid::Uuid::new_v4().to_string())
            .await
    }

    /// Connect with a specific client ID.
    ///
    /// Used when reconnecting mid-monitor: keeping the original ID means
    /// ComfyUI continues addressing the in-flight prompt's messages to
    /// this session.
    pub async fn connect_with_client_id(
        &self,
        client_id: &str,
    ) -> Result<ComfySession, ClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %client_id,
            "Connected to ComfyUI at {}",
            self.ws_url,
        );

        Ok(ComfySession {
            client_id: client_id.to_string(),
            ws_stream,
        })
    }
}
