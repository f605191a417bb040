//! Async Unix socket transport adapter.
//!
//! Stands in for the pub/sub broker in deployments that do not embed the hub
//! directly: each inbound line is one JSON command, each response line is
//! the JSON array of events that command produced.

use crate::error::{AsrHubError, Result};
use crate::hub::AsrHub;
use crate::messages::{AsrCommand, AsrEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

/// Handler trait for processing inbound commands.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a command and return the events it produced.
    async fn handle(&self, command: AsrCommand) -> Vec<AsrEvent>;
}

/// Handler that drives an `AsrHub`.
///
/// Commands are serialized through a mutex; the finalize wait can block up
/// to the configured result timeout, so the hub runs on the blocking pool.
pub struct HubHandler {
    hub: Arc<std::sync::Mutex<AsrHub>>,
}

impl HubHandler {
    /// Wraps a hub for serving.
    pub fn new(hub: Arc<std::sync::Mutex<AsrHub>>) -> Self {
        Self { hub }
    }
}

#[async_trait::async_trait]
impl EventHandler for HubHandler {
    async fn handle(&self, command: AsrCommand) -> Vec<AsrEvent> {
        let hub = Arc::clone(&self.hub);
        tokio::task::spawn_blocking(move || {
            let mut hub = hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            hub.handle_command(command)
        })
        .await
        .unwrap_or_default()
    }
}

/// State for managing server shutdown.
#[derive(Debug, Clone)]
struct ServerState {
    shutdown: Arc<Mutex<bool>>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            shutdown: Arc::new(Mutex::new(false)),
        }
    }

    async fn is_shutdown(&self) -> bool {
        *self.shutdown.lock().await
    }

    async fn set_shutdown(&self) {
        *self.shutdown.lock().await = true;
    }
}

/// Unix socket server feeding commands to an `EventHandler`.
pub struct EventServer {
    socket_path: PathBuf,
    state: ServerState,
}

impl EventServer {
    /// Create a new server bound to the specified socket path.
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        Ok(Self {
            socket_path,
            state: ServerState::new(),
        })
    }

    /// Get the socket path this server is using.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the default socket path based on XDG_RUNTIME_DIR or fallback.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            PathBuf::from(xdg_runtime).join("asrhub.sock")
        } else {
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/asrhub-{}.sock", uid))
        }
    }

    /// Start the server and handle incoming connections.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: EventHandler + 'static,
    {
        // Clean up any existing socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| AsrHubError::Socket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| AsrHubError::Socket {
            message: format!("Failed to bind to socket: {}", e),
        })?;

        let handler = Arc::new(handler);

        loop {
            if self.state.is_shutdown().await {
                break;
            }

            // Accept with timeout to check for shutdown
            let accept_result =
                tokio::time::timeout(tokio::time::Duration::from_millis(100), listener.accept())
                    .await;

            match accept_result {
                Ok(Ok((stream, _))) => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            eprintln!("asrhub: error handling client: {}", e);
                        }
                    });
                }
                Ok(Err(e)) => {
                    return Err(AsrHubError::Connection {
                        message: format!("Failed to accept connection: {}", e),
                    });
                }
                Err(_) => {
                    // Timeout - check shutdown flag again
                    continue;
                }
            }
        }

        Ok(())
    }

    /// Stop the server and clean up the socket file.
    pub async fn stop(&self) -> Result<()> {
        self.state.set_shutdown().await;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| AsrHubError::Socket {
                message: format!("Failed to remove socket file: {}", e),
            })?;
        }

        Ok(())
    }
}

/// Handle a single client connection: a stream of command lines.
async fn handle_client<H>(stream: UnixStream, handler: Arc<H>) -> Result<()>
where
    H: EventHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| AsrHubError::Connection {
                message: format!("Failed to read from client: {}", e),
            })?;
        if read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let command = AsrCommand::from_json(trimmed).map_err(|e| AsrHubError::Protocol {
            message: format!("Failed to parse command: {}", e),
        })?;

        let events = handler.handle(command).await;

        let response = serde_json::to_string(&events).map_err(|e| AsrHubError::Protocol {
            message: format!("Failed to serialize events: {}", e),
        })?;

        writer
            .write_all(response.as_bytes())
            .await
            .map_err(|e| AsrHubError::Connection {
                message: format!("Failed to write to client: {}", e),
            })?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| AsrHubError::Connection {
                message: format!("Failed to write newline to client: {}", e),
            })?;
        writer.flush().await.map_err(|e| AsrHubError::Connection {
            message: format!("Failed to flush writer: {}", e),
        })?;
    }

    Ok(())
}
