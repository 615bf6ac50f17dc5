//! Home Assistant WebSocket API client.

use super::protocol::{AuthMessage, Command, ErrorInfo, EventPayload, Incoming, Request};
use super::types::{EntityState, ServiceCall, ServiceCatalog, StateChange};
use super::{EntityStore, ServiceCaller, ServiceRegistry};
use crate::config::HassConfig;
use crate::error::{NotifierError, Result};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

const STATE_CHANGED: &str = "state_changed";

type Reply = std::result::Result<Option<Value>, ErrorInfo>;

struct StateSubscription {
    entity_id: String,
    // Unbounded so the reader never blocks on a subscriber.
    tx: mpsc::UnboundedSender<StateChange>,
}

/// Routes incoming messages to waiting requests and subscribers.
#[derive(Default)]
struct Router {
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    subscriptions: Mutex<HashMap<u64, StateSubscription>>,
    closed: AtomicBool,
}

impl Router {
    fn route(&self, text: &str) {
        let message = match serde_json::from_str::<Incoming>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("[HASS] Failed to parse message: {}", e);
                return;
            }
        };

        match message {
            Incoming::Result {
                id,
                success,
                result,
                error,
            } => {
                let reply = if success {
                    Ok(result)
                } else {
                    Err(error.unwrap_or(ErrorInfo {
                        code: "unknown_error".to_string(),
                        message: "command failed without details".to_string(),
                    }))
                };
                match self.pending.lock().remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => debug!("[HASS] Result for unknown request {}", id),
                }
            }
            Incoming::Event { id, event } => self.route_event(id, event),
            Incoming::Pong { id } => debug!("[HASS] Pong {}", id),
            other => debug!("[HASS] Ignoring message: {:?}", other),
        }
    }

    fn route_event(&self, id: u64, event: EventPayload) {
        if event.event_type != STATE_CHANGED {
            return;
        }

        let target = {
            let subscriptions = self.subscriptions.lock();
            subscriptions
                .get(&id)
                .map(|sub| (sub.entity_id.clone(), sub.tx.clone()))
        };
        let Some((entity_id, tx)) = target else {
            return;
        };

        // Cheap pre-check before deserializing full states for every entity.
        if event.data.get("entity_id").and_then(Value::as_str) != Some(entity_id.as_str()) {
            return;
        }

        let change = match serde_json::from_value::<StateChange>(event.data) {
            Ok(change) => change,
            Err(e) => {
                warn!("[HASS] Invalid state_changed event for {}: {}", entity_id, e);
                return;
            }
        };

        if tx.send(change).is_err() {
            debug!("[HASS] Subscriber for {} went away", entity_id);
            self.subscriptions.lock().remove(&id);
        }
    }

    /// Fail all waiting requests and end all subscription streams.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().clear();
        self.subscriptions.lock().clear();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Forward queued frames to the socket until the queue ends or a send fails,
/// then close `router` so waiting requests fail instead of hanging.
async fn write_loop<W>(
    mut write: W,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    router: Arc<Router>,
) where
    W: Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    while let Some(msg) = outgoing.recv().await {
        if let Err(e) = write.send(msg).await {
            error!("[HASS] Failed to send message: {}", e);
            break;
        }
    }
    router.close();
    let _ = write.close().await;
}

/// Client for the Home Assistant WebSocket API.
///
/// Cloning is cheap; all clones share one connection.
#[derive(Clone)]
pub struct HassClient {
    outgoing: mpsc::UnboundedSender<Message>,
    router: Arc<Router>,
    next_id: Arc<AtomicU64>,
    ha_version: Option<String>,
}

impl HassClient {
    /// Connect and authenticate, then spawn the reader and writer tasks.
    pub async fn connect(config: &HassConfig) -> Result<Self> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(NotifierError::MissingOption("HASS_TOKEN"))?;

        info!("[HASS] Connecting to {}", config.url);
        let (ws_stream, _) = connect_async(config.url.as_str())
            .await
            .map_err(|e| NotifierError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        match next_message(&mut read).await? {
            Incoming::AuthRequired { ha_version } => {
                debug!("[HASS] Auth required by Home Assistant {:?}", ha_version);
            }
            other => {
                return Err(NotifierError::Protocol(format!(
                    "expected auth_required, got {:?}",
                    other
                )));
            }
        }

        let auth = serde_json::to_string(&AuthMessage::new(token))?;
        write.send(Message::Text(auth.into())).await?;

        let ha_version = match next_message(&mut read).await? {
            Incoming::AuthOk { ha_version } => ha_version,
            Incoming::AuthInvalid { message } => {
                return Err(NotifierError::AuthenticationFailed(
                    message.unwrap_or_else(|| "invalid access token".to_string()),
                ));
            }
            other => {
                return Err(NotifierError::Protocol(format!(
                    "expected auth_ok, got {:?}",
                    other
                )));
            }
        };

        info!("[HASS] Authenticated");

        let router = Arc::new(Router::default());
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(write_loop(write, outgoing_rx, router.clone()));

        let reader_router = router.clone();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let text_str: &str = &text;
                        reader_router.route(text_str);
                    }
                    Ok(Message::Close(frame)) => {
                        info!("[HASS] Server closed connection: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("[HASS] WebSocket error: {}", e);
                        break;
                    }
                }
            }
            reader_router.close();
            warn!("[HASS] Connection lost");
        });

        Ok(Self {
            outgoing,
            router,
            next_id: Arc::new(AtomicU64::new(1)),
            ha_version,
        })
    }

    /// Version reported by Home Assistant during authentication.
    pub fn ha_version(&self) -> Option<&str> {
        self.ha_version.as_deref()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn request(&self, command: Command<'_>) -> Result<Option<Value>> {
        self.request_with_id(self.next_id(), command).await
    }

    async fn request_with_id(&self, id: u64, command: Command<'_>) -> Result<Option<Value>> {
        let text = serde_json::to_string(&Request { id, command })?;

        let (tx, rx) = oneshot::channel();
        self.router.pending.lock().insert(id, tx);
        if self.router.is_closed() {
            self.router.pending.lock().remove(&id);
            return Err(NotifierError::ConnectionClosed);
        }

        debug!("[HASS] Sending: {}", text);
        if self.outgoing.send(Message::Text(text.into())).is_err() {
            self.router.pending.lock().remove(&id);
            return Err(NotifierError::ConnectionClosed);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(NotifierError::CommandFailed {
                code: error.code,
                message: error.message,
            }),
            Err(_) => Err(NotifierError::ConnectionClosed),
        }
    }
}

/// Read the next text frame and parse it. Used during the auth phase, before
/// the reader task takes over the stream.
async fn next_message<S>(read: &mut S) -> Result<Incoming>
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => {
                let text_str: &str = &text;
                return Ok(serde_json::from_str(text_str)?);
            }
            Message::Close(_) => return Err(NotifierError::ConnectionClosed),
            _ => {}
        }
    }
    Err(NotifierError::ConnectionClosed)
}

#[async_trait]
impl EntityStore for HassClient {
    async fn get_state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        let result = self.request(Command::GetStates).await?;
        let states: Vec<EntityState> = serde_json::from_value(result.unwrap_or(Value::Null))?;
        Ok(states.into_iter().find(|state| state.entity_id == entity_id))
    }

    async fn subscribe_state_changes(
        &self,
        entity_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<StateChange>> {
        let id = self.next_id();
        let (tx, rx) = mpsc::unbounded_channel();

        // Register before sending so no event can slip past.
        self.router.subscriptions.lock().insert(
            id,
            StateSubscription {
                entity_id: entity_id.to_string(),
                tx,
            },
        );

        let command = Command::SubscribeEvents {
            event_type: STATE_CHANGED,
        };
        if let Err(e) = self.request_with_id(id, command).await {
            self.router.subscriptions.lock().remove(&id);
            return Err(e);
        }

        info!("[HASS] Subscribed to state changes of {}", entity_id);
        Ok(rx)
    }
}

#[async_trait]
impl ServiceCaller for HassClient {
    async fn call_service(&self, call: ServiceCall) -> Result<()> {
        let command = Command::CallService {
            domain: &call.domain,
            service: &call.service,
            service_data: &call.service_data,
        };
        match self.request(command).await {
            Ok(_) => Ok(()),
            Err(NotifierError::CommandFailed { message, .. }) => {
                Err(NotifierError::ServiceCallFailed {
                    domain: call.domain,
                    service: call.service,
                    message,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ServiceRegistry for HassClient {
    async fn get_services(&self) -> Result<ServiceCatalog> {
        let result = self.request(Command::GetServices).await?;
        Ok(serde_json::from_value(result.unwrap_or_default())?)
    }
}
