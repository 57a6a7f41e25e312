//! Identity directory and envelope forwarding

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub type ConnectionId = u64;

/// What the router did with one inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Registered { id: String },
    Forwarded { kind: String, target: String },
    Dropped { reason: String },
}

impl RouteOutcome {
    fn dropped(reason: impl Into<String>) -> Self {
        RouteOutcome::Dropped { reason: reason.into() }
    }
}

#[derive(Default)]
struct Directory {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
    identities: HashMap<String, ConnectionId>,
}

/// Maps registered identities to live connections
#[derive(Default)]
pub struct Router {
    directory: Mutex<Directory>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection; lines routed to it are pushed into `outbound`
    pub fn connect(&self, connection: ConnectionId, outbound: mpsc::UnboundedSender<String>) {
        self.directory.lock().connections.insert(connection, outbound);
        debug!(connection, "Connection opened");
    }

    /// Forget a connection and every identity bound to it
    pub fn disconnect(&self, connection: ConnectionId) -> Vec<String> {
        let mut directory = self.directory.lock();
        directory.connections.remove(&connection);

        let mut released = Vec::new();
        directory.identities.retain(|id, bound| {
            if *bound == connection {
                released.push(id.clone());
                false
            } else {
                true
            }
        });
        drop(directory);

        for id in &released {
            info!(connection, id = %id, "Peer unregistered");
        }
        released
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.directory.lock().identities.contains_key(id)
    }

    pub fn registered(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.directory.lock().identities.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn connection_count(&self) -> usize {
        self.directory.lock().connections.len()
    }

    /// Handle one line received on `connection`
    pub fn route(&self, connection: ConnectionId, line: &str) -> RouteOutcome {
        let message: Value = match serde_json::from_str(line) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) => {
                warn!(connection, "Discarding non-object message");
                return RouteOutcome::dropped("not a JSON object");
            }
            Err(e) => {
                warn!(connection, "Discarding malformed message: {}", e);
                return RouteOutcome::dropped("malformed JSON");
            }
        };

        let kind = message.get("type").and_then(Value::as_str).unwrap_or_default();
        let target_field = match kind {
            "register" => return self.register(connection, &message),
            "offer" => "answererId",
            "answer" => "offererId",
            "candidate" => "targetId",
            other => {
                warn!(connection, kind = other, "Discarding message of unknown type");
                return RouteOutcome::dropped(format!("unknown type {:?}", other));
            }
        };

        let Some(target) = message.get(target_field).and_then(Value::as_str) else {
            warn!(connection, kind, "Discarding message without {}", target_field);
            return RouteOutcome::dropped(format!("missing {}", target_field));
        };

        let directory = self.directory.lock();
        let outbound = directory
            .identities
            .get(target)
            .and_then(|bound| directory.connections.get(bound));
        match outbound {
            Some(outbound) if outbound.send(line.to_string()).is_ok() => {
                debug!(connection, kind, target, "Forwarded message");
                RouteOutcome::Forwarded {
                    kind: kind.to_string(),
                    target: target.to_string(),
                }
            }
            Some(_) => {
                warn!(connection, kind, target, "Target connection is closing");
                RouteOutcome::dropped(format!("{} is disconnecting", target))
            }
            None => {
                warn!(connection, kind, target, "Target not registered");
                RouteOutcome::dropped(format!("{} not registered", target))
            }
        }
    }

    fn register(&self, connection: ConnectionId, message: &Value) -> RouteOutcome {
        let Some(id) = message.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) else {
            warn!(connection, "Discarding register without id");
            return RouteOutcome::dropped("missing id");
        };

        let mut directory = self.directory.lock();
        if !directory.connections.contains_key(&connection) {
            return RouteOutcome::dropped("connection closed");
        }
        if let Some(previous) = directory.identities.insert(id.to_string(), connection) {
            if previous != connection {
                info!(connection, previous, id, "Identity moved to a new connection");
            }
        }
        info!(connection, id, "Peer registered");
        RouteOutcome::Registered { id: id.to_string() }
    }
}
