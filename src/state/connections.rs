use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Authenticated identity attached to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Unique user name.
    pub name: String,
    /// Staff member.
    pub admin: bool,
    /// Barred from posting comments.
    pub squelched: bool,
}

impl Identity {
    /// Regular identity without moderation flags.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            admin: false,
            squelched: false,
        }
    }
}

#[derive(Debug, Clone)]
/// Handle used to push messages to a connected client.
pub struct ClientConnection {
    /// Distinguishes successive connections of the same identity.
    pub id: Uuid,
    /// Who is connected.
    pub identity: Identity,
    /// Outbound queue drained by the socket writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

impl ClientConnection {
    /// Wrap a fresh outbound queue under a new connection id.
    pub fn new(identity: Identity, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            tx,
        }
    }
}

/// Identity → live connection handle.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ClientConnection>,
}

impl ConnectionRegistry {
    /// Register a connection, returning the one it replaced.
    pub fn register(&self, connection: ClientConnection) -> Option<ClientConnection> {
        self.connections
            .insert(connection.identity.name.clone(), connection)
    }

    /// Remove `name` only if its registered connection is still `id`.
    pub fn unregister(&self, name: &str, id: Uuid) -> bool {
        self.connections
            .remove_if(name, |_, connection| connection.id == id)
            .is_some()
    }

    /// Whether `id` is the registered connection of `name`.
    pub fn is_current(&self, name: &str, id: Uuid) -> bool {
        self.connections
            .get(name)
            .is_some_and(|connection| connection.id == id)
    }

    /// Outbound queue of `name`; `None` means "not connected".
    pub fn sender(&self, name: &str) -> Option<mpsc::UnboundedSender<Message>> {
        self.connections
            .get(name)
            .map(|connection| connection.tx.clone())
    }

    /// Outbound queues of every connection.
    pub fn senders(&self) -> Vec<mpsc::UnboundedSender<Message>> {
        self.connections
            .iter()
            .map(|entry| entry.value().tx.clone())
            .collect()
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(name: &str) -> (ClientConnection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientConnection::new(Identity::new(name), tx), rx)
    }

    #[test]
    fn stale_connection_cannot_unregister_its_replacement() {
        let registry = ConnectionRegistry::default();
        let (first, _rx1) = connection("alice");
        let (second, _rx2) = connection("alice");
        let first_id = first.id;
        let second_id = second.id;

        registry.register(first);
        let replaced = registry.register(second).unwrap();
        assert_eq!(replaced.id, first_id);

        assert!(!registry.unregister("alice", first_id));
        assert!(registry.is_current("alice", second_id));
        assert!(registry.unregister("alice", second_id));
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_miss_means_not_connected() {
        let registry = ConnectionRegistry::default();
        let (alice, _rx) = connection("alice");
        registry.register(alice);

        assert!(registry.sender("alice").is_some());
        assert!(registry.sender("bob").is_none());
        assert_eq!(registry.senders().len(), 1);
    }
}
