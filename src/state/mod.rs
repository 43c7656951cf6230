pub mod connections;
pub mod race;
pub mod ranking;
pub mod registry;
pub mod rooms;
pub mod ruleset;

use std::sync::Arc;

use crate::{config::AppConfig, dao::race_store::RaceStore, services::ratings::RatingService};

use self::{connections::ConnectionRegistry, registry::CommandSerializer, rooms::RoomRegistry};

pub type SharedState = Arc<AppState>;

/// Central application state: the three registries and the external collaborators.
///
/// Race state is only reachable through [`AppState::serializer`]; connection and room
/// registries carry their own short-lived locks and never take the serializer.
pub struct AppState {
    config: AppConfig,
    connections: ConnectionRegistry,
    rooms: RoomRegistry,
    serializer: CommandSerializer,
    store: Arc<dyn RaceStore>,
    ratings: Arc<dyn RatingService>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RaceStore>,
        ratings: Arc<dyn RatingService>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            connections: ConnectionRegistry::default(),
            rooms: RoomRegistry::default(),
            serializer: CommandSerializer::default(),
            store,
            ratings,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live client connections keyed by identity.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Registry of notification rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Ownership token guarding every live race.
    pub fn serializer(&self) -> &CommandSerializer {
        &self.serializer
    }

    /// Persistence gateway for finished races.
    pub fn store(&self) -> Arc<dyn RaceStore> {
        Arc::clone(&self.store)
    }

    /// Rating collaborator.
    pub fn ratings(&self) -> Arc<dyn RatingService> {
        Arc::clone(&self.ratings)
    }
}
