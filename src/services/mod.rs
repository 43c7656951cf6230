/// Connect and disconnect handling.
pub mod connection_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Public read-only race views.
pub mod public_service;
/// Server message generation and fan-out.
pub mod race_events;
/// Client command execution under the command serializer.
pub mod race_service;
/// Rating collaborator.
pub mod ratings;
/// Room membership with member-list broadcasts.
pub mod room_service;
/// Start countdown and time limit timers.
pub mod timers;
/// WebSocket connection and message handling service.
pub mod websocket_service;
