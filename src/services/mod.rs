/// Room chat relay.
pub mod chat_service;
/// Pre-match countdown driver.
pub mod countdown_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Builders for outbound lobby events.
pub mod events;
/// Health check service.
pub mod health_service;
/// Live match queries and finish submissions.
pub mod match_service;
/// Party create/join/ready/leave operations.
pub mod party_service;
/// Pairwise Elo rating engine.
pub mod rating;
/// Session ownership and the disconnect reaper.
pub mod session_service;
/// Rating, XP and readiness settlement after a completed match.
pub mod settlement;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and intent dispatch.
pub mod websocket_service;
