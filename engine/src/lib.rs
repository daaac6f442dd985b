//! # Real-Time Match Engine
//!
//! Authoritative server core for two-player paddle matches: it admits remote
//! players into shared sessions, runs the physics simulation at a fixed tick
//! rate, broadcasts consistent state to players and spectators, and resolves
//! the session lifecycle (start, pause, rematch, termination, cleanup) under
//! unreliable client connectivity.
//!
//! ## Architecture
//!
//! - [`store::SessionStore`]: authoritative id to session mapping with its
//!   own short-held lock; each session sits behind a per-session mutex so
//!   all mutation for one session id is serialized.
//! - [`physics`]: pure per-tick step over the continuous state, plus the
//!   discrete paddle-move rule applied on input receipt.
//! - [`scheduler`]: one cancellable 30 Hz tick task per playing session;
//!   stopping is idempotent because the win-threshold check and external
//!   cleanup paths may both request a stop.
//! - [`router::Router`]: maps transport connections to `{session, role}`
//!   bindings and implements join, input, disconnect, quick match and the
//!   rematch votes; every side effect is broadcast to all connections bound
//!   to the session.
//! - [`matchmaking::MatchmakingQueue`]: single-slot rendezvous pairing
//!   anonymous quick-match requests onto one session id.
//! - [`reporter`]: narrow trait over the external stats and tournament
//!   collaborators, driven by a channel so the tick loop never blocks on
//!   them; invoked exactly once per finished game.
//! - [`net::Server`]: thin UDP front end translating datagrams into router
//!   operations.
//!
//! ## Concurrency model
//!
//! One lightweight task per active session's ticker plus one outbound task
//! per live connection. The session lock is held for the duration of a tick
//! or an inbound event, never across network I/O: broadcasts are
//! non-blocking sends onto per-connection channels. Sessions outlive
//! individual connections; a vacated role pauses the game, and the session
//! is only purged a grace period after finishing with no accepted rematch.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use engine::net::Server;
//! use engine::reporter::{LogSink, OutcomeReporter};
//! use engine::router::{EngineConfig, Router};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reporter = OutcomeReporter::spawn(Arc::new(LogSink));
//!     let router = Router::new(EngineConfig::default(), reporter);
//!
//!     let mut server = Server::bind("127.0.0.1:8080", router).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod matchmaking;
pub mod net;
pub mod physics;
pub mod reporter;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod store;
