//! beatsync-relay – Session-Relay mit Clock-Sync
//!
//! Dieser Crate verwaltet WebSocket-Verbindungen, Session-Mitgliedschaften
//! und verteilt Wiedergabe-Kommandos an die anderen Mitglieder einer
//! Session. Ping/Pong liefert den Clients die Serverzeit fuer die
//! Offset-Schaetzung.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket-Router (GET / und /ws)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Lese- und ein Schreib-Task)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- SyncHandler     (ping -> pong)
//!     +-- SessionHandler  (create_session, join, join_session)
//!     +-- RelayHandler    (play, pause, seek, upload, position)
//!
//! RelayState – SessionRegistry + ConnectionDirectory hinter einem Lock
//! RelayEvent – Broadcast-Channel fuer Metriken
//! ```

pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::ClientSender;
pub use connection::ClientConnection;
pub use dispatcher::{DispatcherContext, MessageDispatcher};
pub use error::{FehlerKlasse, RelayError, RelayResult};
pub use events::RelayEvent;
pub use server_state::{RelayKonfig, RelayState, RelayStatistik, Zustellung};
pub use ws::relay_router;
