//! Sync-Handler – Ping/Pong fuer die Uhrensynchronisation
//!
//! Der Server antwortet sofort; Empfangs- und Sendezeit sind identisch.

use beatsync_protocol::ServerNachricht;

use crate::server_state::RelayState;

/// Beantwortet eine Clock-Sync-Probe mit `t2 == t3 ==` aktueller Serverzeit
pub fn handle_ping(t1: f64, state: &RelayState) -> ServerNachricht {
    ServerNachricht::pong(t1, state.server_zeit_ms())
}
