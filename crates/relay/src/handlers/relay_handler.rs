//! Relay-Handler – play, pause, seek, upload, position
//!
//! Reine Weiterleitung an die anderen Mitglieder der Absender-Session.

use beatsync_core::types::ConnectionId;
use beatsync_protocol::RelayNachricht;

use crate::error::RelayResult;
use crate::server_state::{RelayState, Zustellung};

/// Verteilt eine Relay-Nachricht
pub fn handle_relay(
    nachricht: &RelayNachricht,
    connection_id: &ConnectionId,
    state: &RelayState,
) -> RelayResult<Zustellung> {
    state.verteilen(connection_id, nachricht)
}
