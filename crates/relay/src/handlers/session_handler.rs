//! Session-Handler – create_session, join, join_session

use beatsync_core::types::{DeviceId, SessionId};
use beatsync_protocol::ServerNachricht;

use crate::broadcast::ClientSender;
use crate::error::RelayResult;
use crate::server_state::RelayState;

/// Erstellt eine Session; der Absender wird ihr erstes Mitglied
///
/// Antwortet mit `session_created` an den Absender.
pub fn handle_session_erstellen(
    device_id: DeviceId,
    session_name: Option<String>,
    sender: &ClientSender,
    state: &RelayState,
) -> RelayResult<ServerNachricht> {
    let info = state.session_erstellen(sender, device_id, session_name)?;
    Ok(ServerNachricht::SessionCreated {
        session_id: info.session_id.clone(),
        session_info: info,
    })
}

/// Tritt einer Session bei (keine Antwort)
pub fn handle_beitreten(
    session_id: SessionId,
    device_id: DeviceId,
    nickname: Option<String>,
    sender: &ClientSender,
    state: &RelayState,
) -> RelayResult<()> {
    state.beitreten(sender, device_id, session_id, nickname)
}
