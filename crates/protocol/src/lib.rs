//! beatsync-protocol – Wire-Protokoll und Clock-Sync
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Relay ausgetauscht werden, sowie die Offset-/RTT-Schaetzung fuer die
//! Uhrensynchronisation.

pub mod clock;
pub mod message;

pub use clock::{ClockEstimate, MonotoneUhr, PongData};
pub use message::{
    ClientNachricht, FehlerArt, NachrichtenFehler, RelayArt, RelayNachricht, ServerEreignis,
    ServerNachricht, SessionInfo,
};
