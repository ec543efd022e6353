//! Gemeinsame Identifikationstypen fuer BeatSync
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Geraete-, Session- und Verbindungs-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Vom Client gewaehlte, stabile Geraete-ID
///
/// Eindeutig innerhalb des Prozesses; der Server vergibt sie nicht selbst.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Erstellt eine DeviceId aus einem beliebigen String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die ID als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device:{}", self.0)
    }
}

/// Session-ID, z.B. `"ABC123"` oder die implizite Standard-Session `"default"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// ID der impliziten Standard-Session
    pub const STANDARD: &'static str = "default";

    /// Erstellt eine SessionId aus einem beliebigen String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Die implizite Standard-Session
    pub fn standard() -> Self {
        Self(Self::STANDARD.to_string())
    }

    /// Prueft ob dies die implizite Standard-Session ist
    pub fn ist_standard(&self) -> bool {
        self.0 == Self::STANDARD
    }

    /// Gibt die ID als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serverseitig vergebenes Handle einer Transportverbindung
///
/// Close-Events tragen nur dieses Handle, nicht die DeviceId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}
