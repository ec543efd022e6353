//! Handler fuer alle Client-Nachrichten
//!
//! Jeder Handler ist fuer einen bestimmten Nachrichtentyp zustaendig
//! und hat Zugriff auf den gemeinsamen RelayState.

pub mod relay_handler;
pub mod session_handler;
pub mod sync_handler;
