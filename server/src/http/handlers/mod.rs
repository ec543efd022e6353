//! HTTP-Handler

pub mod audio;
pub mod session;
