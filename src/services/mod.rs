//! Collaboration services behind the websocket route.
//!
//! ARCHITECTURE
//! ============
//! The session controller owns every state transition; the indices (presence,
//! selection, edit) are pure in-memory repositories keyed by scope, and the
//! router delivers messages over the per-connection channels. Route handlers
//! stay focused on transport and protocol translation.

pub mod edit;
pub mod presence;
pub mod relay;
pub mod router;
pub mod selection;
pub mod session;
