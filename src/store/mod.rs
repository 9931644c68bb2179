//! Session persistence
//!
//! Completed sessions are appended to a document store keyed by user id.
//! Records are never updated or deleted.

mod document;
mod session;

pub use document::{DocumentStore, InMemoryDocumentStore, JsonFileDocumentStore};
pub use session::{IdentityProvider, SessionStore, StaticIdentity, SESSIONS_COLLECTION};
