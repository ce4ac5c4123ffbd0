// ============================================================================
// Synchronization Layer
// ============================================================================
//
// Local cache + optimistic mutation layer over the fetch client.
//
// ============================================================================

pub mod collection;
pub mod config;
pub mod mutation;
pub mod notify;
pub mod patch;
pub mod registry;
pub mod state;

pub use collection::{CollectionSnapshot, ReadOptions, RemoteCollection};
pub use config::SyncConfig;
pub use mutation::{Mutation, PendingMutation, RemoteOperation};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use patch::Patch;
pub use registry::CollectionRegistry;
pub use state::{CollectionState, MutationId};
