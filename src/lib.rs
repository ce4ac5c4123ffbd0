// ============================================================================
// storesync Library
// ============================================================================

pub mod cache;
pub mod core;
pub mod facade;
pub mod http;
pub mod prelude;
pub mod selection;
pub mod session;
pub mod storage;
pub mod storefront;
pub mod sync;

// Re-export main types for convenience
pub use core::{ApiError, EntityId, Result, SyncEntity, SyncError};
pub use facade::{Storefront, StorefrontConfig};

// Re-export fetch client API
pub use http::{
    ApiClient, ClientConfig, Method, MockReply, MockTransport, ReqwestTransport, RetryPolicy,
    Transport,
};

// Re-export synchronization API
pub use sync::{
    CollectionRegistry, CollectionSnapshot, CollectionState, Mutation, Notification,
    NotificationLevel, Notifier, Patch, ReadOptions, RemoteCollection, RemoteOperation,
    SyncConfig,
};

pub use cache::{CacheEntry, ResponseCache};
pub use selection::{IndexedVariants, Variant, VariantIndex, VariantSelection};
pub use session::{Account, AuthService, AuthStatus, LoginReason, SessionStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore, PersistedValue};
pub use storefront::{
    AccountService, CartItem, CartService, Catalog, CheckoutLine, CheckoutOutcome,
    CheckoutService, FavoriteService, ListFilters, Order, OrderDetail, OrderService,
    PaymentMethod, Preferences, Product, ProductDetail, ProductVariant, ProfileUpdate,
    ShippingDetails,
};
