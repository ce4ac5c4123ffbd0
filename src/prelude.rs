//! Recommended API entrypoints grouped by abstraction level.
//!
//! `shop` is the default for storefront applications.
//! `advanced` exposes the synchronization primitives the shop services are
//! built from.

pub mod shop {
    //! Storefront services and models.
    pub use crate::{
        Account, AccountService, ApiError, AuthStatus, CartItem, CartService, Catalog,
        CheckoutLine, CheckoutOutcome, CheckoutService, FavoriteService, ListFilters,
        Notification, NotificationLevel, Order, OrderDetail, OrderService, PaymentMethod,
        Product, ProductDetail, ProductVariant, ProfileUpdate, Result, ShippingDetails,
        Storefront, StorefrontConfig, SyncError,
    };
}

pub mod advanced {
    //! Building blocks for custom synchronized collections.
    pub use crate::http::{ApiRequest, ApiResponse, TransportError, with_query};
    pub use crate::sync::{MutationId, PendingMutation};
    pub use crate::{
        ApiClient, CacheEntry, ClientConfig, CollectionRegistry, CollectionSnapshot,
        CollectionState, IndexedVariants, KeyValueStore, Mutation, Patch, PersistedValue,
        ReadOptions, RemoteCollection, RemoteOperation, ResponseCache, RetryPolicy, SyncConfig,
        SyncEntity, Transport, Variant, VariantIndex, VariantSelection,
    };
}
