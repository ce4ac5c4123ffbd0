// ============================================================================
// Storefront
// ============================================================================
//
// Shop-specific services built on the synchronization layer.
//
// ============================================================================

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod favorites;
pub mod models;
pub mod orders;
pub mod preferences;
pub mod product;

pub use account::{AccountService, ProfileUpdate};
pub use cart::CartService;
pub use catalog::{Catalog, CatalogListing, FilterKind, ListFilters, filter_products};
pub use checkout::{
    CheckoutLine, CheckoutOutcome, CheckoutService, PaymentMethod, ShippingDetails,
};
pub use favorites::FavoriteService;
pub use models::{
    CartItem, Category, Favorite, Order, OrderDetail, Product, ProductVariant, Ref,
};
pub use orders::OrderService;
pub use preferences::{Preferences, StoredSelection};
pub use product::{ProductDetail, ProductImage};
