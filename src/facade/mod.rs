pub mod storefront;

pub use storefront::{Storefront, StorefrontConfig};
