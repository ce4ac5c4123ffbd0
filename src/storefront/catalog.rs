// ============================================================================
// Catalog
// ============================================================================

use super::models::{Product, ProductVariant};
use crate::core::ApiError;
use crate::http::ApiClient;
use crate::selection::{Variant, VariantIndex};
use crate::sync::collection::decode_items;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

pub const ALL_CATEGORIES: &str = "All Categories";
pub const ALL_COLORS: &str = "All Colors";
pub const ALL_SIZES: &str = "All Sizes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Category,
    Color,
    Size,
}

/// Product list filters
///
/// Missing fields fall back to their "all" value when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilters {
    pub category: String,
    pub color: String,
    pub size: String,
}

impl ListFilters {
    pub fn set(&mut self, kind: FilterKind, value: &str) {
        let slot = match kind {
            FilterKind::Category => &mut self.category,
            FilterKind::Color => &mut self.color,
            FilterKind::Size => &mut self.size,
        };
        *slot = value.to_string();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn filters_variants(&self) -> bool {
        self.color != ALL_COLORS || self.size != ALL_SIZES
    }

    /// Non-default filters as URL query pairs.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.category != ALL_CATEGORIES {
            pairs.push(("category", self.category.clone()));
        }
        if self.color != ALL_COLORS {
            pairs.push(("color", self.color.clone()));
        }
        if self.size != ALL_SIZES {
            pairs.push(("size", self.size.clone()));
        }
        pairs
    }

    /// Query parameters take precedence over `self`.
    pub fn overridden_by<'a, I>(&self, query: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut merged = self.clone();
        for (name, value) in query {
            if value.is_empty() {
                continue;
            }
            match name {
                "category" => merged.set(FilterKind::Category, value),
                "color" => merged.set(FilterKind::Color, value),
                "size" => merged.set(FilterKind::Size, value),
                _ => {}
            }
        }
        merged
    }
}

impl Default for ListFilters {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            color: ALL_COLORS.to_string(),
            size: ALL_SIZES.to_string(),
        }
    }
}

/// Apply `filters` and sort by product name.
///
/// Color and size match through variants: a product passes when one of its
/// variants matches both dimensions.
pub fn filter_products(
    products: &[Product],
    variants: &[ProductVariant],
    filters: &ListFilters,
) -> Vec<Product> {
    let matching: Option<HashSet<&str>> = filters.filters_variants().then(|| {
        variants
            .iter()
            .filter(|variant| {
                (filters.color == ALL_COLORS || variant.color() == Some(filters.color.as_str()))
                    && (filters.size == ALL_SIZES || variant.size() == Some(filters.size.as_str()))
            })
            .filter_map(ProductVariant::product_id)
            .collect()
    });

    let mut filtered: Vec<Product> = products
        .iter()
        .filter(|product| {
            filters.category == ALL_CATEGORIES
                || product.category_name() == Some(filters.category.as_str())
        })
        .filter(|product| {
            matching
                .as_ref()
                .is_none_or(|ids| ids.contains(product.id.as_str()))
        })
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let a = a.pro_name.as_deref().unwrap_or_default();
        let b = b.pro_name.as_deref().unwrap_or_default();
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
    });
    filtered
}

/// Distinct category names, sorted
pub fn categories(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .filter_map(Product::category_name)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Public product and variant listings
#[derive(Clone)]
pub struct Catalog {
    client: ApiClient,
}

impl Catalog {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        let body = self.client.request(Method::GET, "/products", None, &[], None).await?;
        Ok(decode_items::<Product>("products", body).into_iter().collect())
    }

    pub async fn variants(&self) -> Result<Vec<ProductVariant>, ApiError> {
        let body = self.client.request(Method::GET, "/variants", None, &[], None).await?;
        Ok(decode_items::<ProductVariant>("variants", body).into_iter().collect())
    }

    /// Products, variants and the filter options derived from them.
    pub async fn load(&self) -> Result<CatalogListing, ApiError> {
        let (products, variants) = tokio::try_join!(self.products(), self.variants())?;
        Ok(CatalogListing::new(products, variants))
    }
}

#[derive(Debug, Clone)]
pub struct CatalogListing {
    pub products: Vec<Product>,
    pub variants: Vec<ProductVariant>,
    pub categories: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
}

impl CatalogListing {
    pub fn new(products: Vec<Product>, variants: Vec<ProductVariant>) -> Self {
        let index = VariantIndex::build(variants.clone());
        let colors = index.colors().into_iter().map(str::to_string).collect();
        let sizes = index.sizes().into_iter().map(str::to_string).collect();
        Self {
            categories: categories(&products),
            products,
            variants,
            colors,
            sizes,
        }
    }

    pub fn filtered(&self, filters: &ListFilters) -> Vec<Product> {
        filter_products(&self.products, &self.variants, filters)
    }
}
