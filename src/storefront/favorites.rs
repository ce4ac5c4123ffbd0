use super::models::Favorite;
use crate::core::{ApiError, Result, SyncError};
use crate::sync::{Mutation, ReadOptions, RemoteCollection, RemoteOperation};
use im::Vector;
use serde_json::json;
use std::future::Future;

pub(crate) const FAVORITES_SOURCE: &str = "/favorites";

#[derive(Clone)]
pub struct FavoriteService {
    favorites: RemoteCollection<Favorite>,
    account_id: String,
}

impl FavoriteService {
    pub fn new(favorites: RemoteCollection<Favorite>, account_id: impl Into<String>) -> Self {
        Self {
            favorites,
            account_id: account_id.into(),
        }
    }

    pub fn collection(&self) -> &RemoteCollection<Favorite> {
        &self.favorites
    }

    pub async fn load(&self, force: bool) -> std::result::Result<Vector<Favorite>, ApiError> {
        let options = if force {
            ReadOptions::forced()
        } else {
            ReadOptions::cached()
        };
        self.favorites.read(options).await
    }

    pub fn find(&self, product_id: &str) -> Option<Favorite> {
        self.favorites
            .items()
            .into_iter()
            .find(|favorite| favorite.product_id() == Some(product_id))
    }

    pub fn is_favorited(&self, product_id: &str) -> bool {
        self.find(product_id).is_some()
    }

    /// Flip the favorite state of a product.
    ///
    /// The new state is visible before this returns. The future resolves to
    /// the confirmed state, or to the error after the flip was rolled back.
    pub fn toggle(&self, product_id: &str) -> impl Future<Output = Result<bool>> + Send + 'static {
        let prepared = match self.find(product_id) {
            Some(existing) if existing.is_provisional() => Err(SyncError::Validation(
                "Favorite update already in progress".to_string(),
            )),
            Some(existing) => {
                let operation = RemoteOperation::delete(format!("/favorites/{}", existing.id))
                    .on_success("Product removed from favorites successfully!");
                Ok((
                    self.favorites.submit(Mutation::remove(existing.id, operation)),
                    false,
                ))
            }
            None => {
                let operation = RemoteOperation::post(
                    FAVORITES_SOURCE,
                    json!({ "acc_id": self.account_id, "pro_id": product_id }),
                )
                .on_success("Product added to favorites successfully!");
                Ok((
                    self.favorites
                        .submit(Mutation::insert(Favorite::provisional(product_id), operation)),
                    true,
                ))
            }
        };

        async move {
            let (handle, favorited) = prepared?;
            handle.await??;
            Ok(favorited)
        }
    }
}
