use crate::cache::ResponseCache;
use crate::core::{ApiError, Result, SyncError};
use crate::http::{ApiClient, ClientConfig, ReqwestTransport, Transport};
use crate::session::{AuthService, SessionStore};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::storefront::cart::cart_source;
use crate::storefront::favorites::FAVORITES_SOURCE;
use crate::storefront::orders::orders_source;
use crate::storefront::{
    AccountService, CartService, Catalog, CheckoutService, FavoriteService, OrderDetail,
    OrderService, Preferences, ProductDetail,
};
use crate::sync::{CollectionRegistry, Notifier, RemoteCollection, SyncConfig};
use crate::core::SyncEntity;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything needed to wire a storefront
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub client: ClientConfig,
    pub sync: SyncConfig,
    pub session_duration: Duration,
}

impl StorefrontConfig {
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            sync: SyncConfig::default(),
            session_duration: SessionStore::DEFAULT_DURATION,
        }
    }

    /// Client settings from the environment, defaults elsewhere.
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        self.client.validate()?;
        self.sync.validate()?;
        if self.session_duration.is_zero() {
            return Err("Session duration must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

/// Entry point wiring session, fetch client, shared collections and
/// preferences together
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use storesync::{MemoryStore, Storefront, StorefrontConfig};
///
/// # async fn run() -> storesync::Result<()> {
/// let store = Storefront::new(StorefrontConfig::from_env(), Arc::new(MemoryStore::new()))?;
/// store.auth().login("ann", "secret").await?;
///
/// let cart = store.cart()?;
/// cart.load(false).await?;
/// println!("cart total: {}", cart.total_price());
/// # Ok(())
/// # }
/// ```
pub struct Storefront {
    config: StorefrontConfig,
    client: ApiClient,
    notifier: Notifier,
    registry: Arc<CollectionRegistry>,
    details: Arc<ResponseCache<Vec<OrderDetail>>>,
    preferences: Preferences,
}

impl Storefront {
    /// Storefront over HTTP sharing the process-wide collection registry
    pub fn new(config: StorefrontConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate().map_err(SyncError::Config)?;
        let transport = ReqwestTransport::new(config.client.clone())
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let registry = Arc::clone(CollectionRegistry::global());
        Self::new_with(config, Arc::new(transport), storage, registry)
    }

    /// Storefront over a specific transport, storage and registry
    pub fn new_with(
        config: StorefrontConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStore>,
        registry: Arc<CollectionRegistry>,
    ) -> Result<Self> {
        config.validate().map_err(SyncError::Config)?;

        let session = SessionStore::with_storage(Arc::clone(&storage), config.session_duration);
        let client = ApiClient::with_transport(config.client.clone(), transport, session);
        let notifier = Notifier::new(&config.sync);
        let details = Arc::new(ResponseCache::new(
            config.sync.cache_capacity,
            config.sync.freshness_window,
        ));

        Ok(Self {
            preferences: Preferences::new(storage),
            config,
            client,
            notifier,
            registry,
            details,
        })
    }

    /// Storefront with in-memory storage and its own registry
    ///
    /// Useful for testing to ensure tests don't interfere with each other.
    pub fn new_isolated(config: StorefrontConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::new_with(
            config,
            transport,
            Arc::new(MemoryStore::new()),
            Arc::new(CollectionRegistry::new()),
        )
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &SessionStore {
        self.client.session()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.client.clone())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.client.clone())
    }

    pub fn cart(&self) -> Result<CartService> {
        let account_id = self.account_id()?;
        let items = self.collection("cart", &account_id, cart_source(&account_id))?;
        Ok(CartService::new(items, account_id))
    }

    pub fn orders(&self) -> Result<OrderService> {
        let account_id = self.account_id()?;
        let orders = self.collection("orders", &account_id, orders_source(&account_id))?;
        Ok(OrderService::new(orders, Arc::clone(&self.details), account_id))
    }

    /// Checkout over the account's shared cart and orders collections
    pub fn checkout(&self) -> Result<CheckoutService> {
        Ok(CheckoutService::new(self.cart()?, self.orders()?))
    }

    pub fn account(&self) -> Result<AccountService> {
        Ok(AccountService::new(self.client.clone(), self.account_id()?))
    }

    /// Delete the signed-in account, then forget everything cached for it.
    pub async fn delete_account(&self) -> Result<()> {
        let account = self.account()?;
        account.delete().await?;
        self.forget_account(account.account_id())
    }

    pub fn favorites(&self) -> Result<FavoriteService> {
        let account_id = self.account_id()?;
        let favorites = self.collection("favorites", &account_id, FAVORITES_SOURCE.to_string())?;
        Ok(FavoriteService::new(favorites, account_id))
    }

    /// Load a product page; selections are remembered in preferences.
    pub async fn product(&self, product_id: &str) -> Result<ProductDetail> {
        let detail = ProductDetail::load(&self.client, product_id).await?;
        Ok(detail.with_preferences(self.preferences.clone()))
    }

    /// End the session and drop the account's cached collections.
    pub fn logout(&self) -> Result<()> {
        if let Some(account) = self.session().account() {
            self.forget_account(&account.id)?;
            info!(account = %account.id, "signed out");
        }
        self.details.clear();
        self.session().sign_out();
        Ok(())
    }

    fn forget_account(&self, account_id: &str) -> Result<()> {
        for kind in ["cart", "orders", "favorites"] {
            self.registry.remove(&collection_key(kind, account_id))?;
        }
        self.details.clear();
        Ok(())
    }

    /// Signed-in account id, or `Unauthorized` (which also requests a login).
    fn account_id(&self) -> Result<String> {
        self.session().require_token()?;
        self.session()
            .account()
            .map(|account| account.id)
            .ok_or_else(|| ApiError::Unauthorized.into())
    }

    fn collection<T: SyncEntity>(
        &self,
        kind: &str,
        account_id: &str,
        source: String,
    ) -> Result<RemoteCollection<T>> {
        let key = collection_key(kind, account_id);
        self.registry.get_or_create(&key, || {
            RemoteCollection::new(
                key.clone(),
                source,
                self.client.clone(),
                self.notifier.clone(),
                self.config.sync.clone(),
            )
        })
    }
}

fn collection_key(kind: &str, account_id: &str) -> String {
    format!("{}:{}", kind, account_id)
}
