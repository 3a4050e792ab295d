//! Store and workflow wiring shared by every handler.

use oms_core::{OrderId, ProductId};
use oms_infra::config::{Config, StoreBackend};
use oms_infra::store::{CatalogStore, InMemoryStore, PostgresStore, StoreResult};
use oms_infra::{OrderService, PlacementError};
use oms_inventory::{InventoryRecord, Quantity};
use oms_parties::{Customer, RegisterCustomer};
use oms_products::{CatalogEntry, CreateProduct};
use oms_sales::{OrderDetails, OrderHeaderView, PlaceOrderRequest};

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        store: InMemoryStore,
        orders: OrderService<InMemoryStore>,
    },
    Persistent {
        store: PostgresStore,
        orders: OrderService<PostgresStore>,
    },
}

impl AppServices {
    pub fn in_memory() -> Self {
        Self::with_in_memory(InMemoryStore::new())
    }

    /// Wrap an existing in-memory store (lets tests seed and inspect it).
    pub fn with_in_memory(store: InMemoryStore) -> Self {
        Self::InMemory {
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    pub fn persistent(store: PostgresStore) -> Self {
        Self::Persistent {
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    /// Build the services selected by `config`, connecting and migrating the
    /// database when persistent stores are enabled.
    pub async fn from_config(config: &Config) -> StoreResult<Self> {
        match &config.backend {
            StoreBackend::InMemory => {
                tracing::info!("using in-memory stores");
                Ok(Self::in_memory())
            }
            StoreBackend::Postgres(db) => {
                let store = PostgresStore::connect(db).await?;
                Ok(Self::persistent(store))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            AppServices::InMemory { .. } => "in_memory",
            AppServices::Persistent { .. } => "postgres",
        }
    }

    fn catalog(&self) -> &dyn CatalogStore {
        match self {
            AppServices::InMemory { store, .. } => store,
            AppServices::Persistent { store, .. } => store,
        }
    }

    // ---- orders ----

    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<OrderDetails, PlacementError> {
        match self {
            AppServices::InMemory { orders, .. } => orders.place_order(request).await,
            AppServices::Persistent { orders, .. } => orders.place_order(request).await,
        }
    }

    pub async fn get_order(&self, id: OrderId) -> StoreResult<Option<OrderDetails>> {
        match self {
            AppServices::InMemory { orders, .. } => orders.get_order(id).await,
            AppServices::Persistent { orders, .. } => orders.get_order(id).await,
        }
    }

    pub async fn list_orders(&self) -> StoreResult<Vec<OrderHeaderView>> {
        match self {
            AppServices::InMemory { orders, .. } => orders.list_orders().await,
            AppServices::Persistent { orders, .. } => orders.list_orders().await,
        }
    }

    // ---- catalog / directory ----

    pub async fn list_products(&self) -> StoreResult<Vec<CatalogEntry>> {
        self.catalog().list_products().await
    }

    pub async fn create_product(&self, cmd: CreateProduct) -> StoreResult<CatalogEntry> {
        self.catalog().create_product(cmd).await
    }

    pub async fn restock(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<Option<InventoryRecord>> {
        self.catalog().restock(product_id, quantity).await
    }

    pub async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        self.catalog().list_customers().await
    }

    pub async fn register_customer(&self, cmd: RegisterCustomer) -> StoreResult<Customer> {
        self.catalog().register_customer(cmd).await
    }

    /// Release store resources (closes the Postgres pool).
    pub async fn shutdown(&self) {
        if let AppServices::Persistent { store, .. } = self {
            store.close().await;
            tracing::info!("database pool closed");
        }
    }
}
