#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};

use tally_core::{MobileProvider, NewOrder, PaymentNotification, Product};
use tally_register::{
    ApiError, ApiResult, Catalog, CheckoutService, OrderStore, PaymentLedgerState, SessionQueueState,
};

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl InMemoryCatalog {
    pub async fn insert(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, product_id: &str) -> ApiResult<Option<Product>> {
        Ok(self.products.read().await.get(product_id).cloned())
    }
}

// =============================================================================
// Order Store
// =============================================================================

/// Records committed orders; fails every commit while `failing` is set.
#[derive(Default, Clone)]
pub struct FakeOrderStore {
    orders: Arc<RwLock<Vec<NewOrder>>>,
    failing: Arc<AtomicBool>,
}

impl FakeOrderStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn orders(&self) -> Vec<NewOrder> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl OrderStore for FakeOrderStore {
    async fn commit(&self, order: &NewOrder) -> ApiResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::new(
                tally_register::ErrorCode::DatabaseError,
                "Database transaction failed",
            ));
        }
        self.orders.write().await.push(order.clone());
        Ok(order.order_id().to_string())
    }
}

/// Blocks inside `commit` until released, to observe an in-flight confirm.
#[derive(Default, Clone)]
pub struct GatedOrderStore {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl OrderStore for GatedOrderStore {
    async fn commit(&self, order: &NewOrder) -> ApiResult<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(order.order_id().to_string())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn product(id: &str, price_cents: i64) -> Product {
    Product {
        id: id.to_string(),
        sku: format!("SKU-{}", id.to_uppercase()),
        name: format!("Product {}", id),
        price_cents,
        stock_quantity: None,
        low_stock_threshold: 5,
        allow_negative_stock: false,
        is_active: true,
    }
}

pub fn notification(reference: &str, amount_cents: i64) -> PaymentNotification {
    PaymentNotification {
        amount_cents,
        sender_name: "Amina Njeri".to_string(),
        sender_phone: "+254712345678".to_string(),
        provider: MobileProvider::Mpesa,
        reference: reference.to_string(),
    }
}

pub struct Harness {
    pub sessions: SessionQueueState,
    pub ledger: PaymentLedgerState,
    pub catalog: InMemoryCatalog,
    pub store: FakeOrderStore,
    pub checkout: CheckoutService,
}

impl Harness {
    /// Checkout over fakes, with "tea" (2.50) and "bun" (1.00) in the catalog.
    pub async fn new() -> Self {
        let sessions = SessionQueueState::new();
        let ledger = PaymentLedgerState::new();
        let catalog = InMemoryCatalog::default();
        catalog.insert(product("tea", 250)).await;
        catalog.insert(product("bun", 100)).await;
        let store = FakeOrderStore::default();

        let checkout = CheckoutService::new(
            sessions.clone(),
            ledger.clone(),
            Arc::new(catalog.clone()),
            Arc::new(store.clone()),
            Default::default(),
            "cashier-01",
        );

        Harness {
            sessions,
            ledger,
            catalog,
            store,
            checkout,
        }
    }

    pub fn active_id(&self) -> String {
        self.sessions.with_queue(|q| q.active_session_id().to_string())
    }

    /// Adds `qty` units of a product to the active session.
    pub async fn ring_up(&self, product_id: &str, qty: usize) {
        for _ in 0..qty {
            self.checkout.add_item(product_id).await.unwrap();
        }
    }
}
