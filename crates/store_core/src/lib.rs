use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use api_client::{ApiResult, BackOfficeApi, MissingBackOfficeApi};
use shared::{
    domain::{
        Category, CategoryId, Customer, CustomerId, Order, OrderId, OrderStatus, Product,
        ProductId, Session, Subscriber, SubscriberId,
    },
    protocol::{CategoryPatch, LoginRequest, OrderFilter, ProductPatch},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod projections;
pub mod slice;

pub use projections::{Assets, OrderDetail, OrderLineView, ProductView};
pub use slice::{CollectionState, RequestState, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

/// Change notifications fanned out to interested views. Lossy by design: a
/// subscriber that cannot keep up drops messages rather than blocking the
/// store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    OrdersChanged,
    ProductsChanged,
    CategoriesChanged,
    ProductCategoriesChanged,
    CustomersChanged,
    SubscribersChanged,
    SessionChanged,
    Notification {
        kind: NotificationKind,
        message: String,
    },
}

#[derive(Debug, Default)]
struct SessionSlice {
    session: Option<Session>,
    status: RequestStatus,
    last_error: Option<String>,
}

/// Every slice lives behind one lock; reducer application is synchronous and
/// atomic with respect to other mutations. The lock is never held across a
/// network await.
#[derive(Default)]
struct StoreState {
    next_seq: u64,
    orders: CollectionState<OrderId, Order>,
    products: CollectionState<ProductId, Product>,
    categories: CollectionState<CategoryId, Category>,
    product_categories: CollectionState<CategoryId, Category>,
    customers: CollectionState<CustomerId, Customer>,
    subscribers: CollectionState<SubscriberId, Subscriber>,
    session: SessionSlice,
    /// Latest optimistic status-edit attempt per order, used to gate
    /// rollback and echo reconciliation.
    status_attempts: HashMap<OrderId, u64>,
}

impl StoreState {
    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Process-wide store for the back-office dashboard. All mutation funnels
/// through the fetch/mutate entry points below; views only ever see owned
/// projections and broadcast events.
pub struct BackOfficeStore {
    api: Arc<dyn BackOfficeApi>,
    assets: Assets,
    state: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl BackOfficeStore {
    pub fn new(api: Arc<dyn BackOfficeApi>, assets: Assets) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            api,
            assets,
            state: Mutex::new(StoreState::default()),
            events,
        })
    }

    /// Store with no backend configured; every fetch fails, projections
    /// still work over whatever state exists.
    pub fn without_api(assets: Assets) -> Arc<Self> {
        Self::new(Arc::new(MissingBackOfficeApi), assets)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, kind: NotificationKind, message: impl Into<String>) {
        self.emit(StoreEvent::Notification {
            kind,
            message: message.into(),
        });
    }

    // --- session ---------------------------------------------------------

    pub async fn login(&self, email: impl Into<String>, password: impl Into<String>) -> Result<Session> {
        {
            let mut state = self.state.lock().await;
            state.session.status = RequestStatus::Loading;
        }

        let request = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        match self.api.login(request).await {
            Ok(session) => {
                self.api.set_auth_token(Some(session.token.clone()));
                {
                    let mut state = self.state.lock().await;
                    state.session.status = RequestStatus::Succeeded;
                    state.session.last_error = None;
                    state.session.session = Some(session.clone());
                }
                self.emit(StoreEvent::SessionChanged);
                info!("store: logged in as {}", session.user.email);
                Ok(session)
            }
            Err(err) => {
                {
                    let mut state = self.state.lock().await;
                    state.session.status = RequestStatus::Failed;
                    state.session.last_error = Some(err.to_string());
                }
                self.emit(StoreEvent::SessionChanged);
                self.notify(NotificationKind::Error, format!("Login failed: {err}"));
                Err(err).context("login failed")
            }
        }
    }

    /// Drop the session and every entity slice. Settlement gates survive, so
    /// a response from before logout can never repopulate state afterwards.
    pub async fn logout(&self) {
        {
            let mut state = self.state.lock().await;
            state.orders.reset();
            state.products.reset();
            state.categories.reset();
            state.product_categories.reset();
            state.customers.reset();
            state.subscribers.reset();
            state.status_attempts.clear();
            state.session.session = None;
            state.session.status = RequestStatus::Idle;
            state.session.last_error = None;
        }
        self.api.set_auth_token(None);
        for event in [
            StoreEvent::SessionChanged,
            StoreEvent::OrdersChanged,
            StoreEvent::ProductsChanged,
            StoreEvent::CategoriesChanged,
            StoreEvent::ProductCategoriesChanged,
            StoreEvent::CustomersChanged,
            StoreEvent::SubscribersChanged,
        ] {
            self.emit(event);
        }
        info!("store: logged out, local state cleared");
    }

    // --- async action protocol -------------------------------------------

    /// Three-phase list fetch: `requested` marks the slice loading before the
    /// call starts, then exactly one of `fulfilled`/`rejected` settles it.
    /// Settlements carry the sequence number assigned at dispatch; the slice
    /// ignores any settlement older than the newest one it has seen.
    async fn run_list_fetch<K, T>(
        &self,
        label: &'static str,
        fetch: impl Future<Output = ApiResult<Vec<T>>>,
        select: fn(&mut StoreState) -> &mut CollectionState<K, T>,
        key: fn(&T) -> K,
        changed: StoreEvent,
    ) -> Result<()>
    where
        K: Eq + Hash + Clone,
    {
        let seq = {
            let mut state = self.state.lock().await;
            let seq = state.bump_seq();
            select(&mut state).begin();
            seq
        };

        match fetch.await {
            Ok(items) => {
                let mut state = self.state.lock().await;
                let slice = select(&mut state);
                if slice.try_settle(seq) {
                    slice.apply_fulfilled(items, key);
                    drop(state);
                    self.emit(changed);
                } else {
                    debug!("store: ignoring stale {label} list response seq={seq}");
                }
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state.lock().await;
                    let slice = select(&mut state);
                    if slice.try_settle(seq) {
                        slice.apply_rejected(err.to_string());
                        drop(state);
                        self.emit(changed);
                    } else {
                        debug!("store: ignoring stale {label} list failure seq={seq}");
                    }
                }
                warn!("store: {label} list fetch failed: {err}");
                Err(err).with_context(|| format!("failed to refresh {label}"))
            }
        }
    }

    /// Same protocol for operations that settle with a single entity (detail
    /// fetch, or a write whose response is the server echo).
    async fn run_entity_sync<K, T>(
        &self,
        label: &'static str,
        fetch: impl Future<Output = ApiResult<T>>,
        select: fn(&mut StoreState) -> &mut CollectionState<K, T>,
        key: fn(&T) -> K,
        changed: StoreEvent,
    ) -> Result<()>
    where
        K: Eq + Hash + Clone,
    {
        let seq = {
            let mut state = self.state.lock().await;
            let seq = state.bump_seq();
            select(&mut state).begin();
            seq
        };

        match fetch.await {
            Ok(item) => {
                let mut state = self.state.lock().await;
                let slice = select(&mut state);
                if slice.try_settle(seq) {
                    let id = key(&item);
                    slice.upsert(id, item);
                    slice.mark_succeeded();
                    drop(state);
                    self.emit(changed);
                } else {
                    debug!("store: ignoring stale {label} response seq={seq}");
                }
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state.lock().await;
                    let slice = select(&mut state);
                    if slice.try_settle(seq) {
                        slice.apply_rejected(err.to_string());
                        drop(state);
                        self.emit(changed);
                    }
                }
                warn!("store: {label} sync failed: {err}");
                Err(err).with_context(|| format!("failed to sync {label}"))
            }
        }
    }

    // --- orders ----------------------------------------------------------

    pub async fn refresh_orders(&self, filter: OrderFilter) -> Result<()> {
        self.run_list_fetch(
            "orders",
            self.api.list_orders(filter),
            |state| &mut state.orders,
            |order| order.id.clone(),
            StoreEvent::OrdersChanged,
        )
        .await
    }

    pub async fn fetch_order(&self, id: &OrderId) -> Result<()> {
        self.run_entity_sync(
            "order",
            self.api.fetch_order(id),
            |state| &mut state.orders,
            |order: &Order| order.id.clone(),
            StoreEvent::OrdersChanged,
        )
        .await
    }

    /// Optimistic status edit. The new status lands in local state (and is
    /// confirmed to the user) before the write resolves; the pre-edit value
    /// is snapshotted per attempt so a failure rolls back to exactly the
    /// status this edit replaced, and only while this attempt is still the
    /// latest one for the order.
    pub async fn update_order_status(&self, id: &OrderId, new_status: OrderStatus) -> Result<()> {
        let (attempt, previous) = {
            let mut state = self.state.lock().await;
            let previous = match state.orders.get(id) {
                Some(order) => order.status,
                None => bail!("unknown order {id}"),
            };
            let attempt = state.bump_seq();
            state.status_attempts.insert(id.clone(), attempt);
            if let Some(order) = state.orders.get_mut(id) {
                order.status = new_status;
            }
            (attempt, previous)
        };
        self.emit(StoreEvent::OrdersChanged);
        self.notify(
            NotificationKind::Success,
            format!("Order {id} status set to {new_status}"),
        );
        info!("store: optimistic status apply order={id} status={new_status} attempt={attempt}");

        match self.api.update_order_status(id, new_status).await {
            Ok(echo) => {
                {
                    let mut state = self.state.lock().await;
                    let still_latest = state.status_attempts.get(id) == Some(&attempt);
                    // Advance the collection gate so an older in-flight list
                    // response cannot undo a confirmed write.
                    let settled = state.orders.try_settle(attempt);
                    if still_latest {
                        state.status_attempts.remove(id);
                        if settled {
                            state.orders.upsert(echo.id.clone(), echo);
                        }
                    }
                }
                self.emit(StoreEvent::OrdersChanged);
                Ok(())
            }
            Err(err) => {
                let rolled_back = {
                    let mut state = self.state.lock().await;
                    if state.status_attempts.get(id) == Some(&attempt) {
                        state.status_attempts.remove(id);
                        if let Some(order) = state.orders.get_mut(id) {
                            order.status = previous;
                        }
                        true
                    } else {
                        // A newer optimistic edit owns the order now; its
                        // settlement decides the final value.
                        false
                    }
                };
                if rolled_back {
                    self.emit(StoreEvent::OrdersChanged);
                }
                self.notify(
                    NotificationKind::Error,
                    format!("Order {id} status change to {new_status} did not persist: {err}"),
                );
                warn!(
                    "store: status update failed order={id} attempt={attempt} rolled_back={rolled_back}: {err}"
                );
                Err(err).with_context(|| format!("failed to update status for order {id}"))
            }
        }
    }

    // --- products --------------------------------------------------------

    pub async fn refresh_products(&self) -> Result<()> {
        self.run_list_fetch(
            "products",
            self.api.list_products(),
            |state| &mut state.products,
            |product| product.id.clone(),
            StoreEvent::ProductsChanged,
        )
        .await
    }

    pub async fn fetch_product(&self, id: &ProductId) -> Result<()> {
        self.run_entity_sync(
            "product",
            self.api.fetch_product(id),
            |state| &mut state.products,
            |product: &Product| product.id.clone(),
            StoreEvent::ProductsChanged,
        )
        .await
    }

    pub async fn update_product(&self, id: &ProductId, patch: ProductPatch) -> Result<()> {
        self.run_entity_sync(
            "product update",
            self.api.update_product(id, patch),
            |state| &mut state.products,
            |product: &Product| product.id.clone(),
            StoreEvent::ProductsChanged,
        )
        .await
    }

    // --- categories ------------------------------------------------------

    pub async fn refresh_categories(&self) -> Result<()> {
        self.run_list_fetch(
            "categories",
            self.api.list_categories(),
            |state| &mut state.categories,
            |category| category.id.clone(),
            StoreEvent::CategoriesChanged,
        )
        .await
    }

    pub async fn update_category(&self, id: &CategoryId, patch: CategoryPatch) -> Result<()> {
        self.run_entity_sync(
            "category update",
            self.api.update_category(id, patch),
            |state| &mut state.categories,
            |category: &Category| category.id.clone(),
            StoreEvent::CategoriesChanged,
        )
        .await
    }

    pub async fn refresh_product_categories(&self) -> Result<()> {
        self.run_list_fetch(
            "product categories",
            self.api.list_product_categories(),
            |state| &mut state.product_categories,
            |category| category.id.clone(),
            StoreEvent::ProductCategoriesChanged,
        )
        .await
    }

    // --- customers & subscribers -----------------------------------------

    pub async fn refresh_customers(&self) -> Result<()> {
        self.run_list_fetch(
            "customers",
            self.api.list_customers(),
            |state| &mut state.customers,
            |customer| customer.id.clone(),
            StoreEvent::CustomersChanged,
        )
        .await
    }

    pub async fn refresh_subscribers(&self) -> Result<()> {
        self.run_list_fetch(
            "subscribers",
            self.api.list_subscribers(),
            |state| &mut state.subscribers,
            |subscriber| subscriber.id.clone(),
            StoreEvent::SubscribersChanged,
        )
        .await
    }

    // --- projections ------------------------------------------------------
    //
    // Read-only, side-effect free, returning owned data. Slice state itself
    // is never handed out.

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.iter().cloned().collect()
    }

    /// Orders in the given status bucket, in stable insertion order.
    pub async fn orders_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.state
            .lock()
            .await
            .orders
            .iter()
            .filter(|order| order.status == status)
            .cloned()
            .collect()
    }

    pub async fn order_detail(&self, id: &OrderId) -> Option<OrderDetail> {
        self.state
            .lock()
            .await
            .orders
            .get(id)
            .map(|order| OrderDetail::resolve(order, &self.assets))
    }

    pub async fn orders_request_state(&self) -> RequestState {
        self.state.lock().await.orders.request_state()
    }

    pub async fn products(&self) -> Vec<ProductView> {
        let state = self.state.lock().await;
        state
            .products
            .iter()
            .map(|product| ProductView::resolve(product, &self.assets))
            .collect()
    }

    pub async fn product_detail(&self, id: &ProductId) -> Option<ProductView> {
        self.state
            .lock()
            .await
            .products
            .get(id)
            .map(|product| ProductView::resolve(product, &self.assets))
    }

    pub async fn products_request_state(&self) -> RequestState {
        self.state.lock().await.products.request_state()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.state.lock().await.categories.iter().cloned().collect()
    }

    pub async fn categories_request_state(&self) -> RequestState {
        self.state.lock().await.categories.request_state()
    }

    pub async fn product_categories(&self) -> Vec<Category> {
        self.state
            .lock()
            .await
            .product_categories
            .iter()
            .cloned()
            .collect()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.state.lock().await.customers.iter().cloned().collect()
    }

    pub async fn subscribers(&self) -> Vec<Subscriber> {
        self.state.lock().await.subscribers.iter().cloned().collect()
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.lock().await.session.session.clone()
    }

    pub async fn session_request_state(&self) -> RequestState {
        let state = self.state.lock().await;
        RequestState {
            status: state.session.status,
            last_error: state.session.last_error.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
