use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    domain::{
        Category, CategoryId, Customer, Order, OrderId, OrderStatus, Product, ProductId, Session,
        Subscriber,
    },
    protocol::{CategoryPatch, LoginRequest, OrderFilter, ProductPatch, UpdateOrderStatusRequest},
};
use tracing::debug;

pub mod error;

pub use error::ApiClientError;

pub type ApiResult<T> = Result<T, ApiClientError>;

/// Remote back-office API, one method per endpoint the dashboard consumes.
/// No retries and no shared-state side effects at this layer; retry policy
/// belongs to the caller.
#[async_trait]
pub trait BackOfficeApi: Send + Sync {
    async fn login(&self, request: LoginRequest) -> ApiResult<Session>;

    async fn fetch_order(&self, id: &OrderId) -> ApiResult<Order>;
    async fn list_orders(&self, filter: OrderFilter) -> ApiResult<Vec<Order>>;
    async fn update_order_status(&self, id: &OrderId, status: OrderStatus) -> ApiResult<Order>;

    async fn fetch_product(&self, id: &ProductId) -> ApiResult<Product>;
    async fn list_products(&self) -> ApiResult<Vec<Product>>;
    async fn update_product(&self, id: &ProductId, patch: ProductPatch) -> ApiResult<Product>;

    async fn list_categories(&self) -> ApiResult<Vec<Category>>;
    async fn update_category(&self, id: &CategoryId, patch: CategoryPatch) -> ApiResult<Category>;
    async fn list_product_categories(&self) -> ApiResult<Vec<Category>>;

    async fn list_customers(&self) -> ApiResult<Vec<Customer>>;
    async fn list_subscribers(&self) -> ApiResult<Vec<Subscriber>>;

    /// Attach (or clear) the bearer token used for subsequent requests.
    fn set_auth_token(&self, token: Option<String>);
}

/// Default dependency when no server is configured; every call fails.
pub struct MissingBackOfficeApi;

#[async_trait]
impl BackOfficeApi for MissingBackOfficeApi {
    async fn login(&self, _request: LoginRequest) -> ApiResult<Session> {
        Err(ApiClientError::unavailable())
    }

    async fn fetch_order(&self, _id: &OrderId) -> ApiResult<Order> {
        Err(ApiClientError::unavailable())
    }

    async fn list_orders(&self, _filter: OrderFilter) -> ApiResult<Vec<Order>> {
        Err(ApiClientError::unavailable())
    }

    async fn update_order_status(&self, _id: &OrderId, _status: OrderStatus) -> ApiResult<Order> {
        Err(ApiClientError::unavailable())
    }

    async fn fetch_product(&self, _id: &ProductId) -> ApiResult<Product> {
        Err(ApiClientError::unavailable())
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        Err(ApiClientError::unavailable())
    }

    async fn update_product(&self, _id: &ProductId, _patch: ProductPatch) -> ApiResult<Product> {
        Err(ApiClientError::unavailable())
    }

    async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        Err(ApiClientError::unavailable())
    }

    async fn update_category(&self, _id: &CategoryId, _patch: CategoryPatch) -> ApiResult<Category> {
        Err(ApiClientError::unavailable())
    }

    async fn list_product_categories(&self) -> ApiResult<Vec<Category>> {
        Err(ApiClientError::unavailable())
    }

    async fn list_customers(&self) -> ApiResult<Vec<Customer>> {
        Err(ApiClientError::unavailable())
    }

    async fn list_subscribers(&self) -> ApiResult<Vec<Subscriber>> {
        Err(ApiClientError::unavailable())
    }

    fn set_auth_token(&self, _token: Option<String>) {}
}

/// reqwest-backed implementation speaking the backend's JSON dialect.
pub struct HttpBackOfficeApi {
    http: Client,
    server_url: String,
    auth_token: RwLock<Option<String>>,
}

impl HttpBackOfficeApi {
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url = server_url.into();
        Self {
            http: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            auth_token: RwLock::new(None),
        }
    }

    /// Ids are interpolated into request paths verbatim, so anything that
    /// could reroute the request is rejected before it is built.
    fn path_id(id: &str) -> ApiResult<&str> {
        let routable = !id.is_empty()
            && !id.chars().any(|c| {
                matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
            });
        if routable {
            Ok(id)
        } else {
            Err(ApiClientError::invalid_id(id))
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .auth_token
            .read()
            .ok()
            .and_then(|guard| guard.clone());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(ApiClientError::transport)?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiClientError::Status {
                code: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(ApiClientError::transport)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        debug!("api: GET {path}");
        self.execute(self.http.get(format!("{}{path}", self.server_url)))
            .await
    }

    async fn get_with_query<T: DeserializeOwned, Q: Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> ApiResult<T> {
        debug!("api: GET {path} (filtered)");
        self.execute(
            self.http
                .get(format!("{}{path}", self.server_url))
                .query(query),
        )
        .await
    }

    async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        debug!("api: PATCH {path}");
        self.execute(
            self.http
                .patch(format!("{}{path}", self.server_url))
                .json(body),
        )
        .await
    }
}

#[async_trait]
impl BackOfficeApi for HttpBackOfficeApi {
    async fn login(&self, request: LoginRequest) -> ApiResult<Session> {
        debug!("api: POST /api/auth/login");
        self.execute(
            self.http
                .post(format!("{}/api/auth/login", self.server_url))
                .json(&request),
        )
        .await
    }

    async fn fetch_order(&self, id: &OrderId) -> ApiResult<Order> {
        let id = Self::path_id(id.as_str())?;
        self.get(&format!("/api/orders/{id}")).await
    }

    async fn list_orders(&self, filter: OrderFilter) -> ApiResult<Vec<Order>> {
        self.get_with_query("/api/orders", &filter).await
    }

    async fn update_order_status(&self, id: &OrderId, status: OrderStatus) -> ApiResult<Order> {
        let id = Self::path_id(id.as_str())?;
        self.patch(
            &format!("/api/orders/{id}"),
            &UpdateOrderStatusRequest { status },
        )
        .await
    }

    async fn fetch_product(&self, id: &ProductId) -> ApiResult<Product> {
        let id = Self::path_id(id.as_str())?;
        self.get(&format!("/api/products/{id}")).await
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        self.get("/api/products").await
    }

    async fn update_product(&self, id: &ProductId, patch: ProductPatch) -> ApiResult<Product> {
        let id = Self::path_id(id.as_str())?;
        self.patch(&format!("/api/products/{id}"), &patch).await
    }

    async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        self.get("/api/categories").await
    }

    async fn update_category(&self, id: &CategoryId, patch: CategoryPatch) -> ApiResult<Category> {
        let id = Self::path_id(id.as_str())?;
        self.patch(&format!("/api/categories/{id}"), &patch).await
    }

    async fn list_product_categories(&self) -> ApiResult<Vec<Category>> {
        self.get("/api/product-categories").await
    }

    async fn list_customers(&self) -> ApiResult<Vec<Customer>> {
        self.get("/api/customers").await
    }

    async fn list_subscribers(&self) -> ApiResult<Vec<Subscriber>> {
        self.get("/api/subscribers").await
    }

    fn set_auth_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.auth_token.write() {
            *guard = token;
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
