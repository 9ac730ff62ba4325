//! # REST Store Adapter
//!
//! `RemoteStore` over the table-rental REST API.
//!
//! ## Endpoints
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────────┐
//! │ Operation                    │ Request                                  │
//! ├──────────────────────────────┼──────────────────────────────────────────┤
//! │ list_tables                  │ GET    Tables                            │
//! │ list_products                │ GET    Products                          │
//! │ start_session                │ POST   TableSession/start                │
//! │ get_current_session          │ GET    TableSession/table/{id}/current   │
//! │ end_session                  │ PUT    TableSession/end/{id}             │
//! │ upsert_session_product       │ POST   TableSession/product/add-or-update│
//! │ delete_session_product       │ DELETE TableSession/product/delete/{id}  │
//! │ list_past_sessions           │ GET    TableSession/past-sessions?…      │
//! │ get_session_details          │ GET    TableSession/{id}                 │
//! │ list_expenses                │ GET    Expenses?startDate&endDate        │
//! └──────────────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Every request carries `Authorization: Bearer <token>` from the shared
//! [`Credentials`]. Once signed out, requests fail `Unauthorized` before any
//! network I/O.

pub mod dto;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use tabletime_core::{
    BusinessCalendar, Expense, Money, PaymentType, Product, SessionProductLine, Table,
    TableSession,
};

use crate::auth::Credentials;
use crate::error::{StoreError, StoreResult};
use crate::store::{PastSessionQuery, RemoteStore, UpsertLine};
use dto::{
    format_timestamp, EndSessionBody, ErrorBody, ExpenseDto, ProductDto, SessionDto,
    SessionProductDto, StartSessionBody, TableDto, UpsertLineBody,
};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// API root, e.g. `https://localhost:7199/api`.
    pub base_url: String,
    pub timeout: Duration,
    /// Offset applied to timestamps the API sends without one.
    pub naive_offset: FixedOffset,
}

impl HttpStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            naive_offset: BusinessCalendar::utc().offset(),
        }
    }
}

/// REST implementation of [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base: Url,
    credentials: Credentials,
    calendar: BusinessCalendar,
}

impl HttpStore {
    pub fn new(config: HttpStoreConfig, credentials: Credentials) -> StoreResult<Self> {
        let base = normalize_base(&config.base_url)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            credentials,
            calendar: BusinessCalendar::new(config.naive_offset),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| StoreError::validation(format!("Invalid request path '{path}': {e}")))
    }

    fn past_sessions_url(&self, query: &PastSessionQuery) -> StoreResult<Url> {
        let mut url = self.endpoint("TableSession/past-sessions")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("pageNumber", &query.page_number.to_string())
                .append_pair("pageSize", &query.page_size.to_string());
            if let Some(day) = query.date_filter {
                pairs.append_pair("filterByDate", &day.format("%Y-%m-%d").to_string());
            }
            if let Some(name) = query.table_name.as_deref().map(str::trim) {
                if !name.is_empty() {
                    pairs.append_pair("tableName", name);
                }
            }
        }
        Ok(url)
    }

    fn expenses_url(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> StoreResult<Url> {
        let mut url = self.endpoint("Expenses")?;
        if start.is_some() || end.is_some() {
            let mut pairs = url.query_pairs_mut();
            if let Some(day) = start {
                pairs.append_pair("startDate", &format_timestamp(self.calendar.start_of_day(day)));
            }
            if let Some(day) = end {
                pairs.append_pair("endDate", &format_timestamp(self.calendar.end_of_day(day)));
            }
        }
        Ok(url)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn request(&self, method: Method, url: Url) -> StoreResult<RequestBuilder> {
        let ctx = self.credentials.require()?;
        Ok(self.client.request(method, url).bearer_auth(ctx.bearer()))
    }

    /// Sends and maps non-2xx statuses to [`StoreError`].
    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Request failed");
            StoreError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let reason = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::reason);
        debug!(status = status.as_u16(), reason = ?reason, "Request rejected");
        Err(StoreError::from_status(status.as_u16(), reason))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> StoreResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::decode(e.to_string()))
    }

    fn offset(&self) -> FixedOffset {
        self.calendar.offset()
    }
}

/// Makes sure joining a relative path appends to the API root.
fn normalize_base(raw: &str) -> StoreResult<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash)
        .map_err(|e| StoreError::validation(format!("Invalid API URL '{trimmed}': {e}")))
}

// =============================================================================
// RemoteStore
// =============================================================================

#[async_trait]
impl RemoteStore for HttpStore {
    async fn list_tables(&self) -> StoreResult<Vec<Table>> {
        let url = self.endpoint("Tables")?;
        let tables: Vec<TableDto> = self.json(self.request(Method::GET, url)?).await?;
        tables.into_iter().map(Table::try_from).collect()
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let url = self.endpoint("Products")?;
        let products: Vec<ProductDto> = self.json(self.request(Method::GET, url)?).await?;
        products.into_iter().map(Product::try_from).collect()
    }

    async fn start_session(
        &self,
        table_id: &str,
        hourly_price: Money,
    ) -> StoreResult<TableSession> {
        let url = self.endpoint("TableSession/start")?;
        let body = StartSessionBody {
            table_id,
            hourly_price: hourly_price.to_decimal(),
        };
        let dto: SessionDto = self
            .json(self.request(Method::POST, url)?.json(&body))
            .await?;
        dto.into_domain(self.offset())
    }

    async fn get_current_session(&self, table_id: &str) -> StoreResult<Option<TableSession>> {
        let url = self.endpoint(&format!("TableSession/table/{table_id}/current"))?;
        let response = match self.send(self.request(Method::GET, url)?).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let dto: Option<SessionDto> = response
            .json()
            .await
            .map_err(|e| StoreError::decode(e.to_string()))?;
        dto.map(|d| d.into_domain(self.offset())).transpose()
    }

    async fn end_session(
        &self,
        session_id: &str,
        payment_type: PaymentType,
    ) -> StoreResult<TableSession> {
        let url = self.endpoint(&format!("TableSession/end/{session_id}"))?;
        let body = EndSessionBody {
            payment_type: payment_type.wire_code(),
        };
        let dto: SessionDto = self
            .json(self.request(Method::PUT, url)?.json(&body))
            .await?;
        dto.into_domain(self.offset())
    }

    async fn upsert_session_product(
        &self,
        line: &UpsertLine,
    ) -> StoreResult<Option<SessionProductLine>> {
        line.validate()?;
        let url = self.endpoint("TableSession/product/add-or-update")?;
        let body = UpsertLineBody {
            table_session_id: &line.session_id,
            product_id: &line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price.to_decimal(),
        };
        let response = self
            .send(self.request(Method::POST, url)?.json(&body))
            .await?;
        if line.quantity <= 0 || response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let dto: SessionProductDto = response
            .json()
            .await
            .map_err(|e| StoreError::decode(e.to_string()))?;
        dto.into_domain(&line.session_id).map(Some)
    }

    async fn delete_session_product(&self, line_id: &str) -> StoreResult<()> {
        let url = self.endpoint(&format!("TableSession/product/delete/{line_id}"))?;
        self.send(self.request(Method::DELETE, url)?).await?;
        Ok(())
    }

    async fn list_past_sessions(
        &self,
        query: &PastSessionQuery,
    ) -> StoreResult<Vec<TableSession>> {
        query.validate()?;
        let url = self.past_sessions_url(query)?;
        let dtos: Vec<SessionDto> = self.json(self.request(Method::GET, url)?).await?;
        dtos.into_iter()
            .map(|d| d.into_domain(self.offset()))
            .collect()
    }

    async fn get_session_details(&self, session_id: &str) -> StoreResult<TableSession> {
        let url = self.endpoint(&format!("TableSession/{session_id}"))?;
        let dto: SessionDto = self.json(self.request(Method::GET, url)?).await?;
        dto.into_domain(self.offset())
    }

    async fn list_expenses(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>> {
        let url = self.expenses_url(start, end)?;
        let dtos: Vec<ExpenseDto> = self.json(self.request(Method::GET, url)?).await?;
        dtos.into_iter()
            .map(|d| d.into_domain(self.offset()))
            .collect()
    }
}
