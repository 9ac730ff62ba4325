//! Wire DTOs for the REST API.
//!
//! The API speaks camelCase JSON with decimal prices, ids that may be numbers
//! or strings, and timestamps that may lack an offset. Everything here is
//! converted into the domain types at the edge and never leaks further.
//!
//! Prices carry at most two decimals. Anything finer is refused as a decode
//! error rather than rounded.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use tabletime_core::{
    Expense, Money, PaymentType, Product, SessionProductLine, Table, TableSession,
};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Field helpers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RawText {
    Text(String),
    Integer(i64),
    Decimal(f64),
}

impl From<RawText> for String {
    fn from(raw: RawText) -> Self {
        match raw {
            RawText::Text(s) => s,
            RawText::Integer(n) => n.to_string(),
            RawText::Decimal(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawText::deserialize(d).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<RawText>::deserialize(d).map(|raw| raw.map(String::from))
}

/// Numeric ids travel as JSON numbers, anything else as a string.
fn id_as_wire<S: Serializer>(id: &str, s: S) -> Result<S::Ok, S::Error> {
    match id.parse::<i64>() {
        Ok(n) => s.serialize_i64(n),
        Err(_) => s.serialize_str(id),
    }
}

/// Amounts closer than this to a whole cent are float noise, not precision.
const CENT_TOLERANCE: f64 = 1e-6;

/// Converts a decimal amount from the wire into [`Money`].
fn wire_money(field: &str, amount: f64) -> StoreResult<Money> {
    if !amount.is_finite() {
        return Err(StoreError::decode(format!("{field} is not a number")));
    }
    let cents = amount * 100.0;
    if (cents - cents.round()).abs() > CENT_TOLERANCE {
        return Err(StoreError::decode(format!(
            "{field} {amount} has more than two decimals"
        )));
    }
    Ok(Money::round_from_decimal(amount))
}

/// Parses an API timestamp.
///
/// Offset-less values are read in `naive_offset`.
pub fn parse_timestamp(raw: &str, naive_offset: FixedOffset) -> StoreResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| StoreError::decode(format!("Unreadable timestamp '{raw}': {e}")))?;
    naive_offset
        .from_local_datetime(&naive)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| StoreError::decode(format!("Ambiguous timestamp '{raw}'")))
}

/// Formats an instant the way the API expects query timestamps.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// =============================================================================
// Responses
// =============================================================================

/// Body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ErrorBody {
    pub fn reason(self) -> Option<String> {
        self.message
            .filter(|m| !m.trim().is_empty())
            .or(self.title)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub table_name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub table_type: Option<String>,
    #[serde(default)]
    pub current_hourly_price: f64,
    #[serde(default)]
    pub is_active: bool,
}

impl TryFrom<TableDto> for Table {
    type Error = StoreError;

    fn try_from(dto: TableDto) -> StoreResult<Self> {
        Ok(Table {
            current_hourly_price: wire_money("currentHourlyPrice", dto.current_hourly_price)?,
            id: dto.id,
            name: dto.table_name,
            table_type: dto.table_type,
            is_active: dto.is_active,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
}

impl TryFrom<ProductDto> for Product {
    type Error = StoreError;

    fn try_from(dto: ProductDto) -> StoreResult<Self> {
        Ok(Product {
            price: wire_money("price", dto.price)?,
            id: dto.id,
            name: dto.name,
            description: dto.description,
            stock: dto.stock,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProductDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub table_session_id: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub product_id: String,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: f64,
}

impl SessionProductDto {
    /// `session_id` fills in when the line does not name its session.
    pub fn into_domain(self, session_id: &str) -> StoreResult<SessionProductLine> {
        Ok(SessionProductLine {
            unit_price: wire_money("unitPrice", self.unit_price)?,
            id: self.id,
            session_id: self
                .table_session_id
                .unwrap_or_else(|| session_id.to_string()),
            product_id: self.product_id,
            product_name: self.product_name.unwrap_or_default(),
            quantity: self.quantity,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub table_id: String,
    #[serde(default)]
    pub table_name: Option<String>,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub hourly_price: f64,
    #[serde(default)]
    pub session_products: Vec<SessionProductDto>,
    #[serde(default)]
    pub payment_type: Option<i32>,
}

impl SessionDto {
    pub fn into_domain(self, naive_offset: FixedOffset) -> StoreResult<TableSession> {
        let start_time = parse_timestamp(&self.start_time, naive_offset)?;
        let end_time = self
            .end_time
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_timestamp(raw, naive_offset))
            .transpose()?;
        let payment_type = self
            .payment_type
            .map(PaymentType::try_from)
            .transpose()
            .map_err(|e| StoreError::decode(e.to_string()))?;
        let lines = self
            .session_products
            .into_iter()
            .map(|line| line.into_domain(&self.id))
            .collect::<StoreResult<Vec<_>>>()?;
        let hourly_price = wire_money("hourlyPrice", self.hourly_price)?;

        Ok(TableSession {
            id: self.id,
            table_id: self.table_id,
            table_name: self.table_name.unwrap_or_default(),
            start_time,
            end_time,
            hourly_price,
            lines,
            payment_type,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: f64,
    pub created_at: String,
}

impl ExpenseDto {
    pub fn into_domain(self, naive_offset: FixedOffset) -> StoreResult<Expense> {
        Ok(Expense {
            spent_at: parse_timestamp(&self.created_at, naive_offset)?,
            id: self.id,
            name: self.name,
            amount: wire_money("amount", self.amount)?,
            description: self.description,
        })
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionBody<'a> {
    #[serde(serialize_with = "id_as_wire")]
    pub table_id: &'a str,
    pub hourly_price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionBody {
    pub payment_type: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLineBody<'a> {
    #[serde(serialize_with = "id_as_wire")]
    pub table_session_id: &'a str,
    #[serde(serialize_with = "id_as_wire")]
    pub product_id: &'a str,
    pub quantity: i64,
    pub unit_price: f64,
}
