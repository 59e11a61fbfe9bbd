//! Typed procedures for the dashboard, served in the tRPC wire envelope.
//!
//! Queries are `GET /server/trpc/{name}?input=<json>`, mutations are
//! `POST /server/trpc/{name}` with a JSON body. Responses are wrapped as
//! `{"result":{"data":...}}` or `{"error":{"message","code","httpStatus"}}`.

use std::{collections::HashMap, fmt, str::FromStr};

use actix_web::{
    http::Method,
    route,
    web::{self, Bytes, Data},
    HttpRequest, HttpResponse,
};
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, InvoiceChanges, NewInvoice},
    errors::AppError,
    routes::plaid::{account_linked, link_business_account},
    structs::{InvoiceStatus, NewLineItem, PaidStatus, TaxCalculation},
    AppState,
};

const MIN_PAYMENT_TERMS_SECS: i64 = 3 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureKind::Query => write!(f, "query"),
            ProcedureKind::Mutation => write!(f, "mutation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    GetCustomers,
    CreateCustomer,
    GetItems,
    CreateItem,
    GetTaxRates,
    CreateTaxRate,
    CreateInvoice,
    GetInvoices,
    UpdateInvoice,
    GetPayments,
    CheckAccountLinked,
    LinkBusinessBankAccount,
}

impl Procedure {
    pub fn kind(&self) -> ProcedureKind {
        match self {
            Procedure::GetCustomers
            | Procedure::GetItems
            | Procedure::GetTaxRates
            | Procedure::GetInvoices
            | Procedure::GetPayments
            | Procedure::CheckAccountLinked => ProcedureKind::Query,
            Procedure::CreateCustomer
            | Procedure::CreateItem
            | Procedure::CreateTaxRate
            | Procedure::CreateInvoice
            | Procedure::UpdateInvoice
            | Procedure::LinkBusinessBankAccount => ProcedureKind::Mutation,
        }
    }

    fn method(&self) -> Method {
        match self.kind() {
            ProcedureKind::Query => Method::GET,
            ProcedureKind::Mutation => Method::POST,
        }
    }
}

impl FromStr for Procedure {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "getCustomers" => Ok(Procedure::GetCustomers),
            "createCustomer" => Ok(Procedure::CreateCustomer),
            "getItems" => Ok(Procedure::GetItems),
            "createItem" => Ok(Procedure::CreateItem),
            "getTaxRates" => Ok(Procedure::GetTaxRates),
            "createTaxRate" => Ok(Procedure::CreateTaxRate),
            "createInvoice" => Ok(Procedure::CreateInvoice),
            "invoice.getInvoices" => Ok(Procedure::GetInvoices),
            "invoice.updateInvoice" => Ok(Procedure::UpdateInvoice),
            "getPayments" => Ok(Procedure::GetPayments),
            "auth.checkAccountLinked" => Ok(Procedure::CheckAccountLinked),
            "auth.linkBusinessBankAccount" => Ok(Procedure::LinkBusinessBankAccount),
            other => Err(AppError::NotFound(format!(
                "No procedure found on path \"{}\"",
                other
            ))),
        }
    }
}

/// Accepts ids sent either as numbers or as numeric strings.
fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid id: {:?}", text))),
    }
}

/// Money arrives as a JSON number of pence, possibly with float noise.
fn pence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(de::Error::custom("amount must be a finite number"));
    }
    Ok(value.round() as i64)
}

#[derive(Debug, Deserialize)]
struct UserInput {
    #[serde(rename = "userId", deserialize_with = "flexible_id")]
    user_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
struct CustomerInput {
    #[serde(rename = "userId", deserialize_with = "flexible_id")]
    user_id: i64,
    #[validate(length(min = 1, message = "Display name is required"))]
    display_name: String,
    company: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct ItemInput {
    #[serde(rename = "userId", deserialize_with = "flexible_id")]
    user_id: i64,
    #[validate(length(min = 1, message = "Item name is required"))]
    name: String,
    description: Option<String>,
    #[serde(deserialize_with = "pence")]
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    price: i64,
}

#[derive(Debug, Deserialize, Validate)]
struct TaxRateInput {
    #[serde(rename = "userId", deserialize_with = "flexible_id")]
    user_id: i64,
    #[validate(length(min = 1, message = "Tax rate name is required"))]
    name: String,
    description: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "Percentage must be between 0 and 100"))]
    percentage: f64,
    calculation: TaxCalculation,
}

#[derive(Debug, Deserialize)]
struct TaxRateRef {
    #[serde(deserialize_with = "flexible_id")]
    id: i64,
}

#[derive(Debug, Deserialize, Validate)]
struct LineItemInput {
    #[validate(length(min = 1, message = "Line item name is required"))]
    name: String,
    description: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: i64,
    #[serde(deserialize_with = "pence")]
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    price: i64,
}

#[derive(Debug, Deserialize, Validate)]
struct InvoiceInput {
    #[serde(rename = "userId", deserialize_with = "flexible_id")]
    user_id: i64,
    invoice_id: Option<String>,
    #[validate(length(min = 1, message = "Invoice number is required"))]
    invoice_number: String,
    #[serde(deserialize_with = "flexible_id")]
    customer: i64,
    invoice_date: i64,
    due_date: i64,
    tax_rate: Option<TaxRateRef>,
    notes: Option<String>,
    #[validate(nested)]
    line_items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize)]
struct UpdateInvoiceInput {
    #[serde(rename = "userId", deserialize_with = "flexible_id")]
    user_id: i64,
    invoice_id: String,
    status: Option<InvoiceStatus>,
    paid_status: Option<PaidStatus>,
    approved: Option<bool>,
    pod: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmailInput {
    Bare(String),
    Object { email: String },
}

impl EmailInput {
    fn into_email(self) -> Result<String, AppError> {
        let email = match self {
            EmailInput::Bare(email) | EmailInput::Object { email } => email,
        };
        if email.trim().is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        Ok(email)
    }
}

fn parse<T: DeserializeOwned>(input: Value) -> Result<T, AppError> {
    serde_json::from_value(input).map_err(|e| AppError::Validation(e.to_string()))
}

fn read_input(req: &HttpRequest, body: &Bytes) -> Result<Value, AppError> {
    if req.method() == Method::GET {
        let params: HashMap<String, String> = serde_urlencoded::from_str(req.query_string())
            .map_err(|e| AppError::Validation(e.to_string()))?;
        return match params.get("input") {
            Some(raw) => serde_json::from_str(raw).map_err(|e| AppError::Validation(e.to_string())),
            None => Ok(Value::Null),
        };
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(e.to_string()))
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn create_invoice(state: &AppState, input: InvoiceInput) -> Result<Value, AppError> {
    input.validate()?;
    if input.line_items.is_empty() {
        return Err(AppError::Validation(
            "At least one line item is required".to_string(),
        ));
    }
    let terms = input
        .due_date
        .checked_sub(input.invoice_date)
        .ok_or_else(|| AppError::Validation("Invalid invoice or due date".to_string()))?;
    if terms < MIN_PAYMENT_TERMS_SECS {
        return Err(AppError::Validation(
            "Due date must be at least 3 days after the invoice date".to_string(),
        ));
    }
    if db::invoice_number_exists(&state.db_pool, input.user_id, &input.invoice_number).await? {
        return Err(AppError::Validation(
            "Invoice number has already been used".to_string(),
        ));
    }

    let id = optional(input.invoice_id)
        .unwrap_or_else(|| format!("inv_{}", Uuid::new_v4().simple()));
    let line_items = input
        .line_items
        .into_iter()
        .map(|item| NewLineItem {
            name: item.name,
            description: optional(item.description),
            quantity: item.quantity,
            price: item.price,
        })
        .collect();

    let invoice = db::create_invoice(
        &state.db_pool,
        NewInvoice {
            id,
            user_id: input.user_id,
            invoice_number: input.invoice_number,
            customer_id: input.customer,
            tax_rate_id: input.tax_rate.map(|rate| rate.id),
            invoice_date: input.invoice_date,
            due_date: input.due_date,
            notes: optional(input.notes),
            line_items,
        },
    )
    .await?;
    Ok(serde_json::to_value(invoice)?)
}

async fn dispatch(state: &AppState, procedure: Procedure, input: Value) -> Result<Value, AppError> {
    let pool = &state.db_pool;
    let data = match procedure {
        Procedure::GetCustomers => {
            let input: UserInput = parse(input)?;
            serde_json::to_value(db::get_customers(pool, input.user_id).await?)?
        }
        Procedure::CreateCustomer => {
            let input: CustomerInput = parse(input)?;
            input.validate()?;
            let customer = db::create_customer(
                pool,
                input.user_id,
                &input.display_name,
                input.company.as_deref(),
                input.email.as_deref(),
                input.phone.as_deref(),
                input.address.as_deref(),
            )
            .await?;
            serde_json::to_value(customer)?
        }
        Procedure::GetItems => {
            let input: UserInput = parse(input)?;
            serde_json::to_value(db::get_items(pool, input.user_id).await?)?
        }
        Procedure::CreateItem => {
            let input: ItemInput = parse(input)?;
            input.validate()?;
            let item = db::create_item(
                pool,
                input.user_id,
                &input.name,
                input.description.as_deref(),
                input.price,
            )
            .await?;
            serde_json::to_value(item)?
        }
        Procedure::GetTaxRates => {
            let input: UserInput = parse(input)?;
            serde_json::to_value(db::get_tax_rates(pool, input.user_id).await?)?
        }
        Procedure::CreateTaxRate => {
            let input: TaxRateInput = parse(input)?;
            input.validate()?;
            let rate = db::create_tax_rate(
                pool,
                input.user_id,
                &input.name,
                input.description.as_deref(),
                input.percentage,
                input.calculation,
            )
            .await?;
            serde_json::to_value(rate)?
        }
        Procedure::CreateInvoice => create_invoice(state, parse(input)?).await?,
        Procedure::GetInvoices => {
            let input: UserInput = parse(input)?;
            serde_json::to_value(db::get_invoices(pool, input.user_id).await?)?
        }
        Procedure::UpdateInvoice => {
            let input: UpdateInvoiceInput = parse(input)?;
            let changes = InvoiceChanges {
                status: input.status,
                paid_status: input.paid_status,
                approved: input.approved,
                pod: optional(input.pod),
            };
            let invoice =
                db::update_invoice(pool, input.user_id, &input.invoice_id, changes).await?;
            serde_json::to_value(invoice)?
        }
        Procedure::GetPayments => {
            let input: UserInput = parse(input)?;
            serde_json::to_value(db::get_payments(pool, input.user_id).await?)?
        }
        Procedure::CheckAccountLinked => {
            let email = parse::<EmailInput>(input)?.into_email()?;
            Value::Bool(account_linked(state, &email).await?)
        }
        Procedure::LinkBusinessBankAccount => {
            let email = parse::<EmailInput>(input)?.into_email()?;
            serde_json::to_value(link_business_account(state, &email).await?)?
        }
    };
    Ok(data)
}

async fn call(
    state: &AppState,
    req: &HttpRequest,
    path: &str,
    body: &Bytes,
) -> Result<Value, AppError> {
    let procedure: Procedure = path.parse()?;
    if req.method() != procedure.method() {
        return Err(AppError::MethodNotAllowed(format!(
            "Unsupported {}-request to {} procedure at path \"{}\"",
            req.method(),
            procedure.kind(),
            path
        )));
    }
    let input = read_input(req, body)?;
    dispatch(state, procedure, input).await
}

#[route("/server/trpc/{procedure}", method = "GET", method = "POST")]
pub async fn rpc_handler(
    state: Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: Bytes,
) -> HttpResponse {
    match call(&state, &req, &path, &body).await {
        Ok(data) => HttpResponse::Ok().json(json!({ "result": { "data": data } })),
        Err(err) => err.rpc_response(),
    }
}
