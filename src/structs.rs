use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::AppError;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pwd_hash: String,
    pub phone: String,
    pub referral_code: Option<String>,
    pub onboarding_step: i64,
    pub stripe_account_id: Option<String>,
    pub stripe_person_id: Option<String>,
    #[serde(skip_serializing)]
    pub plaid_access_token: Option<String>,
    pub plaid_item_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to persist a user once onboarding completes.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub pwd_hash: String,
    pub phone: String,
    pub referral_code: Option<String>,
    pub onboarding_step: i64,
    pub stripe_account_id: Option<String>,
    pub stripe_person_id: Option<String>,
    pub plaid_access_token: Option<String>,
    pub plaid_item_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Customer {
    pub id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Item {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub created_at: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaxCalculation {
    Inclusive,
    Exclusive,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct TaxRate {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub percentage: f64,
    pub calculation: TaxCalculation,
    pub created_at: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Processing,
    Sent,
    Overdue,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaidStatus {
    Unpaid,
    Paid,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Invoice {
    pub id: String,
    pub user_id: i64,
    pub invoice_number: String,
    pub customer_id: i64,
    pub tax_rate_id: Option<i64>,
    pub invoice_date: i64,
    pub due_date: i64,
    pub subtotal: i64,
    pub total: i64,
    pub amount_due: i64,
    pub notes: Option<String>,
    pub status: InvoiceStatus,
    pub paid_status: PaidStatus,
    pub approved: bool,
    pub approval_requested: bool,
    pub pod: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[sqlx(skip)]
    pub line_items: Vec<LineItem>,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct LineItem {
    pub id: i64,
    pub invoice_id: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub price: i64,
}

/// A line item as submitted, before it has an id.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NewLineItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
    pub price: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Payment {
    pub id: String,
    pub user_id: i64,
    pub stripe_account_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub status: String,
    pub created_at: String,
}

/// Subtotal and total in pence for a set of line items under an optional tax rate.
/// Amounts that do not fit in an `i64` are rejected rather than wrapped.
pub fn invoice_totals(
    line_items: &[NewLineItem],
    tax: Option<&TaxRate>,
) -> Result<(i64, i64), AppError> {
    let too_large = || AppError::Validation("Invoice amount is too large".to_string());
    let sum = line_items.iter().try_fold(0i64, |acc, item| {
        item.quantity
            .checked_mul(item.price)
            .and_then(|line| acc.checked_add(line))
            .ok_or_else(too_large)
    })?;
    let Some(tax) = tax else {
        return Ok((sum, sum));
    };
    let tax_amount = (sum as f64 * tax.percentage / 100.0).round() as i64;
    match tax.calculation {
        TaxCalculation::Exclusive => {
            let total = sum.checked_add(tax_amount).ok_or_else(too_large)?;
            Ok((sum, total))
        }
        TaxCalculation::Inclusive => {
            let subtotal = sum.checked_sub(tax_amount).ok_or_else(too_large)?;
            Ok((subtotal, sum))
        }
    }
}
