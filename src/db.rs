use sqlx::SqlitePool;

use crate::{
    errors::AppError,
    structs::{
        invoice_totals, Customer, Invoice, InvoiceStatus, Item, LineItem, NewLineItem, NewUser,
        PaidStatus, Payment, TaxCalculation, TaxRate, User,
    },
    utils::now,
};

/// Turns a unique-constraint failure into a client error instead of a 500.
fn conflict(err: sqlx::Error, message: &str) -> AppError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => AppError::Validation(message.to_string()),
        _ => AppError::DatabaseError(err),
    }
}

pub async fn create_user(pool: &SqlitePool, new_user: NewUser) -> Result<User, AppError> {
    let created_at = now();
    let full_name = format!("{} {}", new_user.firstname, new_user.lastname);
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (firstname, lastname, full_name, email, pwd_hash, phone, referral_code, \
         onboarding_step, stripe_account_id, stripe_person_id, plaid_access_token, plaid_item_id, \
         created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
    )
    .bind(&new_user.firstname)
    .bind(&new_user.lastname)
    .bind(full_name)
    .bind(&new_user.email)
    .bind(&new_user.pwd_hash)
    .bind(&new_user.phone)
    .bind(&new_user.referral_code)
    .bind(new_user.onboarding_step)
    .bind(&new_user.stripe_account_id)
    .bind(&new_user.stripe_person_id)
    .bind(&new_user.plaid_access_token)
    .bind(&new_user.plaid_item_id)
    .bind(&created_at)
    .bind(&created_at)
    .fetch_one(pool)
    .await?;
    log::info!("User created: {}", user.email);
    Ok(user)
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Stores the bank-link tokens on an existing user. Returns false when no user has this email.
pub async fn set_user_bank_link(
    pool: &SqlitePool,
    email: &str,
    access_token: &str,
    item_id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE users SET plaid_access_token = $1, plaid_item_id = $2, updated_at = $3 \
         WHERE email = $4",
    )
    .bind(access_token)
    .bind(item_id)
    .bind(now())
    .bind(email)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn create_customer(
    pool: &SqlitePool,
    user_id: i64,
    display_name: &str,
    company: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
    address: Option<&str>,
) -> Result<Customer, AppError> {
    let customer = sqlx::query_as::<_, Customer>(
        "INSERT INTO customers (user_id, display_name, company, email, phone, address, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(user_id)
    .bind(display_name)
    .bind(company)
    .bind(email)
    .bind(phone)
    .bind(address)
    .bind(now())
    .fetch_one(pool)
    .await?;
    log::info!("Customer {} created for user {}", customer.id, user_id);
    Ok(customer)
}

pub async fn get_customers(pool: &SqlitePool, user_id: i64) -> Result<Vec<Customer>, AppError> {
    let customers =
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(customers)
}

async fn customer_belongs_to(
    pool: &SqlitePool,
    user_id: i64,
    customer_id: i64,
) -> Result<bool, AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM customers WHERE id = $1 AND user_id = $2")
            .bind(customer_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

pub async fn create_item(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    description: Option<&str>,
    price: i64,
) -> Result<Item, AppError> {
    let item = sqlx::query_as::<_, Item>(
        "INSERT INTO items (user_id, name, description, price, created_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(price)
    .bind(now())
    .fetch_one(pool)
    .await?;
    Ok(item)
}

pub async fn get_items(pool: &SqlitePool, user_id: i64) -> Result<Vec<Item>, AppError> {
    let items = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE user_id = $1 ORDER BY id")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(items)
}

pub async fn create_tax_rate(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    description: Option<&str>,
    percentage: f64,
    calculation: TaxCalculation,
) -> Result<TaxRate, AppError> {
    let tax_rate = sqlx::query_as::<_, TaxRate>(
        "INSERT INTO tax_rates (user_id, name, description, percentage, calculation, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(percentage)
    .bind(calculation)
    .bind(now())
    .fetch_one(pool)
    .await?;
    Ok(tax_rate)
}

pub async fn get_tax_rates(pool: &SqlitePool, user_id: i64) -> Result<Vec<TaxRate>, AppError> {
    let rates =
        sqlx::query_as::<_, TaxRate>("SELECT * FROM tax_rates WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(rates)
}

pub async fn get_tax_rate(
    pool: &SqlitePool,
    user_id: i64,
    id: i64,
) -> Result<Option<TaxRate>, AppError> {
    let rate = sqlx::query_as::<_, TaxRate>(
        "SELECT * FROM tax_rates WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(rate)
}

pub async fn invoice_number_exists(
    pool: &SqlitePool,
    user_id: i64,
    invoice_number: &str,
) -> Result<bool, AppError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM invoices WHERE user_id = $1 AND invoice_number = $2")
            .bind(user_id)
            .bind(invoice_number)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

pub struct NewInvoice {
    pub id: String,
    pub user_id: i64,
    pub invoice_number: String,
    pub customer_id: i64,
    pub tax_rate_id: Option<i64>,
    pub invoice_date: i64,
    pub due_date: i64,
    pub notes: Option<String>,
    pub line_items: Vec<NewLineItem>,
}

/// Inserts the invoice and its line items in one transaction. Totals are
/// derived from the line items and the referenced tax rate.
pub async fn create_invoice(pool: &SqlitePool, new: NewInvoice) -> Result<Invoice, AppError> {
    if !customer_belongs_to(pool, new.user_id, new.customer_id).await? {
        return Err(AppError::NotFound(format!(
            "Customer {} does not exist",
            new.customer_id
        )));
    }
    let tax = match new.tax_rate_id {
        Some(id) => Some(
            get_tax_rate(pool, new.user_id, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Tax rate {} does not exist", id)))?,
        ),
        None => None,
    };
    let (subtotal, total) = invoice_totals(&new.line_items, tax.as_ref())?;
    let created_at = now();

    let mut tx = pool.begin().await?;
    let mut invoice = sqlx::query_as::<_, Invoice>(
        "INSERT INTO invoices (id, user_id, invoice_number, customer_id, tax_rate_id, invoice_date, \
         due_date, subtotal, total, amount_due, notes, status, paid_status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING *",
    )
    .bind(&new.id)
    .bind(new.user_id)
    .bind(&new.invoice_number)
    .bind(new.customer_id)
    .bind(new.tax_rate_id)
    .bind(new.invoice_date)
    .bind(new.due_date)
    .bind(subtotal)
    .bind(total)
    .bind(total)
    .bind(&new.notes)
    .bind(InvoiceStatus::Draft)
    .bind(PaidStatus::Unpaid)
    .bind(&created_at)
    .bind(&created_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict(e, "An invoice with this id or number already exists"))?;

    for item in &new.line_items {
        let line_item = sqlx::query_as::<_, LineItem>(
            "INSERT INTO invoice_line_items (invoice_id, name, description, quantity, price) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(&invoice.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.price)
        .fetch_one(&mut *tx)
        .await?;
        invoice.line_items.push(line_item);
    }
    tx.commit().await?;

    log::info!(
        "Invoice {} ({}) created for user {}",
        invoice.id,
        invoice.invoice_number,
        invoice.user_id
    );
    Ok(invoice)
}

pub async fn get_invoices(pool: &SqlitePool, user_id: i64) -> Result<Vec<Invoice>, AppError> {
    let mut invoices = sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE user_id = $1 ORDER BY invoice_date DESC, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let line_items = sqlx::query_as::<_, LineItem>(
        "SELECT li.* FROM invoice_line_items li \
         JOIN invoices i ON i.id = li.invoice_id \
         WHERE i.user_id = $1 ORDER BY li.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    for item in line_items {
        if let Some(invoice) = invoices.iter_mut().find(|i| i.id == item.invoice_id) {
            invoice.line_items.push(item);
        }
    }
    Ok(invoices)
}

pub async fn get_invoice(
    pool: &SqlitePool,
    user_id: i64,
    id: &str,
) -> Result<Option<Invoice>, AppError> {
    let invoice = sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    let Some(mut invoice) = invoice else {
        return Ok(None);
    };
    invoice.line_items = sqlx::query_as::<_, LineItem>(
        "SELECT * FROM invoice_line_items WHERE invoice_id = $1 ORDER BY id",
    )
    .bind(&invoice.id)
    .fetch_all(pool)
    .await?;
    Ok(Some(invoice))
}

#[derive(Debug, Default)]
pub struct InvoiceChanges {
    pub status: Option<InvoiceStatus>,
    pub paid_status: Option<PaidStatus>,
    pub approved: Option<bool>,
    pub pod: Option<String>,
}

pub async fn update_invoice(
    pool: &SqlitePool,
    user_id: i64,
    id: &str,
    changes: InvoiceChanges,
) -> Result<Invoice, AppError> {
    let Some(current) = get_invoice(pool, user_id, id).await? else {
        return Err(AppError::NotFound(format!("Invoice {} does not exist", id)));
    };

    let status = changes.status.unwrap_or(current.status);
    let approval_requested =
        current.approval_requested || changes.status == Some(InvoiceStatus::Processing);
    let paid_status = changes.paid_status.unwrap_or(current.paid_status);
    let amount_due = match paid_status {
        PaidStatus::Paid => 0,
        PaidStatus::Unpaid => current.total,
    };
    let approved = changes.approved.unwrap_or(current.approved);
    let pod = changes.pod.or(current.pod);

    sqlx::query(
        "UPDATE invoices SET status = $1, approval_requested = $2, paid_status = $3, \
         amount_due = $4, approved = $5, pod = $6, updated_at = $7 \
         WHERE id = $8 AND user_id = $9",
    )
    .bind(status)
    .bind(approval_requested)
    .bind(paid_status)
    .bind(amount_due)
    .bind(approved)
    .bind(&pod)
    .bind(now())
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    log::info!("Invoice {} updated: status={:?} paid={:?}", id, status, paid_status);
    get_invoice(pool, user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invoice {} does not exist", id)))
}

/// Flags unpaid invoices past their due date. Drafts are never flagged.
pub async fn mark_overdue_invoices(pool: &SqlitePool, now_unix: i64) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE invoices SET status = $1, updated_at = $2 \
         WHERE due_date < $3 AND paid_status = $4 AND status IN ($5, $6)",
    )
    .bind(InvoiceStatus::Overdue)
    .bind(now())
    .bind(now_unix)
    .bind(PaidStatus::Unpaid)
    .bind(InvoiceStatus::Sent)
    .bind(InvoiceStatus::Processing)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn create_payment(pool: &SqlitePool, payment: &Payment) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO payments (id, user_id, stripe_account_id, amount, currency, reference, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&payment.id)
    .bind(payment.user_id)
    .bind(&payment.stripe_account_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.reference)
    .bind(&payment.status)
    .bind(&payment.created_at)
    .execute(pool)
    .await?;
    log::info!("Payment {} recorded for user {}", payment.id, payment.user_id);
    Ok(())
}

pub async fn get_payments(pool: &SqlitePool, user_id: i64) -> Result<Vec<Payment>, AppError> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_user, test_pool};

    fn diesel(quantity: i64, price: i64) -> NewLineItem {
        NewLineItem {
            name: "Diesel delivery".into(),
            description: None,
            quantity,
            price,
        }
    }

    async fn seed_invoice(pool: &SqlitePool, user_id: i64, number: &str, due_date: i64) -> Invoice {
        let customer = create_customer(pool, user_id, "Acme Haulage", None, None, None, None)
            .await
            .unwrap();
        create_invoice(
            pool,
            NewInvoice {
                id: format!("inv_{}", number),
                user_id,
                invoice_number: number.into(),
                customer_id: customer.id,
                tax_rate_id: None,
                invoice_date: due_date - 7 * 86_400,
                due_date,
                notes: None,
                line_items: vec![diesel(2, 5000)],
            },
        )
        .await
        .unwrap()
    }

    #[actix_web::test]
    async fn user_lookup_by_email() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "driver@fleet.co.uk").await;
        let found = get_user_by_email(&pool, "driver@fleet.co.uk").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(get_user_by_email(&pool, "nobody@fleet.co.uk").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn duplicate_email_is_rejected() {
        let pool = test_pool().await;
        seed_user(&pool, "dup@fleet.co.uk").await;
        let again = create_user(
            &pool,
            NewUser {
                email: "dup@fleet.co.uk".into(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(again, Err(AppError::DatabaseError(_))));
    }

    #[actix_web::test]
    async fn bank_link_only_updates_existing_users() {
        let pool = test_pool().await;
        seed_user(&pool, "linked@fleet.co.uk").await;
        assert!(set_user_bank_link(&pool, "linked@fleet.co.uk", "access-1", "item-1")
            .await
            .unwrap());
        assert!(!set_user_bank_link(&pool, "ghost@fleet.co.uk", "access-1", "item-1")
            .await
            .unwrap());
        let user = get_user_by_email(&pool, "linked@fleet.co.uk").await.unwrap().unwrap();
        assert_eq!(user.plaid_item_id.as_deref(), Some("item-1"));
    }

    #[actix_web::test]
    async fn invoice_totals_use_tax_rate() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "tax@fleet.co.uk").await;
        let customer = create_customer(&pool, user.id, "Acme", Some("Acme Ltd"), None, None, None)
            .await
            .unwrap();
        let vat = create_tax_rate(&pool, user.id, "VAT", None, 20.0, TaxCalculation::Exclusive)
            .await
            .unwrap();

        let invoice = create_invoice(
            &pool,
            NewInvoice {
                id: "inv_tax".into(),
                user_id: user.id,
                invoice_number: "INV-001".into(),
                customer_id: customer.id,
                tax_rate_id: Some(vat.id),
                invoice_date: 1_700_000_000,
                due_date: 1_700_000_000 + 30 * 86_400,
                notes: Some("Net 30".into()),
                line_items: vec![diesel(3, 1000), diesel(1, 500)],
            },
        )
        .await
        .unwrap();

        assert_eq!(invoice.subtotal, 3500);
        assert_eq!(invoice.total, 4200);
        assert_eq!(invoice.amount_due, 4200);
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.line_items.len(), 2);
        assert!(invoice_number_exists(&pool, user.id, "INV-001").await.unwrap());

        let listed = get_invoices(&pool, user.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].line_items.len(), 2);
    }

    #[actix_web::test]
    async fn invoice_id_taken_by_another_user_is_a_client_error() {
        let pool = test_pool().await;
        let first = seed_user(&pool, "first@fleet.co.uk").await;
        let second = seed_user(&pool, "second@fleet.co.uk").await;
        seed_invoice(&pool, first.id, "INV-7", 1_700_000_000).await;

        let customer = create_customer(&pool, second.id, "Other Haulage", None, None, None, None)
            .await
            .unwrap();
        let clash = create_invoice(
            &pool,
            NewInvoice {
                id: "inv_INV-7".into(),
                user_id: second.id,
                invoice_number: "B-1".into(),
                customer_id: customer.id,
                tax_rate_id: None,
                invoice_date: 1_700_000_000,
                due_date: 1_700_000_000 + 7 * 86_400,
                notes: None,
                line_items: vec![diesel(1, 100)],
            },
        )
        .await;
        match clash {
            Err(AppError::Validation(message)) => assert!(!message.contains("UNIQUE")),
            other => panic!("unexpected result {:?}", other.map(|i| i.id)),
        }
        assert!(get_invoices(&pool, second.id).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn invoice_for_foreign_customer_is_rejected() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "owner@fleet.co.uk").await;
        let other = seed_user(&pool, "other@fleet.co.uk").await;
        let customer = create_customer(&pool, owner.id, "Acme", None, None, None, None)
            .await
            .unwrap();
        let result = create_invoice(
            &pool,
            NewInvoice {
                id: "inv_x".into(),
                user_id: other.id,
                invoice_number: "INV-9".into(),
                customer_id: customer.id,
                tax_rate_id: None,
                invoice_date: 0,
                due_date: 10 * 86_400,
                notes: None,
                line_items: vec![diesel(1, 100)],
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn update_invoice_tracks_approval_and_payment() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "update@fleet.co.uk").await;
        let invoice = seed_invoice(&pool, user.id, "INV-100", 1_800_000_000).await;

        let processing = update_invoice(
            &pool,
            user.id,
            &invoice.id,
            InvoiceChanges {
                status: Some(InvoiceStatus::Processing),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(processing.approval_requested);
        assert_eq!(processing.status, InvoiceStatus::Processing);

        let paid = update_invoice(
            &pool,
            user.id,
            &invoice.id,
            InvoiceChanges {
                paid_status: Some(PaidStatus::Paid),
                pod: Some("12345678/POD/delivery.pdf".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(paid.amount_due, 0);
        assert!(paid.approval_requested);
        assert_eq!(paid.pod.as_deref(), Some("12345678/POD/delivery.pdf"));

        let reopened = update_invoice(
            &pool,
            user.id,
            &invoice.id,
            InvoiceChanges {
                paid_status: Some(PaidStatus::Unpaid),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(reopened.amount_due, reopened.total);
    }

    #[actix_web::test]
    async fn update_unknown_invoice_is_not_found() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "nf@fleet.co.uk").await;
        let result = update_invoice(&pool, user.id, "inv_missing", InvoiceChanges::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn overdue_marks_only_sent_unpaid_past_due() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "overdue@fleet.co.uk").await;
        let now_unix = 1_750_000_000;

        let past_sent = seed_invoice(&pool, user.id, "A", now_unix - 86_400).await;
        let past_draft = seed_invoice(&pool, user.id, "B", now_unix - 86_400).await;
        let future_sent = seed_invoice(&pool, user.id, "C", now_unix + 86_400).await;
        let past_paid = seed_invoice(&pool, user.id, "D", now_unix - 86_400).await;

        for id in [&past_sent.id, &future_sent.id, &past_paid.id] {
            update_invoice(
                &pool,
                user.id,
                id,
                InvoiceChanges {
                    status: Some(InvoiceStatus::Sent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        update_invoice(
            &pool,
            user.id,
            &past_paid.id,
            InvoiceChanges {
                paid_status: Some(PaidStatus::Paid),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(mark_overdue_invoices(&pool, now_unix).await.unwrap(), 1);
        assert_eq!(mark_overdue_invoices(&pool, now_unix).await.unwrap(), 0);

        let status = |id: &str| {
            let pool = pool.clone();
            let id = id.to_string();
            let user_id = user.id;
            async move { get_invoice(&pool, user_id, &id).await.unwrap().unwrap().status }
        };
        assert_eq!(status(&past_sent.id).await, InvoiceStatus::Overdue);
        assert_eq!(status(&past_draft.id).await, InvoiceStatus::Draft);
        assert_eq!(status(&future_sent.id).await, InvoiceStatus::Sent);
        assert_eq!(status(&past_paid.id).await, InvoiceStatus::Sent);
    }

    #[actix_web::test]
    async fn payments_are_listed_per_user() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "pay@fleet.co.uk").await;
        create_payment(
            &pool,
            &Payment {
                id: "payment-id-sandbox-1".into(),
                user_id: user.id,
                stripe_account_id: Some("acct_1".into()),
                amount: 2550,
                currency: "GBP".into(),
                reference: "TOPUP 1".into(),
                status: "PAYMENT_STATUS_INPUT_NEEDED".into(),
                created_at: now(),
            },
        )
        .await
        .unwrap();
        let payments = get_payments(&pool, user.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, 2550);
        assert!(get_payments(&pool, user.id + 1).await.unwrap().is_empty());
    }
}
