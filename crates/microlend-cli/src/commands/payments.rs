//! Payment command handlers

use anyhow::{anyhow, Context, Result};

use microlend_core::models::{PaymentDraft, PaymentUpdate};
use microlend_core::{AppStores, PaymentStatus};

use crate::commands::{confirm, failure_message, parse_amount, resolve_id};
use crate::output::Output;

/// List payments, optionally for one loan or matching a query
pub async fn list(
    stores: &AppStores,
    loan: Option<String>,
    search: Option<String>,
    output: &Output,
) -> Result<()> {
    match (loan, search) {
        (Some(loan), _) => {
            let loan_id = resolve_loan(stores, &loan).await?;
            stores.payments.fetch_by_parent(&loan_id).await;
        }
        (None, Some(query)) => stores.payments.search(&query).await,
        (None, None) => stores.payments.fetch_all().await,
    }

    output.print_payments(&stores.payments.items());
    Ok(())
}

pub async fn show(stores: &AppStores, id: String, output: &Output) -> Result<()> {
    let id = resolve_payment(stores, &id).await?;

    let payment = stores
        .payments
        .fetch_one(&id)
        .await
        .ok_or_else(|| anyhow!("Payment not found: {}", id))?;

    output.print_payment(&payment);
    Ok(())
}

/// Record a payment against a loan
pub async fn add(
    stores: &AppStores,
    loan: String,
    amount: String,
    status: PaymentStatus,
    note: Option<String>,
    output: &Output,
) -> Result<()> {
    let loan_id = resolve_loan(stores, &loan).await?;
    let amount = parse_amount(&amount)?;

    let mut draft = PaymentDraft::new(loan_id, amount).with_status(status);
    draft.note = note;

    match stores.payments.create(draft).await {
        Ok(payment) => {
            stores
                .notifications
                .success("Payment recorded", format!("{} on loan {}", payment.id, payment.loan_id));
            output.print_payment(&payment);
            Ok(())
        }
        Err(e) => {
            stores.notifications.error("Payment not recorded", failure_message(&e));
            Err(e).context("Failed to record payment")
        }
    }
}

pub async fn set_status(
    stores: &AppStores,
    id: String,
    status: PaymentStatus,
    output: &Output,
) -> Result<()> {
    let id = resolve_payment(stores, &id).await?;

    if let Err(e) = stores
        .payments
        .update(&id, PaymentUpdate::status(status))
        .await
    {
        stores.notifications.error("Payment not updated", failure_message(&e));
        return Err(e).context("Failed to update payment");
    }

    stores
        .notifications
        .success("Payment updated", format!("{} is now {}", id, status));
    if let Some(payment) = stores.payments.get(&id) {
        output.print_payment(&payment);
    }
    Ok(())
}

pub async fn delete(stores: &AppStores, id: String, output: &Output) -> Result<()> {
    let id = resolve_payment(stores, &id).await?;

    if output.should_prompt() {
        if let Some(payment) = stores.payments.get(&id) {
            println!(
                "Delete payment: {} ({} on loan {})",
                payment.id,
                crate::output::format_amount(payment.amount),
                payment.loan_id
            );
        }
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if let Err(e) = stores.payments.delete(&id).await {
        stores.notifications.error("Payment not deleted", failure_message(&e));
        return Err(e).context("Failed to delete payment");
    }

    output.success(&format!("Deleted payment: {}", id));
    Ok(())
}

async fn resolve_payment(stores: &AppStores, id: &str) -> Result<String> {
    stores.payments.fetch_all().await;
    resolve_id(&stores.payments.items(), id)
}

async fn resolve_loan(stores: &AppStores, id: &str) -> Result<String> {
    stores.loans.fetch_all().await;
    resolve_id(&stores.loans.items(), id)
}
