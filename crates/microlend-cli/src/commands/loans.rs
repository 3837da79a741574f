//! Loan command handlers

use anyhow::{anyhow, bail, Context, Result};

use microlend_core::models::{LoanDraft, LoanUpdate};
use microlend_core::{AppStores, LoanStatus};

use crate::commands::{confirm, failure_message, parse_amount, resolve_id};
use crate::output::Output;

pub async fn list(stores: &AppStores, client: Option<String>, output: &Output) -> Result<()> {
    match client {
        Some(client) => {
            let client_id = resolve_client(stores, &client).await?;
            stores.loans.fetch_by_parent(&client_id).await;
        }
        None => stores.loans.fetch_all().await,
    }

    output.print_loans(&stores.loans.items());
    Ok(())
}

pub async fn show(stores: &AppStores, id: String, output: &Output) -> Result<()> {
    let id = resolve_loan(stores, &id).await?;

    let loan = stores
        .loans
        .fetch_one(&id)
        .await
        .ok_or_else(|| anyhow!("Loan not found: {}", id))?;

    output.print_loan(&loan);
    Ok(())
}

/// Open a loan for a client
///
/// `rate` is the flat interest over the whole term, in percent.
pub async fn add(
    stores: &AppStores,
    client: String,
    principal: String,
    rate: String,
    weeks: u16,
    output: &Output,
) -> Result<()> {
    let client_id = resolve_client(stores, &client).await?;
    let principal = parse_amount(&principal)?;
    if principal <= 0 {
        bail!("Principal must be positive");
    }
    if weeks == 0 {
        bail!("Term must be at least one week");
    }
    let rate_bps = u32::try_from(parse_amount(&rate)?)
        .map_err(|_| anyhow!("Interest rate must not be negative"))?;

    match stores
        .loans
        .create(LoanDraft::new(client_id, principal, rate_bps, weeks))
        .await
    {
        Ok(loan) => {
            stores
                .notifications
                .success("Loan opened", format!("{} for client {}", loan.id, loan.client_id));
            output.print_loan(&loan);
            Ok(())
        }
        Err(e) => {
            stores.notifications.error("Loan not opened", failure_message(&e));
            Err(e).context("Failed to open loan")
        }
    }
}

pub async fn set_status(
    stores: &AppStores,
    id: String,
    status: LoanStatus,
    output: &Output,
) -> Result<()> {
    let id = resolve_loan(stores, &id).await?;

    let mut update = LoanUpdate {
        status: Some(status),
        ..LoanUpdate::default()
    };
    if status == LoanStatus::Active
        && stores
            .loans
            .get(&id)
            .is_some_and(|loan| loan.disbursed_at.is_none())
    {
        update.disbursed_at = Some(chrono::Utc::now());
    }

    if let Err(e) = stores.loans.update(&id, update).await {
        stores.notifications.error("Loan not updated", failure_message(&e));
        return Err(e).context("Failed to update loan");
    }

    stores
        .notifications
        .success("Loan updated", format!("{} is now {}", id, status));
    if let Some(loan) = stores.loans.get(&id) {
        output.print_loan(&loan);
    }
    Ok(())
}

pub async fn delete(stores: &AppStores, id: String, output: &Output) -> Result<()> {
    let id = resolve_loan(stores, &id).await?;

    stores.payments.fetch_by_parent(&id).await;
    let payments = stores.payments.items().len();

    if output.should_prompt() {
        println!("Delete loan: {}", id);
        if payments > 0 {
            println!("  {} payment(s) reference this loan and will be orphaned.", payments);
        }
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if let Err(e) = stores.loans.delete(&id).await {
        stores.notifications.error("Loan not deleted", failure_message(&e));
        return Err(e).context("Failed to delete loan");
    }

    output.success(&format!("Deleted loan: {}", id));
    Ok(())
}

async fn resolve_loan(stores: &AppStores, id: &str) -> Result<String> {
    stores.loans.fetch_all().await;
    resolve_id(&stores.loans.items(), id)
}

async fn resolve_client(stores: &AppStores, id: &str) -> Result<String> {
    stores.clients.fetch_all().await;
    resolve_id(&stores.clients.items(), id)
}
