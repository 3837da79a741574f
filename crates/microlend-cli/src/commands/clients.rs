//! Client command handlers

use anyhow::{anyhow, Context, Result};

use microlend_core::models::ClientDraft;
use microlend_core::AppStores;

use crate::commands::{confirm, failure_message, resolve_id};
use crate::output::Output;

pub async fn list(stores: &AppStores, output: &Output) -> Result<()> {
    stores.clients.fetch_all().await;
    output.print_clients(&stores.clients.items());
    Ok(())
}

pub async fn show(stores: &AppStores, id: String, output: &Output) -> Result<()> {
    let id = resolve_client(stores, &id).await?;

    let client = stores
        .clients
        .fetch_one(&id)
        .await
        .ok_or_else(|| anyhow!("Client not found: {}", id))?;

    output.print_client(&client);

    if output.should_prompt() {
        stores.loans.fetch_by_parent(&client.id).await;
        let loans = stores.loans.items();
        if !loans.is_empty() {
            println!();
            println!("── Loans ({}) ──", loans.len());
            output.print_loans(&loans);
        }
    }
    Ok(())
}

/// Register a client under the signed-in agent
pub async fn add(
    stores: &AppStores,
    agent_id: String,
    name: String,
    phone: Option<String>,
    address: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut draft = ClientDraft::new(agent_id, name);
    draft.phone = phone;
    draft.address = address;

    match stores.clients.create(draft).await {
        Ok(client) => {
            stores
                .notifications
                .success("Client added", client.full_name.clone());
            output.print_client(&client);
            Ok(())
        }
        Err(e) => {
            stores.notifications.error("Client not added", failure_message(&e));
            Err(e).context("Failed to add client")
        }
    }
}

pub async fn delete(stores: &AppStores, id: String, output: &Output) -> Result<()> {
    let id = resolve_client(stores, &id).await?;

    if output.should_prompt() {
        if let Some(client) = stores.clients.get(&id) {
            println!("Delete client: {} - {}", client.id, client.full_name);
        }
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if let Err(e) = stores.clients.delete(&id).await {
        stores.notifications.error("Client not deleted", failure_message(&e));
        return Err(e).context("Failed to delete client");
    }

    output.success(&format!("Deleted client: {}", id));
    Ok(())
}

pub async fn search(stores: &AppStores, query: String, output: &Output) -> Result<()> {
    stores.clients.search(&query).await;
    output.print_clients(&stores.clients.items());
    Ok(())
}

async fn resolve_client(stores: &AppStores, id: &str) -> Result<String> {
    stores.clients.fetch_all().await;
    resolve_id(&stores.clients.items(), id)
}
