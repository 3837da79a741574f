//! Auth command handlers

use anyhow::{bail, Context, Result};

use microlend_core::remote::{LocalAccount, LocalAuthService};
use microlend_core::{AppStores, Config, Role, User};

use crate::commands::{failure_message, prompt};
use crate::output::Output;

/// Create a local account
pub fn register(
    config: &Config,
    email: String,
    name: String,
    role: Role,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password")?,
    };
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let service = LocalAuthService::open(&config.backend_dir())
        .context("Failed to open local accounts")?;
    let user = service
        .register(LocalAccount {
            user: User::new(email, name, role),
            password,
        })
        .context("Failed to register account")?;

    output.success(&format!("Registered {} ({})", user.email, user.role));
    Ok(())
}

pub async fn sign_in(
    stores: &AppStores,
    email: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password")?,
    };

    match stores.auth.sign_in(&email, &password).await {
        Ok(user) => {
            stores
                .notifications
                .success("Signed in", format!("Welcome, {}", user.display_name));
            output.print_auth(&stores.auth.snapshot());
            Ok(())
        }
        Err(e) => {
            stores.notifications.error("Sign-in failed", failure_message(&e));
            Err(e).context("Failed to sign in")
        }
    }
}

/// Show the settled session
pub async fn status(stores: &AppStores, output: &Output) -> Result<()> {
    stores.auth.check_session().await;
    output.print_auth(&stores.auth.snapshot());
    Ok(())
}

pub async fn sign_out(stores: &AppStores, output: &Output) -> Result<()> {
    if !stores.auth.is_authenticated() {
        output.message("Not signed in.");
        return Ok(());
    }

    match stores.auth.sign_out().await {
        Ok(()) => {
            output.success("Signed out");
            Ok(())
        }
        Err(e) => {
            stores.notifications.error("Sign-out failed", failure_message(&e));
            Err(e).context("Failed to sign out")
        }
    }
}

/// Forget the local session only
pub fn logout(stores: &AppStores, output: &Output) -> Result<()> {
    stores.auth.logout();
    output.success("Local session cleared");
    Ok(())
}
