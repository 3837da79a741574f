//! Command handlers

pub mod auth;
pub mod clients;
pub mod config;
pub mod loans;
pub mod payments;
pub mod prefs;

use std::io::{self, Write};

use anyhow::{bail, Context, Result};

use microlend_core::{AppStores, Entity, StoreError, User};

/// Settle the session and return the signed-in user
pub async fn require_user(stores: &AppStores) -> Result<User> {
    match stores.auth.check_session().await {
        Some(user) => Ok(user),
        None => bail!("Not signed in. Run `microlend auth sign-in --email <EMAIL>` first."),
    }
}

/// Resolve a full id or unique prefix against cached entities
pub fn resolve_id<E: Entity>(items: &[E], id: &str) -> Result<String> {
    if let Some(exact) = items.iter().find(|e| e.id() == id) {
        return Ok(exact.id().to_string());
    }

    let matches: Vec<&E> = items.iter().filter(|e| e.id().starts_with(id)).collect();

    match matches.len() {
        0 => bail!("No {} found matching: {}", singular(E::KIND), id),
        1 => Ok(matches[0].id().to_string()),
        _ => {
            eprintln!("Multiple {} match '{}':", E::KIND, id);
            for entity in &matches {
                eprintln!("  {}", entity.id());
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

fn singular(kind: &str) -> &str {
    kind.strip_suffix('s').unwrap_or(kind)
}

/// Text for a failure notification, with a retry hint when it may help
pub fn failure_message(err: &StoreError) -> String {
    if err.is_retryable() {
        format!("{} (try again)", err)
    } else {
        err.to_string()
    }
}

/// Parse a decimal amount ("90", "90.5", "1,250.75") into minor units
pub fn parse_amount(input: &str) -> Result<i64> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        bail!("Invalid amount: '{}'", input);
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        bail!("Invalid amount: '{}'", input);
    }
    if fraction.len() > 2 {
        bail!("Invalid amount: '{}' (at most two decimals)", input);
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .with_context(|| format!("Invalid amount: '{}'", input))?
    };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => {
            fraction
                .parse::<i64>()
                .with_context(|| format!("Invalid amount: '{}'", input))?
                * 10
        }
        _ => fraction
            .parse()
            .with_context(|| format!("Invalid amount: '{}'", input))?,
    };

    let amount = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .with_context(|| format!("Amount out of range: '{}'", input))?;

    Ok(if negative { -amount } else { amount })
}

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

/// Prompt for a single line of input
pub fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use microlend_core::models::{Client, ClientDraft};
    use microlend_core::RemoteError;

    fn client(id: &str) -> Client {
        Client::from_draft(id.to_string(), ClientDraft::new("agent", "Rosa"), Utc::now())
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("90").unwrap(), 9_000);
        assert_eq!(parse_amount("90.5").unwrap(), 9_050);
        assert_eq!(parse_amount("1,250.75").unwrap(), 125_075);
        assert_eq!(parse_amount(".25").unwrap(), 25);
        assert_eq!(parse_amount("-3").unwrap(), -300);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("1.234").is_err());
        assert!(parse_amount("1.2.3").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_embedded_signs() {
        assert!(parse_amount("1.-5").is_err());
        assert!(parse_amount("1.+5").is_err());
        assert!(parse_amount("--5").is_err());
        assert!(parse_amount("+5").is_err());
        assert!(parse_amount("-").is_err());
    }

    #[test]
    fn test_failure_message_hints_retry() {
        let network = StoreError::from(RemoteError::Network("timeout".to_string()));
        assert_eq!(failure_message(&network), "Network error: timeout (try again)");

        let conflict = StoreError::from(RemoteError::Conflict("exists".to_string()));
        assert_eq!(failure_message(&conflict), "Conflict: exists");
    }

    #[test]
    fn test_resolve_id() {
        let items = vec![client("abc123"), client("abd456"), client("xyz789")];

        assert_eq!(resolve_id(&items, "xyz").unwrap(), "xyz789");
        assert_eq!(resolve_id(&items, "abc123").unwrap(), "abc123");
        assert!(resolve_id(&items, "ab").is_err());
        assert!(resolve_id(&items, "nope").is_err());
    }

    #[test]
    fn test_exact_id_wins_over_prefix() {
        let items = vec![client("ab"), client("abc")];
        assert_eq!(resolve_id(&items, "ab").unwrap(), "ab");
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("payments"), "payment");
        assert_eq!(singular("loan"), "loan");
    }
}
