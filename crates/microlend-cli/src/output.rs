//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use microlend_core::preferences::UiState;
use microlend_core::{AuthState, Client, Loan, Notification, NotificationKind, Payment};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    // ==================== Payments ====================

    pub fn print_payment(&self, payment: &Payment) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", payment.id);
                println!("Loan:    {}", payment.loan_id);
                println!("Amount:  {}", format_amount(payment.amount));
                println!("Status:  {}", payment.status);
                println!("Paid at: {}", payment.paid_at.format("%Y-%m-%d %H:%M"));
                if let Some(ref note) = payment.note {
                    println!("Note:    {}", note);
                }
                println!("Created: {}", payment.created_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(payment),
            OutputFormat::Quiet => println!("{}", payment.id),
        }
    }

    pub fn print_payments(&self, payments: &[Payment]) {
        match self.format {
            OutputFormat::Human => {
                if payments.is_empty() {
                    println!("No payments found.");
                    return;
                }
                for payment in payments {
                    println!(
                        "{} | {} | {:>12} | {:<7} | {}",
                        short_id(&payment.id),
                        short_id(&payment.loan_id),
                        format_amount(payment.amount),
                        payment.status,
                        payment.paid_at.format("%Y-%m-%d")
                    );
                }
                let total: i64 = payments.iter().map(|p| p.amount).sum();
                println!(
                    "\n{} payment(s), total {}",
                    payments.len(),
                    format_amount(total)
                );
            }
            OutputFormat::Json => print_json(payments),
            OutputFormat::Quiet => {
                for payment in payments {
                    println!("{}", payment.id);
                }
            }
        }
    }

    // ==================== Loans ====================

    pub fn print_loan(&self, loan: &Loan) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", loan.id);
                println!("Client:      {}", loan.client_id);
                println!("Principal:   {}", format_amount(loan.principal));
                println!(
                    "Interest:    {}.{:02}%",
                    loan.interest_rate_bps / 100,
                    loan.interest_rate_bps % 100
                );
                println!("Term:        {} week(s)", loan.term_weeks);
                println!("Total due:   {}", format_amount(loan.total_due()));
                println!("Installment: {}", format_amount(loan.weekly_installment()));
                println!("Status:      {}", loan.status);
                if let Some(at) = loan.disbursed_at {
                    println!("Disbursed:   {}", at.format("%Y-%m-%d"));
                }
                println!("Created:     {}", loan.created_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(loan),
            OutputFormat::Quiet => println!("{}", loan.id),
        }
    }

    pub fn print_loans(&self, loans: &[Loan]) {
        match self.format {
            OutputFormat::Human => {
                if loans.is_empty() {
                    println!("No loans found.");
                    return;
                }
                for loan in loans {
                    println!(
                        "{} | {} | {:>12} | {:>3}w | {}",
                        short_id(&loan.id),
                        short_id(&loan.client_id),
                        format_amount(loan.principal),
                        loan.term_weeks,
                        loan.status
                    );
                }
                println!("\n{} loan(s)", loans.len());
            }
            OutputFormat::Json => print_json(loans),
            OutputFormat::Quiet => {
                for loan in loans {
                    println!("{}", loan.id);
                }
            }
        }
    }

    // ==================== Clients ====================

    pub fn print_client(&self, client: &Client) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", client.id);
                println!("Name:    {}", client.full_name);
                if let Some(ref phone) = client.phone {
                    println!("Phone:   {}", phone);
                }
                if let Some(ref address) = client.address {
                    println!("Address: {}", address);
                }
                println!("Agent:   {}", client.agent_id);
                println!("Created: {}", client.created_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(client),
            OutputFormat::Quiet => println!("{}", client.id),
        }
    }

    pub fn print_clients(&self, clients: &[Client]) {
        match self.format {
            OutputFormat::Human => {
                if clients.is_empty() {
                    println!("No clients found.");
                    return;
                }
                for client in clients {
                    println!(
                        "{} | {} | {}",
                        short_id(&client.id),
                        truncate(&client.full_name, 35),
                        client.phone.as_deref().unwrap_or("-")
                    );
                }
                println!("\n{} client(s)", clients.len());
            }
            OutputFormat::Json => print_json(clients),
            OutputFormat::Quiet => {
                for client in clients {
                    println!("{}", client.id);
                }
            }
        }
    }

    // ==================== Session and preferences ====================

    pub fn print_auth(&self, state: &AuthState) {
        match self.format {
            OutputFormat::Human => match state.user {
                Some(ref user) => {
                    println!("Signed in as {} <{}>", user.display_name, user.email);
                    println!("  ID:   {}", user.id);
                    println!("  Role: {}", user.role);
                    println!("  Language: {}", user.profile.localization.language);
                }
                None => println!("Not signed in."),
            },
            OutputFormat::Json => {
                print_json(&serde_json::json!({
                    "user": state.user,
                    "isAuthenticated": state.is_authenticated,
                    "initialized": state.initialized,
                }));
            }
            OutputFormat::Quiet => {
                if let Some(ref user) = state.user {
                    println!("{}", user.id);
                }
            }
        }
    }

    pub fn print_preferences(&self, state: &UiState) {
        match self.format {
            OutputFormat::Human => {
                println!("Preferences:");
                println!("  language: {}", state.language);
                println!("  theme:    {}", state.theme);
            }
            OutputFormat::Json => {
                print_json(&serde_json::json!({
                    "language": state.language,
                    "theme": state.theme,
                }));
            }
            OutputFormat::Quiet => println!("{}", state.language),
        }
    }

    /// Print queued notifications, oldest first
    ///
    /// Only human output shows them; JSON and quiet output stay parseable.
    pub fn print_notifications(&self, notifications: &[Notification]) {
        if self.format != OutputFormat::Human {
            return;
        }

        for notification in notifications.iter().rev() {
            let marker = match notification.kind {
                NotificationKind::Success => "✓",
                NotificationKind::Error => "✗",
                NotificationKind::Warning => "⚠",
                NotificationKind::Info => "ℹ",
            };
            if notification.message.is_empty() {
                eprintln!("{} {}", marker, notification.title);
            } else {
                eprintln!("{} {}: {}", marker, notification.title, notification.message);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON output: {}", e),
    }
}

/// Format minor units as a decimal amount with thousands separators
pub fn format_amount(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let whole = (abs / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{:02}", sign, grouped, abs % 100)
}

/// First eight characters of an id
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(9_050), "90.50");
        assert_eq!(format_amount(123_456_789), "1,234,567.89");
        assert_eq!(format_amount(-100_000), "-1,000.00");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("Señora Ñañez Quispe", 9), "Señora...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
