//! Data models for microlend
//!
//! Defines the entities mirrored by collection stores: Client, Loan and
//! Payment. Each entity comes with a draft type (the data sent to create it)
//! and an update type (a partial update where every field is optional).
//!
//! Amounts are stored in minor currency units (cents).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An entity kind that can be cached by a collection store
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Data required to create the entity
    type Draft: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static;
    /// Partial update applied to an existing entity
    type Update: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Collection name, used in logs and errors
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Id of the owning record (loan for a payment, client for a loan)
    fn parent_id(&self) -> &str;

    /// Realize a draft once the backend has assigned an id
    fn from_draft(id: String, draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Shallow-merge a partial update
    fn apply_update(&mut self, update: &Self::Update);

    /// Text matched by search
    fn search_text(&self) -> String;

    /// Case-insensitive substring match against `search_text`
    fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.search_text().to_lowercase().contains(&query)
    }
}

// ==================== Payments ====================

/// Settlement state of a payment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Overdue,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => f.write_str("unpaid"),
            PaymentStatus::Paid => f.write_str("paid"),
            PaymentStatus::Overdue => f.write_str("overdue"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "overdue" => Ok(PaymentStatus::Overdue),
            other => Err(format!(
                "unknown payment status '{}' (expected unpaid, paid or overdue)",
                other
            )),
        }
    }
}

/// A payment against a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub loan_id: String,
    /// Amount in minor currency units
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub loan_id: String,
    pub amount: i64,
    /// Defaults to the creation time
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

impl PaymentDraft {
    pub fn new(loan_id: impl Into<String>, amount: i64) -> Self {
        Self {
            loan_id: loan_id.into(),
            amount,
            paid_at: None,
            status: PaymentStatus::default(),
            note: None,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PaymentUpdate {
    pub fn status(status: PaymentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl Entity for Payment {
    type Draft = PaymentDraft;
    type Update = PaymentUpdate;

    const KIND: &'static str = "payments";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> &str {
        &self.loan_id
    }

    fn from_draft(id: String, draft: PaymentDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            loan_id: draft.loan_id,
            amount: draft.amount,
            paid_at: draft.paid_at.unwrap_or(now),
            status: draft.status,
            note: draft.note,
            created_at: now,
        }
    }

    fn apply_update(&mut self, update: &PaymentUpdate) {
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(paid_at) = update.paid_at {
            self.paid_at = paid_at;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(ref note) = update.note {
            self.note = Some(note.clone());
        }
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.id,
            self.loan_id,
            self.status,
            self.note.as_deref().unwrap_or("")
        )
    }
}

// ==================== Loans ====================

/// Lifecycle state of a loan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    #[default]
    Pending,
    Active,
    Closed,
    Defaulted,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Pending => f.write_str("pending"),
            LoanStatus::Active => f.write_str("active"),
            LoanStatus::Closed => f.write_str("closed"),
            LoanStatus::Defaulted => f.write_str("defaulted"),
        }
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(LoanStatus::Pending),
            "active" => Ok(LoanStatus::Active),
            "closed" => Ok(LoanStatus::Closed),
            "defaulted" => Ok(LoanStatus::Defaulted),
            other => Err(format!("unknown loan status '{}'", other)),
        }
    }
}

/// A loan granted to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub client_id: String,
    /// Principal in minor currency units
    pub principal: i64,
    /// Flat interest over the whole term, in basis points
    pub interest_rate_bps: u32,
    pub term_weeks: u16,
    pub status: LoanStatus,
    #[serde(default)]
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Principal plus flat interest
    pub fn total_due(&self) -> i64 {
        self.principal + self.principal * i64::from(self.interest_rate_bps) / 10_000
    }

    /// Expected weekly installment, rounded up
    pub fn weekly_installment(&self) -> i64 {
        let weeks = i64::from(self.term_weeks.max(1));
        (self.total_due() + weeks - 1) / weeks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDraft {
    pub client_id: String,
    pub principal: i64,
    pub interest_rate_bps: u32,
    pub term_weeks: u16,
}

impl LoanDraft {
    pub fn new(
        client_id: impl Into<String>,
        principal: i64,
        interest_rate_bps: u32,
        term_weeks: u16,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            principal,
            interest_rate_bps,
            term_weeks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LoanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate_bps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_weeks: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disbursed_at: Option<DateTime<Utc>>,
}

impl Entity for Loan {
    type Draft = LoanDraft;
    type Update = LoanUpdate;

    const KIND: &'static str = "loans";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> &str {
        &self.client_id
    }

    fn from_draft(id: String, draft: LoanDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            client_id: draft.client_id,
            principal: draft.principal,
            interest_rate_bps: draft.interest_rate_bps,
            term_weeks: draft.term_weeks,
            status: LoanStatus::Pending,
            disbursed_at: None,
            created_at: now,
        }
    }

    fn apply_update(&mut self, update: &LoanUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(rate) = update.interest_rate_bps {
            self.interest_rate_bps = rate;
        }
        if let Some(weeks) = update.term_weeks {
            self.term_weeks = weeks;
        }
        if let Some(at) = update.disbursed_at {
            self.disbursed_at = Some(at);
        }
    }

    fn search_text(&self) -> String {
        format!("{} {} {}", self.id, self.client_id, self.status)
    }
}

// ==================== Clients ====================

/// A borrower served by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    /// Agent responsible for the client
    pub agent_id: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDraft {
    pub agent_id: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl ClientDraft {
    pub fn new(agent_id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            full_name: full_name.into(),
            phone: None,
            address: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Entity for Client {
    type Draft = ClientDraft;
    type Update = ClientUpdate;

    const KIND: &'static str = "clients";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> &str {
        &self.agent_id
    }

    fn from_draft(id: String, draft: ClientDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            agent_id: draft.agent_id,
            full_name: draft.full_name,
            phone: draft.phone,
            address: draft.address,
            created_at: now,
        }
    }

    fn apply_update(&mut self, update: &ClientUpdate) {
        if let Some(ref agent_id) = update.agent_id {
            self.agent_id = agent_id.clone();
        }
        if let Some(ref name) = update.full_name {
            self.full_name = name.clone();
        }
        if let Some(ref phone) = update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(ref address) = update.address {
            self.address = Some(address.clone());
        }
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.id,
            self.full_name,
            self.phone.as_deref().unwrap_or(""),
            self.address.as_deref().unwrap_or("")
        )
    }
}
