use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role attached to a user and, after login, to their session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cashier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "cashier" => Some(Role::Cashier),
            _ => None,
        }
    }
}

/// One of the two independent money pools. A fund's balance is the sum of
/// all transaction amounts tagged with it; there is no subtraction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fund {
    Mosque,
    Imam,
}

impl Fund {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fund::Mosque => "mosque",
            Fund::Imam => "imam",
        }
    }

    pub fn parse(s: &str) -> Option<Fund> {
        match s {
            "mosque" => Some(Fund::Mosque),
            "imam" => Some(Fund::Imam),
            _ => None,
        }
    }
}

/// Where a committee member's image sits in the two-phase key protocol.
///
/// `Pending` means the record still references a temporary blob key (the
/// re-key after insert has not completed); the reconcile sweep retries
/// those. `Committed` means the blob is keyed by the member's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaState {
    None,
    Pending,
    Committed,
}

impl MediaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaState::None => "none",
            MediaState::Pending => "pending",
            MediaState::Committed => "committed",
        }
    }

    pub fn parse(s: &str) -> Option<MediaState> {
        match s {
            "none" => Some(MediaState::None),
            "pending" => Some(MediaState::Pending),
            "committed" => Some(MediaState::Committed),
            _ => None,
        }
    }
}

/// Authenticated identity, resolved from a bearer token by the session
/// middleware and injected into every protected request. Handlers take it
/// as an extension so their dependency on identity is visible in the
/// signature rather than read from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub amount: i64,
    pub purpose: String,
    pub fund: Fund,
    pub transaction_date: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub created_by: Option<Uuid>,
    pub created_by_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeMember {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub media_state: MediaState,
    pub designation: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Public dashboard figures. Balances are pure sums; income mirrors the
/// balance and expense is always zero because every transaction is additive.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub mosque_balance: i64,
    pub imam_balance: i64,
    pub total_balance: i64,
    pub mosque_income: i64,
    pub mosque_expense: i64,
    pub imam_income: i64,
    pub imam_expense: i64,
    pub total_transactions: i64,
}
