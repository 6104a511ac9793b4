//! Database row types, mapping directly to SQLite rows. Distinct from the
//! minbar-types API models so the DB layer stays independent of the wire
//! representation.

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub role: String,
    pub pin_hash: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug)]
pub struct SessionRow {
    pub token: String,
    pub user_id: String,
    pub role: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct TransactionRow {
    pub id: String,
    pub amount: i64,
    pub purpose: String,
    pub fund: String,
    pub transaction_date: String,
    pub created_at: String,
    pub created_by: Option<String>,
    pub created_by_name: String,
}

#[derive(Debug)]
pub struct CommitteeMemberRow {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub media_state: String,
    pub designation: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}
