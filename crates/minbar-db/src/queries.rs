use crate::Database;
use crate::models::{CommitteeMemberRow, SessionRow, TransactionRow, UserRow};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, name: &str, role: &str, pin_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, role, pin_hash) VALUES (?1, ?2, ?3, ?4)",
                (id, name, role, pin_hash),
            )?;
            Ok(())
        })
    }

    /// Active users holding the given role. Small set by design: one lookup
    /// per login attempt, PIN verification happens against each hash.
    pub fn active_users_by_role(&self, role: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, role, pin_hash, is_active, created_at
                 FROM users WHERE role = ?1 AND is_active = 1",
            )?;
            let rows = stmt
                .query_map([role], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n)
        })
    }

    // -- Sessions --

    pub fn insert_session(&self, token: &str, user_id: &str, role: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, role, name) VALUES (?1, ?2, ?3, ?4)",
                (token, user_id, role, name),
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token, user_id, role, name, created_at
                     FROM sessions WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(SessionRow {
                            token: row.get(0)?,
                            user_id: row.get(1)?,
                            role: row.get(2)?,
                            name: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Idempotent: deleting a token that maps to no session is not an error.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
            Ok(())
        })
    }

    // -- Transactions --

    pub fn insert_transaction(
        &self,
        id: &str,
        amount: i64,
        purpose: &str,
        fund: &str,
        transaction_date: &str,
        created_by: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO transactions (id, amount, purpose, fund, transaction_date, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, amount, purpose, fund, transaction_date, created_by),
            )?;
            Ok(())
        })
    }

    pub fn get_transaction(&self, id: &str) -> Result<Option<TransactionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{TRANSACTION_SELECT} WHERE t.id = ?1"),
                    [id],
                    transaction_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_transaction(
        &self,
        id: &str,
        amount: i64,
        purpose: &str,
        fund: &str,
        transaction_date: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE transactions
                 SET amount = ?2, purpose = ?3, fund = ?4, transaction_date = ?5
                 WHERE id = ?1",
                (id, amount, purpose, fund, transaction_date),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_transaction(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Recent transactions, newest first, with the creating user's name
    /// joined in a single query.
    pub fn list_transactions(&self, limit: u32) -> Result<Vec<TransactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TRANSACTION_SELECT}
                 ORDER BY t.transaction_date DESC, t.created_at DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], transaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn fund_balance(&self, fund: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let sum = conn.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE fund = ?1",
                [fund],
                |r| r.get(0),
            )?;
            Ok(sum)
        })
    }

    pub fn count_transactions(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
            Ok(n)
        })
    }

    // -- Committee members --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_member(
        &self,
        id: &str,
        name: &str,
        image_url: Option<&str>,
        media_state: &str,
        designation: &str,
        phone: Option<&str>,
        is_active: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO committee_members
                     (id, name, image_url, media_state, designation, phone, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (id, name, image_url, media_state, designation, phone, is_active),
            )?;
            Ok(())
        })
    }

    pub fn get_member(&self, id: &str) -> Result<Option<CommitteeMemberRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{MEMBER_SELECT} WHERE id = ?1"),
                    [id],
                    member_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_active_members(&self) -> Result<Vec<CommitteeMemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MEMBER_SELECT} WHERE is_active = 1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map([], member_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_member_fields(
        &self,
        id: &str,
        name: &str,
        designation: &str,
        phone: Option<&str>,
        is_active: bool,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE committee_members
                 SET name = ?2, designation = ?3, phone = ?4, is_active = ?5
                 WHERE id = ?1",
                (id, name, designation, phone, is_active),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_member_image(
        &self,
        id: &str,
        image_url: Option<&str>,
        media_state: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE committee_members SET image_url = ?2, media_state = ?3 WHERE id = ?1",
                (id, image_url, media_state),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_member(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM committee_members WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Members whose image is still keyed by a temporary blob. Input to the
    /// reconcile sweep.
    pub fn pending_media_members(&self) -> Result<Vec<CommitteeMemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MEMBER_SELECT} WHERE media_state = 'pending' ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map([], member_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

// LEFT JOIN so a transaction survives its creator's row going away.
const TRANSACTION_SELECT: &str = "SELECT t.id, t.amount, t.purpose, t.fund, t.transaction_date,
        t.created_at, t.created_by, u.name
 FROM transactions t
 LEFT JOIN users u ON t.created_by = u.id";

const MEMBER_SELECT: &str = "SELECT id, name, image_url, media_state, designation, phone, is_active, created_at
 FROM committee_members";

fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        pin_hash: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<TransactionRow> {
    Ok(TransactionRow {
        id: row.get(0)?,
        amount: row.get(1)?,
        purpose: row.get(2)?,
        fund: row.get(3)?,
        transaction_date: row.get(4)?,
        created_at: row.get(5)?,
        created_by: row.get(6)?,
        created_by_name: row
            .get::<_, Option<String>>(7)?
            .unwrap_or_else(|| "Unknown".to_string()),
    })
}

fn member_from_row(row: &Row) -> rusqlite::Result<CommitteeMemberRow> {
    Ok(CommitteeMemberRow {
        id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
        media_state: row.get(3)?,
        designation: row.get(4)?,
        phone: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use uuid::Uuid;

    fn db_with_user(role: &str) -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4().to_string();
        db.create_user(&user_id, "Test User", role, "not-a-real-hash")
            .unwrap();
        (db, user_id)
    }

    #[test]
    fn fund_balance_is_sum_of_amounts() {
        let (db, user_id) = db_with_user("cashier");

        for (amount, fund) in [(100, "mosque"), (250, "mosque"), (40, "imam")] {
            db.insert_transaction(
                &Uuid::new_v4().to_string(),
                amount,
                "Donation",
                fund,
                "2024-01-01",
                &user_id,
            )
            .unwrap();
        }

        assert_eq!(db.fund_balance("mosque").unwrap(), 350);
        assert_eq!(db.fund_balance("imam").unwrap(), 40);
        assert_eq!(db.count_transactions().unwrap(), 3);
    }

    #[test]
    fn fund_balance_is_zero_when_empty() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.fund_balance("mosque").unwrap(), 0);
        assert_eq!(db.fund_balance("imam").unwrap(), 0);
    }

    #[test]
    fn list_transactions_joins_creator_and_orders_newest_first() {
        let (db, user_id) = db_with_user("cashier");

        db.insert_transaction("t-old", 10, "Older", "mosque", "2024-01-01", &user_id)
            .unwrap();
        db.insert_transaction("t-new", 20, "Newer", "mosque", "2024-02-01", &user_id)
            .unwrap();

        let rows = db.list_transactions(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "t-new");
        assert_eq!(rows[0].created_by_name, "Test User");

        let rows = db.list_transactions(1).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn creator_name_falls_back_to_unknown() {
        let (db, user_id) = db_with_user("cashier");
        db.insert_transaction("t1", 10, "Donation", "imam", "2024-01-01", &user_id)
            .unwrap();

        // created_by is ON DELETE SET NULL; the transaction must survive.
        db.with_conn_mut(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [user_id.as_str()])?;
            Ok(())
        })
        .unwrap();

        let row = db.get_transaction("t1").unwrap().unwrap();
        assert_eq!(row.created_by, None);
        assert_eq!(row.created_by_name, "Unknown");
    }

    #[test]
    fn non_positive_amount_is_rejected_by_schema() {
        let (db, user_id) = db_with_user("cashier");
        let err = db.insert_transaction("t1", 0, "Donation", "mosque", "2024-01-01", &user_id);
        assert!(err.is_err());
    }

    #[test]
    fn session_lifecycle() {
        let (db, user_id) = db_with_user("admin");

        db.insert_session("tok-1", &user_id, "admin", "Test User")
            .unwrap();
        let session = db.get_session("tok-1").unwrap().unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.role, "admin");

        db.delete_session("tok-1").unwrap();
        assert!(db.get_session("tok-1").unwrap().is_none());

        // Idempotent on a token that no longer exists
        db.delete_session("tok-1").unwrap();
    }

    #[test]
    fn active_members_listed_oldest_first_inactive_hidden() {
        let db = Database::open_in_memory().unwrap();
        db.insert_member("m1", "Chair", None, "none", "Chairman", None, true)
            .unwrap();
        db.insert_member("m2", "Ghost", None, "none", "Member", None, false)
            .unwrap();

        let members = db.list_active_members().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "m1");
    }

    #[test]
    fn pending_media_members_filters_by_state() {
        let db = Database::open_in_memory().unwrap();
        db.insert_member(
            "m1",
            "Chair",
            Some("http://x/temp-1.png"),
            "pending",
            "Chairman",
            None,
            true,
        )
        .unwrap();
        db.insert_member("m2", "Sec", None, "none", "Secretary", None, true)
            .unwrap();

        let pending = db.pending_media_members().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "m1");

        db.set_member_image("m1", Some("http://x/m1-2.png"), "committed")
            .unwrap();
        assert!(db.pending_media_members().unwrap().is_empty());
    }
}
