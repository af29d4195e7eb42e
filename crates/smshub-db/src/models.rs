/// Database row types — these map directly to SQLite rows.
/// Distinct from smshub-types API models to keep the DB layer independent.

pub struct OperatorRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct TokenRow {
    pub id: i64,
    pub name: String,
    pub token: String,
    pub enabled: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

pub struct SmsRow {
    pub id: i64,
    pub phone: String,
    pub content: String,
    pub received_at: String,
    pub device: String,
}
