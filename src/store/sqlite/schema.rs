pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY,
    credential_id   TEXT NOT NULL,
    name            TEXT NOT NULL,
    total_amount    TEXT NOT NULL DEFAULT '0',
    total_allotment TEXT NOT NULL DEFAULT '0'
);

CREATE TABLE IF NOT EXISTS categories (
    id        TEXT PRIMARY KEY,
    user_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title     TEXT NOT NULL,
    allotment TEXT NOT NULL DEFAULT '0',
    amount    TEXT NOT NULL DEFAULT '0'
);

CREATE TABLE IF NOT EXISTS charges (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category_id TEXT NOT NULL REFERENCES categories(id),
    description TEXT NOT NULL DEFAULT '',
    amount      TEXT NOT NULL,
    date        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);
CREATE INDEX IF NOT EXISTS idx_charges_user ON charges(user_id);
CREATE INDEX IF NOT EXISTS idx_charges_user_category ON charges(user_id, category_id);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[
    // Future migrations go here:
    // (1, "ALTER TABLE charges ADD COLUMN notes TEXT NOT NULL DEFAULT '';"),
];
