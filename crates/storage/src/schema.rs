use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

// Versioned tables carry the shared revision columns up front. The head
// row of a branch has id == branch; branch is NULL only for the moment
// between first insert and the branch back-reference write, inside the
// same transaction. UNIQUE (branch, revision) is the serialization point
// for concurrent saves.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS coops (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    branch BLOB CHECK (branch IS NULL OR length(branch) = 16),
    revision INTEGER NOT NULL DEFAULT 0,
    created_by BLOB NOT NULL CHECK (length(created_by) = 16),
    created_at INTEGER NOT NULL,
    name TEXT NOT NULL,
    picture_id BLOB,
    contactable_id BLOB,
    UNIQUE (branch, revision)
);
CREATE INDEX IF NOT EXISTS idx_coops_name ON coops (name);

CREATE TABLE IF NOT EXISTS answered_questions (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    branch BLOB CHECK (branch IS NULL OR length(branch) = 16),
    revision INTEGER NOT NULL DEFAULT 0,
    created_by BLOB NOT NULL CHECK (length(created_by) = 16),
    created_at INTEGER NOT NULL,
    question_id BLOB NOT NULL,
    coop_id BLOB NOT NULL,
    position INTEGER NOT NULL,
    answers BLOB NOT NULL,
    UNIQUE (branch, revision)
);
CREATE INDEX IF NOT EXISTS idx_answered_coop ON answered_questions (coop_id, position);

CREATE TABLE IF NOT EXISTS users (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    display_name TEXT NOT NULL,
    contactable_id BLOB
);

CREATE TABLE IF NOT EXISTS prompts (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    prompt TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS answers (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    answer TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    prompt_id BLOB NOT NULL,
    multiple_answers_ok INTEGER NOT NULL DEFAULT 0,
    free_text_answer_ok INTEGER NOT NULL DEFAULT 0,
    category_id BLOB
);

CREATE TABLE IF NOT EXISTS question_answers (
    question_id BLOB NOT NULL,
    answer_id BLOB NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (question_id, answer_id),
    UNIQUE (question_id, position)
);

CREATE TABLE IF NOT EXISTS question_categories (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    category TEXT NOT NULL,
    parent_id BLOB
);

CREATE TABLE IF NOT EXISTS contactables (
    id BLOB PRIMARY KEY CHECK (length(id) = 16)
);

CREATE TABLE IF NOT EXISTS contact_labels (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    label TEXT NOT NULL,
    rank INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS emails (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    contactable_id BLOB NOT NULL,
    label_id BLOB NOT NULL,
    address TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_emails_contactable ON emails (contactable_id);

CREATE TABLE IF NOT EXISTS phone_numbers (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    contactable_id BLOB NOT NULL,
    label_id BLOB NOT NULL,
    number TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_phones_contactable ON phone_numbers (contactable_id);

CREATE TABLE IF NOT EXISTS pictures (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    stock INTEGER NOT NULL DEFAULT 0,
    path TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS coop_categories (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    category TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS coop_category_links (
    coop_id BLOB NOT NULL,
    category_id BLOB NOT NULL,
    PRIMARY KEY (coop_id, category_id)
);

CREATE TABLE IF NOT EXISTS relationship_types (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS coop_relationships (
    from_coop BLOB NOT NULL,
    to_coop BLOB NOT NULL,
    relationship_type BLOB NOT NULL,
    PRIMARY KEY (from_coop, to_coop, relationship_type)
);
";
