//! Database schema and migrations for pinboard.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script executed in order. The schema_version
/// table tracks which migrations have been applied.
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: boards and membership
    r#"
CREATE TABLE boards (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_boards_owner_id ON boards(owner_id);

CREATE TABLE board_members (
    board_id    INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    added_at    TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, board_id)
);

CREATE INDEX idx_board_members_board_id ON board_members(board_id);
"#,
    // v3: ordered lists and cards
    //
    // No UNIQUE index on (container, position): the move shifts pass through
    // transient duplicates inside the transaction.
    r#"
CREATE TABLE lists (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    position    REAL NOT NULL,
    board_id    INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_lists_board_position ON lists(board_id, position);

CREATE TABLE cards (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    position    REAL NOT NULL,
    list_id     INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_cards_list_position ON cards(list_id, position);
"#,
];

/// Database migrations.
///
/// Same tables as the SQLite schema, in PostgreSQL types. Timestamps stay
/// TEXT in the same format so entities decode identically on both backends.
#[cfg(feature = "postgres")]
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS'))
);
"#,
    // v2: boards and membership
    r#"
CREATE TABLE boards (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT NOT NULL,
    owner_id    BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS')),
    updated_at  TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS'))
);

CREATE INDEX idx_boards_owner_id ON boards(owner_id);

CREATE TABLE board_members (
    board_id    BIGINT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    user_id     BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    added_at    TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS')),
    PRIMARY KEY (user_id, board_id)
);

CREATE INDEX idx_board_members_board_id ON board_members(board_id);
"#,
    // v3: ordered lists and cards
    r#"
CREATE TABLE lists (
    id          BIGSERIAL PRIMARY KEY,
    title       TEXT NOT NULL,
    position    DOUBLE PRECISION NOT NULL,
    board_id    BIGINT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS')),
    updated_at  TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS'))
);

CREATE INDEX idx_lists_board_position ON lists(board_id, position);

CREATE TABLE cards (
    id          BIGSERIAL PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    position    DOUBLE PRECISION NOT NULL,
    list_id     BIGINT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS')),
    updated_at  TEXT NOT NULL DEFAULT (to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS'))
);

CREATE INDEX idx_cards_list_position ON cards(list_id, position);
"#,
];
