//! SQLite schema definitions for the app registry and the per-server caches.
//!
//! Entities are stored as JSON documents next to the few columns the
//! pipeline filters on.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

// =============================================================================
// App registry
// =============================================================================

const SERVERS_TABLE_V1: Table = Table {
    name: "servers",
    columns: &[
        sqlite_column!("url", &SqlType::Text, is_primary_key = true),
        sqlite_column!("display_name", &SqlType::Text, non_null = true),
        sqlite_column!("db_path", &SqlType::Text, non_null = true),
        sqlite_column!("registered_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

pub const APP_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SERVERS_TABLE_V1],
    migration: None,
}];

// =============================================================================
// Server database
// =============================================================================

/// Key-value session state (current user, current team, ...)
const SYSTEM_TABLE_V1: Table = Table {
    name: "system",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const TEAMS_TABLE_V1: Table = Table {
    name: "teams",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const MY_TEAMS_TABLE_V1: Table = Table {
    name: "my_teams",
    columns: &[
        sqlite_column!("team_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const CHANNELS_TABLE_V1: Table = Table {
    name: "channels",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("team_id", &SqlType::Text, non_null = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_channels_team_id", "team_id")],
};

const MY_CHANNELS_TABLE_V1: Table = Table {
    name: "my_channels",
    columns: &[
        sqlite_column!("channel_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const CATEGORIES_TABLE_V1: Table = Table {
    name: "categories",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("team_id", &SqlType::Text, non_null = true),
        sqlite_column!("type", &SqlType::Text, non_null = true),
        sqlite_column!("sort_order", &SqlType::Integer, non_null = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_categories_team_id", "team_id, sort_order")],
};

const CATEGORY_CHANNELS_TABLE_V1: Table = Table {
    name: "category_channels",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("category_id", &SqlType::Text, non_null = true),
        sqlite_column!("channel_id", &SqlType::Text, non_null = true),
        sqlite_column!("sort_order", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_category_channels_category", "category_id, sort_order"),
        ("idx_category_channels_channel", "channel_id"),
    ],
};

const POSTS_TABLE_V1: Table = Table {
    name: "posts",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("channel_id", &SqlType::Text, non_null = true),
        sqlite_column!("root_id", &SqlType::Text, non_null = true),
        sqlite_column!("create_at", &SqlType::Integer, non_null = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_posts_channel", "channel_id, create_at DESC"),
        ("idx_posts_root", "root_id"),
    ],
};

/// Contiguous window of channel feed posts known locally.
const POSTS_IN_CHANNEL_TABLE_V1: Table = Table {
    name: "posts_in_channel",
    columns: &[
        sqlite_column!("channel_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("earliest", &SqlType::Integer, non_null = true),
        sqlite_column!("latest", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
};

/// Contiguous window of replies known locally, per thread.
const POSTS_IN_THREAD_TABLE_V1: Table = Table {
    name: "posts_in_thread",
    columns: &[
        sqlite_column!("root_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("earliest", &SqlType::Integer, non_null = true),
        sqlite_column!("latest", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
};

const THREADS_TABLE_V1: Table = Table {
    name: "threads",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("last_reply_at", &SqlType::Integer, non_null = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_users_username", "username")],
};

pub const SERVER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        SYSTEM_TABLE_V1,
        TEAMS_TABLE_V1,
        MY_TEAMS_TABLE_V1,
        CHANNELS_TABLE_V1,
        MY_CHANNELS_TABLE_V1,
        CATEGORIES_TABLE_V1,
        CATEGORY_CHANNELS_TABLE_V1,
        POSTS_TABLE_V1,
        POSTS_IN_CHANNEL_TABLE_V1,
        POSTS_IN_THREAD_TABLE_V1,
        THREADS_TABLE_V1,
        USERS_TABLE_V1,
    ],
    migration: None,
}];
