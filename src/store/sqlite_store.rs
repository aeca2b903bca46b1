//! SQLite-backed cache database of one server.

use super::schema::SERVER_VERSIONED_SCHEMAS;
use super::trait_def::ServerDatabase;
use crate::models::{
    AggregatedPayload, Category, CategoryChannel, CategorySet, Channel, MyChannel, MyTeam,
    PostPage, Team, ThreadSummary, UserProfile,
};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

const CURRENT_USER_ID: &str = "currentUserId";
const CURRENT_TEAM_ID: &str = "currentTeamId";
const LAST_SAVED_AT: &str = "lastNotificationSavedAt";

pub struct SqliteServerDatabase {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize entity")
}

fn from_json<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).context("Failed to deserialize cached entity")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl SqliteServerDatabase {
    /// Open (creating if needed) the database at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path)
            .with_context(|| format!("Failed to open server database at {:?}", path))?;
        open_versioned(&mut conn, SERVER_VERSIONED_SCHEMAS)
            .with_context(|| format!("Server database at {:?} has an unexpected schema", path))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path,
        })
    }

    pub fn set_current_user_id(&self, user_id: &str) -> Result<()> {
        self.set_system_value(CURRENT_USER_ID, user_id)
    }

    pub fn set_current_team_id(&self, team_id: &str) -> Result<()> {
        self.set_system_value(CURRENT_TEAM_ID, team_id)
    }

    /// When the last notification aggregate was written, as RFC 3339.
    pub fn last_saved_at(&self) -> Result<Option<String>> {
        self.get_system_value(LAST_SAVED_AT)
    }

    /// Cached channel, as last written by a run.
    pub fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        self.get_document("SELECT data FROM channels WHERE id = ?1", channel_id)
    }

    pub fn get_my_channel(&self, channel_id: &str) -> Result<Option<MyChannel>> {
        self.get_document(
            "SELECT data FROM my_channels WHERE channel_id = ?1",
            channel_id,
        )
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Server database lock poisoned"))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Server database {:?} is closed", self.path))?;
        f(conn)
    }

    fn with_transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Server database lock poisoned"))?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| anyhow!("Server database {:?} is closed", self.path))?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    fn get_system_value(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM system WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn set_system_value(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO system (id, value) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn get_document<T: DeserializeOwned>(&self, sql: &str, key: &str) -> Result<Option<T>> {
        let data: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(sql, params![key], |row| row.get(0))
                .optional()?)
        })?;
        data.as_deref().map(from_json).transpose()
    }

    fn get_documents<T: DeserializeOwned>(&self, sql: &str, keys: &[String]) -> Result<Vec<T>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql.replace("{keys}", &placeholders(keys.len())))?;
            let rows = stmt
                .query_map(params_from_iter(keys.iter()), |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(rows)
        })?;
        rows.iter().map(|data| from_json(data)).collect()
    }

    // =========================================================================
    // Write helpers, all running inside the aggregate transaction
    // =========================================================================

    fn upsert_team(tx: &Transaction, team: &Team) -> Result<()> {
        tx.execute(
            "INSERT INTO teams (id, data) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = ?2",
            params![team.id, to_json(team)?],
        )?;
        Ok(())
    }

    fn upsert_my_team(tx: &Transaction, my_team: &MyTeam) -> Result<()> {
        tx.execute(
            "INSERT INTO my_teams (team_id, data) VALUES (?1, ?2)
             ON CONFLICT(team_id) DO UPDATE SET data = ?2",
            params![my_team.team_id, to_json(my_team)?],
        )?;
        Ok(())
    }

    fn upsert_channel(tx: &Transaction, channel: &Channel) -> Result<()> {
        tx.execute(
            "INSERT INTO channels (id, team_id, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET team_id = ?2, data = ?3",
            params![channel.id, channel.team_id, to_json(channel)?],
        )?;
        Ok(())
    }

    fn upsert_my_channel(tx: &Transaction, my_channel: &MyChannel) -> Result<()> {
        tx.execute(
            "INSERT INTO my_channels (channel_id, data) VALUES (?1, ?2)
             ON CONFLICT(channel_id) DO UPDATE SET data = ?2",
            params![my_channel.channel_id, to_json(my_channel)?],
        )?;
        Ok(())
    }

    fn upsert_category_channel(tx: &Transaction, placement: &CategoryChannel) -> Result<()> {
        tx.execute(
            "INSERT INTO category_channels (id, category_id, channel_id, sort_order)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET category_id = ?2, channel_id = ?3, sort_order = ?4",
            params![
                placement.id,
                placement.category_id,
                placement.channel_id,
                placement.sort_order
            ],
        )?;
        Ok(())
    }

    /// Replace every category of the teams present in `categories`.
    fn replace_categories(tx: &Transaction, categories: &[Category], order: &[String]) -> Result<()> {
        let mut team_ids: Vec<&str> = categories.iter().map(|c| c.team_id.as_str()).collect();
        team_ids.dedup();
        for team_id in team_ids {
            tx.execute(
                "DELETE FROM category_channels WHERE category_id IN
                 (SELECT id FROM categories WHERE team_id = ?1)",
                params![team_id],
            )?;
            tx.execute("DELETE FROM categories WHERE team_id = ?1", params![team_id])?;
        }

        let positions: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        for category in categories {
            let sort_order = positions
                .get(category.id.as_str())
                .map(|p| *p as i64)
                .unwrap_or(category.sort_order);
            tx.execute(
                "INSERT INTO categories (id, team_id, type, sort_order, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    category.id,
                    category.team_id,
                    serde_json::to_value(category.category_type)?
                        .as_str()
                        .unwrap_or("custom"),
                    sort_order,
                    to_json(category)?
                ],
            )?;
            for (index, channel_id) in category.channel_ids.iter().enumerate() {
                let placement =
                    CategoryChannel::new(&category.team_id, &category.id, channel_id, index as i64);
                Self::upsert_category_channel(tx, &placement)?;
            }
        }
        Ok(())
    }

    /// Extend a stored `[earliest, latest]` window with a new range.
    fn extend_window(
        tx: &Transaction,
        table: &str,
        key_column: &str,
        key: &str,
        earliest: i64,
        latest: i64,
    ) -> Result<()> {
        tx.execute(
            &format!(
                "INSERT INTO {table} ({key_column}, earliest, latest) VALUES (?1, ?2, ?3)
                 ON CONFLICT({key_column}) DO UPDATE SET
                    earliest = MIN(earliest, ?2),
                    latest = MAX(latest, ?3)"
            ),
            params![key, earliest, latest],
        )?;
        Ok(())
    }

    fn save_posts(
        tx: &Transaction,
        page: &PostPage,
        channel_id: Option<&str>,
        is_thread_notification: bool,
    ) -> Result<()> {
        for post in page.posts.values() {
            tx.execute(
                "INSERT INTO posts (id, channel_id, root_id, create_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET data = ?5",
                params![
                    post.id,
                    post.channel_id,
                    post.root_id,
                    post.create_at,
                    to_json(post)?
                ],
            )?;
        }

        // With threads enabled replies are not part of the channel feed
        if let Some(channel_id) = channel_id {
            let feed_times: Vec<i64> = page
                .posts
                .values()
                .filter(|p| p.channel_id == channel_id && (!is_thread_notification || p.is_root()))
                .map(|p| p.create_at)
                .collect();
            if let (Some(earliest), Some(latest)) =
                (feed_times.iter().min(), feed_times.iter().max())
            {
                Self::extend_window(
                    tx,
                    "posts_in_channel",
                    "channel_id",
                    channel_id,
                    *earliest,
                    *latest,
                )?;
            }
        }

        if is_thread_notification {
            let mut per_root: HashMap<&str, (i64, i64)> = HashMap::new();
            for reply in page.posts.values().filter(|p| !p.is_root()) {
                let entry = per_root
                    .entry(reply.root_id.as_str())
                    .or_insert((reply.create_at, reply.create_at));
                entry.0 = entry.0.min(reply.create_at);
                entry.1 = entry.1.max(reply.create_at);
            }
            for (root_id, (earliest, latest)) in per_root {
                Self::extend_window(tx, "posts_in_thread", "root_id", root_id, earliest, latest)?;
            }
        }
        Ok(())
    }

    fn upsert_thread(tx: &Transaction, thread: &ThreadSummary) -> Result<()> {
        tx.execute(
            "INSERT INTO threads (id, last_reply_at, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET last_reply_at = ?2, data = ?3",
            params![thread.id, thread.last_reply_at, to_json(thread)?],
        )?;
        Ok(())
    }

    fn upsert_user(tx: &Transaction, user: &UserProfile) -> Result<()> {
        tx.execute(
            "INSERT INTO users (id, username, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET username = ?2, data = ?3",
            params![user.id, user.username, to_json(user)?],
        )?;
        Ok(())
    }
}

impl ServerDatabase for SqliteServerDatabase {
    fn current_user_id(&self) -> Result<Option<String>> {
        self.get_system_value(CURRENT_USER_ID)
    }

    fn current_team_id(&self) -> Result<Option<String>> {
        self.get_system_value(CURRENT_TEAM_ID)
    }

    fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        self.get_document("SELECT data FROM teams WHERE id = ?1", team_id)
    }

    fn get_my_team(&self, team_id: &str) -> Result<Option<MyTeam>> {
        self.get_document("SELECT data FROM my_teams WHERE team_id = ?1", team_id)
    }

    fn get_my_team_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT team_id FROM my_teams ORDER BY team_id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }

    fn get_categories(&self, team_id: &str) -> Result<Vec<Category>> {
        self.get_documents(
            "SELECT data FROM categories WHERE team_id IN ({keys}) ORDER BY sort_order",
            &[team_id.to_string()],
        )
    }

    fn get_category_channels(&self, category_id: &str) -> Result<Vec<CategoryChannel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, category_id, channel_id, sort_order FROM category_channels
                 WHERE category_id = ?1 ORDER BY sort_order",
            )?;
            let rows = stmt
                .query_map(params![category_id], |row| {
                    Ok(CategoryChannel {
                        id: row.get(0)?,
                        category_id: row.get(1)?,
                        channel_id: row.get(2)?,
                        sort_order: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn is_channel_categorized(&self, team_id: &str, channel_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM category_channels cc
                     JOIN categories c ON c.id = cc.category_id
                     WHERE c.team_id = ?1 AND cc.channel_id = ?2",
                    params![team_id, channel_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn latest_channel_post_at(&self, channel_id: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT latest FROM posts_in_channel WHERE channel_id = ?1",
                    params![channel_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn get_users(&self, user_ids: &[String]) -> Result<Vec<UserProfile>> {
        self.get_documents("SELECT data FROM users WHERE id IN ({keys})", user_ids)
    }

    fn get_users_by_username(&self, usernames: &[String]) -> Result<Vec<UserProfile>> {
        self.get_documents(
            "SELECT data FROM users WHERE username IN ({keys})",
            usernames,
        )
    }

    fn save_aggregate(
        &self,
        payload: &AggregatedPayload,
        team_id: Option<&str>,
        channel_id: Option<&str>,
        is_thread_notification: bool,
    ) -> Result<()> {
        self.with_transaction(|tx| {
            if let Some(team) = &payload.team {
                Self::upsert_team(tx, team)?;
            }
            if let Some(my_team) = &payload.my_team {
                Self::upsert_my_team(tx, my_team)?;
            }
            if let Some(channel) = &payload.channel {
                Self::upsert_channel(tx, channel)?;
            }
            if let Some(my_channel) = &payload.my_channel {
                Self::upsert_my_channel(tx, my_channel)?;
            }
            match &payload.categories {
                Some(CategorySet::Full(full)) => {
                    Self::replace_categories(tx, &full.categories, &full.order)?
                }
                Some(CategorySet::Placement { channels }) => {
                    for placement in channels {
                        Self::upsert_category_channel(tx, placement)?;
                    }
                }
                None => {}
            }
            if let Some(page) = &payload.posts {
                Self::save_posts(tx, page, channel_id, is_thread_notification)?;
            }
            for thread in payload.threads.as_deref().unwrap_or_default() {
                Self::upsert_thread(tx, thread)?;
            }
            for user in payload.users.as_deref().unwrap_or_default() {
                Self::upsert_user(tx, user)?;
            }
            tx.execute(
                "INSERT INTO system (id, value) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET value = ?2",
                params![LAST_SAVED_AT, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })?;

        info!(
            "Saved notification data for team={:?} channel={:?} thread={}",
            team_id, channel_id, is_thread_notification
        );
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            if guard.take().is_some() {
                debug!("Closed server database {:?}", self.path);
            }
        }
    }
}
