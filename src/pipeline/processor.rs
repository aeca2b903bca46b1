//! Hydration of one notification.

use super::thread_merge::merge_threads;
use crate::fetchers::{absent_on_remote_failure, FetchContext, FetchError, LoadedProfiles, PostQuery};
use crate::metrics::{self, RunOutcome};
use crate::models::{AggregatedPayload, CategorySet, NotificationRequest};
use crate::remote::RemoteFetcher;
use crate::store::{DatabaseHandle, StoreProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POSTS_PER_PAGE: usize = 60;

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Channel posts fetched when nothing is cached for the channel.
    pub posts_per_page: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
        }
    }
}

/// Runs the entity fetchers for a notification and persists what they found.
///
/// Holds no per-run state; exclusive access to the store is the caller's job.
pub struct NotificationProcessor {
    remote: Arc<dyn RemoteFetcher>,
    stores: Arc<dyn StoreProvider>,
    settings: ProcessorSettings,
}

impl NotificationProcessor {
    pub fn new(
        remote: Arc<dyn RemoteFetcher>,
        stores: Arc<dyn StoreProvider>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            remote,
            stores,
            settings,
        }
    }

    /// Hydrate `request`. Returns `None` when there was nothing to hydrate.
    ///
    /// Never fails: remote failures leave the affected fields out, and a run
    /// that could not complete returns what it collected without saving it.
    pub async fn process(&self, request: &NotificationRequest) -> Option<AggregatedPayload> {
        let started = Instant::now();
        let (payload, outcome) = self.run(request).await;
        metrics::record_run(outcome, started.elapsed());
        payload
    }

    async fn run(&self, request: &NotificationRequest) -> (Option<AggregatedPayload>, RunOutcome) {
        let Some(server_url) = request.server_url.as_deref() else {
            warn!("Notification without server url, nothing to fetch");
            return (None, RunOutcome::Skipped);
        };

        let db = match DatabaseHandle::open(self.stores.as_ref(), server_url) {
            Ok(Some(db)) => db,
            Ok(None) => {
                warn!("No database for server {}", server_url);
                return (None, RunOutcome::Skipped);
            }
            Err(e) => {
                error!("Failed to open database for server {}: {:#}", server_url, e);
                return (None, RunOutcome::Failed);
            }
        };

        let channel_label = request.channel_id.as_deref().unwrap_or("-");
        info!(
            "Start fetching notification data in server={} for channel={}",
            server_url, channel_label
        );

        let ctx = FetchContext::new(self.remote.as_ref(), &*db, server_url);
        let mut payload = AggregatedPayload::default();
        let mut loaded = LoadedProfiles::new();
        let complete = match self.hydrate(&ctx, request, &mut payload, &mut loaded).await {
            Ok(complete) => complete,
            Err(e) => {
                warn!(
                    "Incomplete notification data in server={} for channel={}: {}",
                    server_url, channel_label, e
                );
                metrics::record_fetch_failure("run", e.kind());
                false
            }
        };
        if !loaded.is_empty() {
            payload.users = Some(loaded.into_vec());
        }

        if payload.is_empty() {
            debug!("Nothing resolved for server={} channel={}", server_url, channel_label);
            return (None, RunOutcome::Skipped);
        }

        let outcome = if request.is_cold_start {
            debug!("Cold start, leaving the write to the app");
            RunOutcome::NotSaved
        } else if !complete {
            debug!("Incomplete run, not saving server={} channel={}", server_url, channel_label);
            RunOutcome::NotSaved
        } else {
            match db.save_aggregate(
                &payload,
                request.team_id.as_deref(),
                request.channel_id.as_deref(),
                request.is_thread_notification(),
            ) {
                Ok(()) => RunOutcome::Saved,
                Err(e) => {
                    error!("Failed to save notification data: {:#}", e);
                    RunOutcome::NotSaved
                }
            }
        };

        info!(
            "Done processing notification data in server={} for channel={}",
            server_url, channel_label
        );
        (Some(payload), outcome)
    }

    /// Fill `payload` step by step. A store error stops the run early.
    ///
    /// Returns whether the payload may be saved: a notification whose channel
    /// could not be fetched is still hydrated but never written.
    async fn hydrate(
        &self,
        ctx: &FetchContext<'_>,
        request: &NotificationRequest,
        payload: &mut AggregatedPayload,
        loaded: &mut LoadedProfiles,
    ) -> Result<bool, FetchError> {
        if let Some(team_id) = request.team_id.as_deref() {
            let team = ctx.fetch_team(team_id).await?;
            payload.team = team.team;
            payload.my_team = team.my_team;
        }

        let Some((channel_id, _)) = request.targets_channel() else {
            return Ok(true);
        };

        let channel = ctx
            .fetch_channel(channel_id, request.threads_enabled, loaded)
            .await?;
        let channel_resolved = channel.is_some();
        if let Some(channel) = channel {
            loaded.extend(channel.profiles);
            payload.channel = Some(channel.channel);
            payload.my_channel = channel.my_channel;
        }

        payload.categories = match (&payload.team, &payload.my_team, &payload.channel) {
            (Some(team), Some(_), _) => {
                absent_on_remote_failure(ctx.fetch_categories(&team.id).await, "categories")?
                    .map(CategorySet::Full)
            }
            // placement does not need the channel membership
            (_, _, Some(channel)) => ctx
                .place_channel(channel)?
                .map(|channels| CategorySet::Placement { channels }),
            _ => None,
        };

        let query = PostQuery {
            posts_per_page: self.settings.posts_per_page,
            threads_enabled: request.threads_enabled,
            root_id: request.root_id.as_deref(),
        };
        let mut user_ids = Vec::new();
        let mut usernames = Vec::new();
        if let Some(posts) = absent_on_remote_failure(ctx.fetch_posts(channel_id, query).await, "posts")? {
            loaded.extend(posts.profiles);
            user_ids = posts.user_ids;
            usernames = posts.usernames;
            payload.posts = Some(posts.page);
        }

        let mut root_thread = None;
        if let (true, Some(root_id)) = (request.is_thread_notification(), request.root_id.as_deref()) {
            let fetched = ctx.fetch_thread(root_id, request.team_id.as_deref()).await;
            if let Some(thread) = absent_on_remote_failure(fetched, "thread")?.flatten() {
                loaded.extend(thread.profiles);
                user_ids.extend(thread.thread.participants.iter().cloned());
                root_thread = Some(thread.thread);
            }
        }

        // Without a post page there is nothing to attach threads to
        payload.threads = payload
            .posts
            .as_ref()
            .map(|page| merge_threads(root_thread, &page.threads))
            .filter(|threads| !threads.is_empty());

        ctx.fetch_users(&user_ids, &usernames, loaded).await?;
        Ok(channel_resolved)
    }
}
