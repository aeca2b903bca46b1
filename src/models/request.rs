//! Input of a hydration run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifiers carried by a push notification.
///
/// Built once by the caller and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub server_url: Option<String>,
    pub team_id: Option<String>,
    pub channel_id: Option<String>,
    pub post_id: Option<String>,
    pub root_id: Option<String>,
    /// Collapsed reply threads are enabled for this user.
    #[serde(default)]
    pub threads_enabled: bool,
    /// The process was launched to handle this notification.
    #[serde(default)]
    pub is_cold_start: bool,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

impl NotificationRequest {
    /// Builds a request from the raw string map delivered with the push.
    ///
    /// Empty strings are treated like missing keys.
    pub fn from_push_data(data: &HashMap<String, String>, is_cold_start: bool) -> Self {
        Self {
            server_url: non_empty(data.get("server_url")),
            team_id: non_empty(data.get("team_id")),
            channel_id: non_empty(data.get("channel_id")),
            post_id: non_empty(data.get("post_id")),
            root_id: non_empty(data.get("root_id")),
            threads_enabled: data.get("is_crt_enabled").map(String::as_str) == Some("true"),
            is_cold_start,
        }
    }

    /// The notification is a reply delivered to the threads view.
    pub fn is_thread_notification(&self) -> bool {
        self.threads_enabled && self.root_id.is_some()
    }

    /// Channel and post are both known, so the channel side can be hydrated.
    pub fn targets_channel(&self) -> Option<(&str, &str)> {
        match (&self.channel_id, &self.post_id) {
            (Some(channel_id), Some(post_id)) => Some((channel_id.as_str(), post_id.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_push_data() {
        let data = push_data(&[
            ("server_url", "https://chat.example.com"),
            ("team_id", "t1"),
            ("channel_id", "c1"),
            ("post_id", "p1"),
            ("root_id", "r1"),
            ("is_crt_enabled", "true"),
        ]);

        let request = NotificationRequest::from_push_data(&data, true);
        assert_eq!(request.server_url.as_deref(), Some("https://chat.example.com"));
        assert_eq!(request.team_id.as_deref(), Some("t1"));
        assert_eq!(request.targets_channel(), Some(("c1", "p1")));
        assert!(request.threads_enabled);
        assert!(request.is_cold_start);
        assert!(request.is_thread_notification());
    }

    #[test]
    fn test_empty_values_are_missing() {
        let data = push_data(&[
            ("server_url", "https://chat.example.com"),
            ("team_id", ""),
            ("channel_id", "c1"),
            ("root_id", ""),
            ("is_crt_enabled", "false"),
        ]);

        let request = NotificationRequest::from_push_data(&data, false);
        assert!(request.team_id.is_none());
        assert!(request.root_id.is_none());
        assert!(request.targets_channel().is_none());
        assert!(!request.threads_enabled);
        assert!(!request.is_thread_notification());
    }

    #[test]
    fn test_thread_notification_requires_threads_enabled() {
        let request = NotificationRequest {
            server_url: Some("https://chat.example.com".to_string()),
            root_id: Some("r1".to_string()),
            threads_enabled: false,
            ..Default::default()
        };
        assert!(!request.is_thread_notification());
    }
}
