use crate::models::ThreadSummary;

/// Combine the notification's own thread with the threads of the fetched posts.
///
/// The root thread comes first. Each fetched thread is appended in first-seen
/// order; when its id is already present only `is_following` and
/// `participants` of the existing entry are overwritten.
pub fn merge_threads(root: Option<ThreadSummary>, fetched: &[ThreadSummary]) -> Vec<ThreadSummary> {
    let mut merged: Vec<ThreadSummary> = root.into_iter().collect();

    for thread in fetched {
        match merged.iter_mut().find(|t| t.id == thread.id) {
            Some(existing) => {
                existing.is_following = thread.is_following;
                existing.participants = thread.participants.clone();
            }
            None => merged.push(thread.clone()),
        }
    }

    merged
}
