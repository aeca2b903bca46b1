//! Domain objects handled by the hydration pipeline.
//!
//! Field names follow the server's JSON representation so the same types are
//! used for remote responses, cached rows and the aggregated payload.

mod entities;
mod payload;
mod request;

pub use entities::{
    CategoriesWithOrder, Category, CategoryChannel, CategoryType, Channel,
    ChannelType, MyChannel, MyTeam, Post, Team, ThreadSummary, UserProfile,
};
pub use payload::{AggregatedPayload, CategorySet, PostPage};
pub use request::NotificationRequest;
