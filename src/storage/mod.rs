//! SQLite persistence for users, feeds, follows and posts.
//!
//! All operations live as methods on [`Database`], split by table into
//! submodules. [`Database`] also implements the ingestion core's
//! [`FeedStore`](crate::ingest::FeedStore) trait.

mod feeds;
mod follows;
mod posts;
mod schema;
mod store;
mod types;
mod users;

pub use schema::Database;
pub use types::{
    Feed, FeedIdentity, FeedWithOwner, InsertOutcome, NewPost, Post, StoreError, User,
};
