//! The `gator` subcommands.
//!
//! Each variant of [`Command`] maps to one handler. Handlers that act on
//! behalf of a user call [`require_user`] first; everything else runs
//! without a login. Output goes to the writer passed to [`run`].
use clap::Subcommand;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigError;
use crate::context::AppContext;
use crate::feed::FeedFetcher;
use crate::ingest::{CycleReport, IngestionPipeline, PollLoop, UserContext};
use crate::storage::{StoreError, User};
use crate::util::{parse_duration, strip_control_chars, validate_feed_url, UrlValidationError};

/// Number of posts shown by `browse` when no limit is given
pub const DEFAULT_BROWSE_LIMIT: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No user is logged in. Run `gator login <name>` or `gator register <name>` first.")]
    NotLoggedIn,

    #[error("User '{0}' is not registered")]
    UnknownUser(String),

    #[error("User '{0}' already exists")]
    UserExists(String),

    #[error("Feed '{0}' already exists")]
    FeedExists(String),

    #[error("A feed with URL {0} is already registered; use `gator follow` instead")]
    FeedUrlTaken(String),

    #[error("No feed registered for {0}; add it with `gator addfeed` first")]
    UnknownFeed(String),

    #[error("Already following {0}")]
    AlreadyFollowing(String),

    #[error("Not following {0}")]
    NotFollowing(String),

    #[error("Interval must be greater than zero")]
    ZeroInterval,

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },

    /// Switch the current user
    Login { name: String },

    /// Delete every user along with their feeds, follows and posts
    Reset,

    /// List registered users
    Users,

    /// Poll followed feeds every INTERVAL (e.g. 30s, 1m, 1h30m) until Ctrl-C
    Agg {
        #[arg(value_parser = parse_duration)]
        interval: Duration,

        /// Deadline for each feed request
        #[arg(long, value_parser = parse_duration, default_value = "10s")]
        timeout: Duration,
    },

    /// Register a feed and follow it
    Addfeed { name: String, url: String },

    /// List every registered feed
    Feeds,

    /// Follow an already registered feed
    Follow { url: String },

    /// Stop following a feed
    Unfollow { url: String },

    /// List feeds the current user follows
    Following,

    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: u32,
    },
}

impl Command {
    /// True for commands that act on behalf of the logged-in user
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Command::Agg { .. }
                | Command::Addfeed { .. }
                | Command::Follow { .. }
                | Command::Unfollow { .. }
                | Command::Following
                | Command::Browse { .. }
        )
    }
}

/// Execute `command` against `ctx`, writing user-facing output to `out`.
///
/// `cancel` only matters for `agg`, which runs until it fires.
pub async fn run(
    ctx: &mut AppContext,
    command: Command,
    cancel: CancellationToken,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    tracing::debug!(command = ?command, "Running command");

    let user = if command.requires_login() {
        Some(require_user(ctx).await?)
    } else {
        None
    };

    match (command, user) {
        (Command::Register { name }, _) => register(ctx, &name, out).await,
        (Command::Login { name }, _) => login(ctx, &name, out).await,
        (Command::Reset, _) => reset(ctx, out).await,
        (Command::Users, _) => list_users(ctx, out).await,
        (Command::Feeds, _) => list_feeds(ctx, out).await,
        (Command::Agg { interval, timeout }, Some(user)) => {
            aggregate(ctx, &user, interval, timeout, cancel, out).await
        }
        (Command::Addfeed { name, url }, Some(user)) => add_feed(ctx, &user, &name, &url, out).await,
        (Command::Follow { url }, Some(user)) => follow(ctx, &user, &url, out).await,
        (Command::Unfollow { url }, Some(user)) => unfollow(ctx, &user, &url, out).await,
        (Command::Following, Some(user)) => following(ctx, &user, out).await,
        (Command::Browse { limit }, Some(user)) => browse(ctx, &user, limit, out).await,
        (_, None) => Err(CommandError::NotLoggedIn),
    }
}

/// Resolve the logged-in user from the config.
///
/// # Errors
///
/// - [`CommandError::NotLoggedIn`] - No current user in the config
/// - [`CommandError::UnknownUser`] - The configured user no longer exists
pub async fn require_user(ctx: &AppContext) -> Result<User, CommandError> {
    let name = ctx
        .config
        .current_user
        .as_deref()
        .ok_or(CommandError::NotLoggedIn)?;
    match ctx.db.get_user(name).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => Err(CommandError::UnknownUser(name.to_string())),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(ctx: &mut AppContext, name: &str, out: &mut dyn Write) -> Result<(), CommandError> {
    let user = match ctx.db.create_user(name).await {
        Ok(user) => user,
        Err(e) if e.is_unique_violation() => return Err(CommandError::UserExists(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    ctx.set_current_user(&user.name)?;

    tracing::info!(user = %user.name, "Registered user");
    writeln!(out, "User '{}' created and logged in.", user.name)?;
    Ok(())
}

async fn login(ctx: &mut AppContext, name: &str, out: &mut dyn Write) -> Result<(), CommandError> {
    let user = match ctx.db.get_user(name).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(CommandError::UnknownUser(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    ctx.set_current_user(&user.name)?;

    writeln!(out, "User '{}' has successfully logged in.", user.name)?;
    Ok(())
}

async fn reset(ctx: &AppContext, out: &mut dyn Write) -> Result<(), CommandError> {
    let removed = ctx.db.reset_users().await?;
    tracing::info!(removed, "Reset users");
    writeln!(out, "Removed {} user(s).", removed)?;
    Ok(())
}

async fn list_users(ctx: &AppContext, out: &mut dyn Write) -> Result<(), CommandError> {
    let current = ctx.config.current_user.as_deref();
    for user in ctx.db.list_users().await? {
        if Some(user.name.as_str()) == current {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}

async fn aggregate(
    ctx: &AppContext,
    user: &User,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    if interval.is_zero() {
        return Err(CommandError::ZeroInterval);
    }

    let pipeline = IngestionPipeline::new(ctx.db.clone(), FeedFetcher::new(ctx.http.clone()))
        .with_timeout(timeout);
    let poll = PollLoop::new(pipeline);

    writeln!(out, "Collecting feeds every {:?}", interval)?;
    out.flush()?;
    let cycles = poll
        .run(interval, &UserContext::user(&user.name), cancel, |report| {
            if let Err(e) = print_report(out, report) {
                tracing::warn!(error = %e, "Failed to print cycle report");
            }
        })
        .await;

    tracing::info!(cycles, "Stopped collecting feeds");
    Ok(())
}

fn print_report(out: &mut dyn Write, report: &CycleReport) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Feed: {} ({} new of {})",
        strip_control_chars(&report.feed_name),
        report.items_inserted,
        report.items_seen
    )?;
    for title in &report.titles {
        writeln!(out, "- {}", strip_control_chars(title))?;
    }
    out.flush()
}

async fn add_feed(
    ctx: &AppContext,
    user: &User,
    name: &str,
    url: &str,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let url = validate_feed_url(url)?;

    if ctx.db.find_user_feed_by_name(user.id, name).await?.is_some() {
        return Err(CommandError::FeedExists(name.to_string()));
    }

    let feed = match ctx.db.create_feed(user.id, name, url.as_str()).await {
        Ok(feed) => feed,
        Err(e) if e.is_unique_violation() => {
            return Err(CommandError::FeedUrlTaken(url.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    ctx.db.follow_feed(user.id, feed.id).await?;

    tracing::info!(feed = %feed.name, url = %feed.url, user = %user.name, "Added feed");
    writeln!(out, "Feed '{}' successfully added.", strip_control_chars(&feed.name))?;
    writeln!(out, "  id:   {}", feed.id)?;
    writeln!(out, "  url:  {}", feed.url)?;
    Ok(())
}

async fn list_feeds(ctx: &AppContext, out: &mut dyn Write) -> Result<(), CommandError> {
    let feeds = ctx.db.list_feeds().await?;
    if feeds.is_empty() {
        writeln!(out, "No feeds registered.")?;
        return Ok(());
    }
    for entry in feeds {
        writeln!(
            out,
            "* {} ({}) added by {}",
            strip_control_chars(&entry.feed.name),
            strip_control_chars(&entry.feed.url),
            strip_control_chars(&entry.owner)
        )?;
    }
    Ok(())
}

async fn follow(
    ctx: &AppContext,
    user: &User,
    url: &str,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let url = validate_feed_url(url)?;
    let url = url.as_str();
    let feed = match ctx.db.get_feed_by_url(url).await {
        Ok(feed) => feed,
        Err(StoreError::NotFound) => return Err(CommandError::UnknownFeed(url.to_string())),
        Err(e) => return Err(e.into()),
    };
    match ctx.db.follow_feed(user.id, feed.id).await {
        Ok(()) => {}
        Err(e) if e.is_unique_violation() => {
            return Err(CommandError::AlreadyFollowing(url.to_string()))
        }
        Err(e) => return Err(e.into()),
    }

    writeln!(
        out,
        "{} now follows '{}' ({}).",
        user.name,
        strip_control_chars(&feed.name),
        feed.url
    )?;
    Ok(())
}

async fn unfollow(
    ctx: &AppContext,
    user: &User,
    url: &str,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let url = validate_feed_url(url)?;
    let url = url.as_str();
    match ctx.db.unfollow_feed(user.id, url).await {
        Ok(()) => {}
        Err(StoreError::NotFound) => return Err(CommandError::NotFollowing(url.to_string())),
        Err(e) => return Err(e.into()),
    }
    writeln!(out, "{} unfollowed {}.", user.name, url)?;
    Ok(())
}

async fn following(ctx: &AppContext, user: &User, out: &mut dyn Write) -> Result<(), CommandError> {
    let feeds = ctx.db.list_followed_feeds(user.id).await?;
    if feeds.is_empty() {
        writeln!(out, "{} is not following any feeds.", user.name)?;
        return Ok(());
    }
    for feed in feeds {
        writeln!(out, "* {}", strip_control_chars(&feed.name))?;
    }
    Ok(())
}

async fn browse(
    ctx: &AppContext,
    user: &User,
    limit: u32,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let posts = ctx.db.get_posts_for_user(user.id, i64::from(limit)).await?;
    if posts.is_empty() {
        writeln!(out, "No posts found.")?;
        return Ok(());
    }

    writeln!(out, "Latest {} posts:", posts.len())?;
    for post in posts {
        writeln!(out)?;
        writeln!(
            out,
            "{} - {} ({})",
            strip_control_chars(&post.feed_name),
            strip_control_chars(&post.title),
            post.published_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(out, "{}", post.url)?;
        if !post.description.is_empty() {
            writeln!(out, "{}", strip_control_chars(&post.description))?;
        }
    }
    Ok(())
}
