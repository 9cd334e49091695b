//! wish-board-demo
//!
//! Mounts one board per member over a shared store and walks a wish through
//! completion, a rejected deletion and a reorder.
//!
//! Usage: `wish-board-demo [config.toml]`

use anyhow::{Context, Result, bail};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::config::TandemConfig;
use tandem_core::prelude::*;
use tandem_runtime::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => TandemConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => TandemConfig::from_env()?,
    };
    tandem_observe::init_tracing(&config.log)?;

    let directory = config.directory()?;
    let admin_session = Session::start(&directory, &config.members.admin)?;
    let user_session = Session::start(&directory, &config.members.user)?;

    let feed = Arc::new(BroadcastFeed::new(config.feed.capacity));
    let store = tandem_db::connect(&config.database, Some(feed.clone())).await?;

    let admin = BoardSync::mount(WishBoard::new(store.clone(), admin_session), feed.as_ref()).await?;
    let user = BoardSync::mount(WishBoard::new(store.clone(), user_session), feed.as_ref()).await?;

    // Completion: admin proposes, the user confirms with a backdated date.
    let wish = first(
        admin
            .dispatch(Command::Add {
                title: "Watch the sunrise from the lighthouse".into(),
            })
            .await?,
    )?;
    wait_for(&user, "new wish", |b| b.get(wish.id).is_some()).await?;

    admin
        .dispatch(Command::Act {
            id: wish.id,
            action: WishAction::ProposeComplete,
        })
        .await?;
    match admin
        .dispatch(Command::Act {
            id: wish.id,
            action: WishAction::confirm(),
        })
        .await
    {
        Err(e @ WishError::InvalidTransition { .. }) => tracing::info!(error = %e, "Self-confirmation refused"),
        other => bail!("admin confirmed their own proposal: {other:?}"),
    }

    wait_for(&user, "proposal", |b| b.allowed_actions(wish.id).contains(&ActionKind::Confirm)).await?;
    let jan_first = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .context("invalid completion date")?;
    user.dispatch(Command::Act {
        id: wish.id,
        action: WishAction::confirm_on(jan_first),
    })
    .await?;

    // Deletion: the user asks, the admin declines.
    let other = first(
        user.dispatch(Command::Add {
            title: "Adopt a cat".into(),
        })
        .await?,
    )?;
    user.dispatch(Command::Act {
        id: other.id,
        action: WishAction::RequestDelete,
    })
    .await?;
    wait_for(&admin, "delete request", |b| {
        b.allowed_actions(other.id).contains(&ActionKind::RejectDelete)
    })
    .await?;
    admin
        .dispatch(Command::Act {
            id: other.id,
            action: WishAction::RejectDelete,
        })
        .await?;

    // Reorder: move the newest wish to the top.
    user.dispatch(Command::Move { from: 1, to: 0 }).await?;
    wait_for(&admin, "reorder", |b| b.wishes().first().map(|w| w.id) == Some(other.id)).await?;

    let board = admin.board();
    let board = board.lock().await;
    println!("{}", serde_json::to_string_pretty(board.wishes())?);
    Ok(())
}

fn first(stored: Vec<Wish>) -> Result<Wish> {
    stored.into_iter().next().context("store returned no row")
}

/// Polls `sync`'s board until `pred` holds.
async fn wait_for(sync: &BoardSync, what: &str, pred: impl Fn(&WishBoard) -> bool) -> Result<()> {
    let board = sync.board();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !pred(&*board.lock().await) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .with_context(|| format!("timed out waiting for {what}"))
}
