mod cli;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::Level;

use auction_engine::{AuctionRegistry, EventSink, Gift, InMemoryRepository, LoggingSink, RoundPlan, User};

use cli::{Cli, Commands};

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn parse_plan(raw: &[String]) -> Result<Vec<RoundPlan>> {
    raw.iter()
        .map(|entry| {
            let (winners, seconds) = entry
                .split_once(':')
                .with_context(|| format!("invalid --plan entry `{entry}`, expected WINNERS:SECONDS"))?;
            Ok(RoundPlan {
                count_of_gifts: winners.parse().context("winners must be a non-negative integer")?,
                duration_seconds: seconds.parse().context("seconds must be a non-negative integer")?,
            })
        })
        .collect()
}

fn parse_balances(raw: &[String]) -> Result<Vec<User>> {
    let now = now_millis();
    raw.iter()
        .map(|entry| {
            let (user, balance) = entry
                .split_once(':')
                .with_context(|| format!("invalid --balance entry `{entry}`, expected USER:BALANCE"))?;
            Ok(User {
                id: user.to_string(),
                username: user.to_string(),
                first_name: user.to_string(),
                last_name: None,
                avatar: None,
                balance: balance.parse().context("balance must be an integer")?,
                is_bot: false,
                created_at: now,
                last_active_at: now,
            })
        })
        .collect()
}

struct ScriptedBid {
    offset_ms: u64,
    user: String,
    amount: i64,
}

fn parse_bids(raw: &[String]) -> Result<Vec<ScriptedBid>> {
    raw.iter()
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let (Some(offset), Some(user), Some(amount)) = (parts.next(), parts.next(), parts.next()) else {
                bail!("invalid --bid entry `{entry}`, expected OFFSET_MS:USER:AMOUNT");
            };
            Ok(ScriptedBid {
                offset_ms: offset.parse().context("offset must be a non-negative integer")?,
                user: user.to_string(),
                amount: amount.parse().context("amount must be an integer")?,
            })
        })
        .collect()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Commands::Run {
        name,
        gift,
        plan,
        balances,
        bids,
        fast,
    } = cli.command;

    let plan = parse_plan(&plan)?;
    let users = parse_balances(&balances)?;
    let bids = parse_bids(&bids)?;

    if fast {
        tokio::time::pause();
    }

    let repo = Arc::new(InMemoryRepository::new());
    let sink: Arc<dyn EventSink> = Arc::new(LoggingSink);
    repo.bulk_create_users(users).await?;

    let registry = AuctionRegistry::new(repo.clone(), sink);
    let total_seconds: u64 = plan.iter().map(|r| r.duration_seconds).sum();

    let gift = Gift {
        id: "gift-1".to_string(),
        name: gift,
    };
    let engine = registry
        .create(name, gift, plan, now_millis())
        .await
        .context("failed to create auction")?;
    engine.start_round().await.context("failed to start first round")?;

    let mut handles = Vec::with_capacity(bids.len());
    let max_offset_ms = bids.iter().map(|b| b.offset_ms).max().unwrap_or(0);
    for bid in bids {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(bid.offset_ms)).await;
            match engine.place_bid(&bid.user, bid.amount) {
                Ok(accepted) => tracing::info!(
                    user = %bid.user,
                    amount = accepted.amount,
                    timestamp = accepted.timestamp,
                    "bid accepted"
                ),
                Err(err) => tracing::warn!(user = %bid.user, amount = bid.amount, %err, "bid rejected"),
            }
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }

    // Anti-snipe can push each round's deadline out by its extension; wait
    // generously for every round plus that slack before reporting results.
    let tail = Duration::from_secs(total_seconds.max(max_offset_ms / 1000) + 10 * engine.plan().len() as u64 + 1);
    tokio::time::sleep(tail).await;

    if let Some(record) = repo.get_auction(engine.id()).await? {
        println!("auction {} finished: {:?}", record.id, record.status);
        for winner in &record.winners {
            println!(
                "  gift #{}: {} ({} stars)",
                winner.gift_number, winner.user_id, winner.stars
            );
        }
    }

    Ok(())
}
