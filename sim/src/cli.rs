//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "auction-sim")]
#[command(about = "Drives the gift auction engine through a scripted run for demos and load testing.", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (-v, -vv for increasing verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one auction from a round plan and a scripted bid timeline
    Run {
        /// Auction name
        #[arg(long, default_value = "demo auction")]
        name: String,

        /// Gift name awarded to every winner
        #[arg(long, default_value = "golden ticket")]
        gift: String,

        /// Round plan as repeated `winners:duration_seconds` pairs, e.g.
        /// `--plan 2:30 --plan 3:60`
        #[arg(long = "plan", value_name = "WINNERS:SECONDS", required = true)]
        plan: Vec<String>,

        /// Seed balances as repeated `user:balance` pairs, e.g.
        /// `--balance alice:100 --balance bob:50`
        #[arg(long = "balance", value_name = "USER:BALANCE")]
        balances: Vec<String>,

        /// Scripted bids as repeated `offset_ms:user:amount` triples,
        /// relative to the start of the auction, e.g. `--bid 0:alice:10`
        #[arg(long = "bid", value_name = "OFFSET_MS:USER:AMOUNT")]
        bids: Vec<String>,

        /// Run under a paused virtual clock so round timers resolve
        /// instantly instead of waiting in real time
        #[arg(long)]
        fast: bool,
    },
}
