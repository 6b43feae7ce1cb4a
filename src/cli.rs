use anyhow::{Context, Result};
use api::*;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{debug, LevelFilter};
use rust_decimal::Decimal;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::client::Client;

mod api;
mod client;

const TOKEN_FILE: &str = "session_token";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, env = "POOLBET_URL", default_value = "http://127.0.0.1:8081")]
    url: String,
    /// Session token, otherwise the one saved by `login` is used
    #[arg(short, long, env = "POOLBET_TOKEN")]
    token: Option<String>,
    #[arg(short, long)]
    verbose: bool,
}
#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        invite_code: String,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    Me,
    Markets,
    Market {
        #[arg(short, long)]
        id: MarketId,
    },
    NewMarket {
        #[arg(short, long)]
        question: String,
        #[arg(short, long)]
        description: String,
        /// RFC 3339, e.g. 2030-01-01T00:00:00Z
        #[arg(short, long)]
        close_date: Option<DateTime<Utc>>,
    },
    Bet {
        #[arg(short, long)]
        market: MarketId,
        /// YES or NO
        #[arg(short, long)]
        position: String,
        #[arg(short, long)]
        amount: Decimal,
    },
    Quote {
        #[arg(short, long)]
        market: MarketId,
        #[arg(short, long)]
        position: String,
        #[arg(short, long)]
        amount: Decimal,
    },
    Resolve {
        #[arg(short, long)]
        market: MarketId,
        #[arg(short, long)]
        resolution: String,
    },
    MyBets,
    MarketBets {
        #[arg(short, long)]
        market: MarketId,
    },
    ValidateInvite {
        #[arg(short, long)]
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    Builder::default()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .init();
    let token = match cli.token {
        Some(token) => Some(token),
        None => read_token().await.ok(),
    };
    let mut client = Client::new(cli.url).with_token(token);

    match cli.command {
        Commands::Register {
            username,
            email,
            password,
            invite_code,
        } => {
            let request = RegisterRequest {
                username,
                email,
                password,
                invite_code,
            };
            let user = client.register(request).await?;
            println!("Registered {} ({})", user.username, user.id);
            println!("Your invite code: {}", user.invite_code);
        }
        Commands::Login { email, password } => {
            let response = client.login(&email, &password).await?;
            let mut file = File::create(TOKEN_FILE).await?;
            file.write_all(response.session_token.as_bytes()).await?;
            debug!("Saved session token to {}", TOKEN_FILE);
            println!(
                "Logged in as {} with balance {}",
                response.user.username, response.user.balance
            );
        }
        Commands::Logout => {
            client.logout().await?;
            tokio::fs::remove_file(TOKEN_FILE).await.ok();
            println!("Logged out");
        }
        Commands::Me => {
            println!("{:#?}", client.me().await?);
        }
        Commands::Markets => {
            for market in client.get_markets().await? {
                println!(
                    "{} [{}] {} (YES {} | NO {})",
                    market.id, market.status, market.question, market.yes_pool, market.no_pool
                );
            }
        }
        Commands::Market { id } => {
            println!("{:#?}", client.get_market(id).await?);
        }
        Commands::NewMarket {
            question,
            description,
            close_date,
        } => {
            let request = CreateMarketRequest {
                question,
                description,
                close_date,
            };
            let market = client.create_market(request).await?;
            println!("Created new market: {}", market.id);
        }
        Commands::Bet {
            market,
            position,
            amount,
        } => {
            let request = PlaceBetRequest {
                market_id: market,
                position,
                amount,
            };
            let bet = client.place_bet(request).await?;
            println!(
                "Placed bet {}: {} on {}, potential payout {}",
                bet.id, bet.amount, bet.position, bet.potential_payout
            );
        }
        Commands::Quote {
            market,
            position,
            amount,
        } => {
            let quote = client.quote(market, &position, amount).await?;
            println!(
                "{} on {} would currently pay {}",
                quote.amount, quote.position, quote.potential_payout
            );
        }
        Commands::Resolve { market, resolution } => {
            let settlement = client.resolve_market(market, &resolution).await?;
            println!(
                "Resolved as {}: {} of {} bets won, {} paid out",
                resolution.to_uppercase(),
                settlement.winning_bets,
                settlement.bets_settled,
                settlement.total_paid
            );
        }
        Commands::MyBets => {
            println!("{:#?}", client.my_bets().await?);
        }
        Commands::MarketBets { market } => {
            println!("{:#?}", client.get_market_bets(market).await?);
        }
        Commands::ValidateInvite { code } => {
            let valid = client.validate_invite_code(&code).await?;
            println!("{} is {}", code, if valid { "valid" } else { "not valid" });
        }
    }
    Ok(())
}
async fn read_token() -> Result<String> {
    let mut file = File::open(TOKEN_FILE)
        .await
        .with_context(|| format!("No {} file, log in first", TOKEN_FILE))?;
    let mut contents = vec![];
    file.read_to_end(&mut contents).await?;
    Ok(String::from_utf8(contents)?.trim().to_string())
}
