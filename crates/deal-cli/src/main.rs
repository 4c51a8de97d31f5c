//! `dealctl` binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deal_cli::cli::{Cli, Commands, TicketCommands};
use deal_cli::commands::{MarketCommand, TicketCommand, TokenCommand};
use deal_cli::context::Context;
use deal_cli::output::OutputFormat;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    if let Commands::Keygen { out, force } = &cli.command {
        // Needs no configuration, so a broken config file cannot block it.
        let ctx = Context::for_config(deal_token::CoreConfig::default());
        TokenCommand::new(&ctx).keygen(&mut stdout, &format, out, *force)?;
        return Ok(());
    }

    let ctx = Context::from_cli(&cli).context("resolving configuration")?;
    match cli.command {
        Commands::Keygen { .. } => {}
        Commands::Balance { address } => {
            TokenCommand::new(&ctx)
                .balance(&mut stdout, &format, address.as_deref())
                .await?;
        }
        Commands::Mint { metadata } => {
            TokenCommand::new(&ctx)
                .mint(&mut stdout, &format, &metadata)
                .await?;
        }
        Commands::Resume { mint, metadata } => {
            TokenCommand::new(&ctx)
                .resume(&mut stdout, &format, &mint, &metadata)
                .await?;
        }
        Commands::MintInfo { mint } => {
            TokenCommand::new(&ctx).info(&mut stdout, &format, &mint).await?;
        }
        Commands::Transfer { mint, to } => {
            MarketCommand::new(&ctx)
                .transfer(&mut stdout, &format, &mint, &to)
                .await?;
        }
        Commands::List { mint, price } => {
            MarketCommand::new(&ctx)
                .list(&mut stdout, &format, &mint, &price)
                .await?;
        }
        Commands::Buy { listing } => {
            MarketCommand::new(&ctx)
                .buy(&mut stdout, &format, &listing)
                .await?;
        }
        Commands::Redeem { mint } => {
            MarketCommand::new(&ctx).redeem(&mut stdout, &format, &mint).await?;
        }
        Commands::Ticket { command } => {
            let cmd = TicketCommand::new(&ctx)?;
            match command {
                TicketCommands::Issue { deal, out } => {
                    cmd.issue(&mut stdout, &format, &deal, out.as_deref())?;
                }
                TicketCommands::Verify { ticket } => {
                    cmd.verify(&mut stdout, &format, &ticket)?;
                }
            }
        }
    }

    Ok(())
}
