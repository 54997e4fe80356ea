//! banksim - bank/ATM simulation driver
//!
//! Reads a binary trace file, builds the pipe topology (two
//! unidirectional pipes per ATM), runs the bank dispatch loop and one
//! ATM engine per identity, then dumps the final account balances.
//!
//! # Usage
//!
//! ```bash
//! # Write a small demonstration trace
//! banksim generate demo.trace --atms 2 --accounts 2
//!
//! # Run it
//! banksim run demo.trace
//!
//! # Enable debug logging
//! RUST_LOG=bankd=debug,atm=debug banksim run demo.trace
//! ```

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::unix::pipe;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use atm::AtmEngine;
use bank_protocol::trace::{TraceFile, TraceWriter};
use bank_protocol::Command;
use bankd::{BankServer, Teller};

/// Bank/ATM simulation over pipe channels
#[derive(Parser, Debug)]
#[command(name = "banksim", version, about)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the simulation described by a trace file
    Run {
        /// Path to the binary trace file
        trace: PathBuf,
    },
    /// Write a small demonstration trace
    Generate {
        /// Path of the trace file to create
        out: PathBuf,

        /// Number of ATM processes
        #[arg(long, default_value_t = 2)]
        atms: i32,

        /// Number of accounts
        #[arg(long, default_value_t = 2)]
        accounts: i32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Cmd::Run { trace } => run_simulation(trace),
        Cmd::Generate {
            out,
            atms,
            accounts,
        } => generate_trace(out, atms, accounts),
    }
}

/// Runs the whole simulation (async entry point).
#[tokio::main]
async fn run_simulation(path: PathBuf) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("banksim=info".parse()?)
                .add_directive("bankd=info".parse()?)
                .add_directive("atm=info".parse()?)
                .add_directive("bank_protocol=info".parse()?),
        )
        .init();

    let mut trace = TraceFile::open(&path)
        .with_context(|| format!("could not open trace file {}", path.display()))?;
    let atm_count = trace.header().atm_count;
    let account_count = trace.header().account_count;
    info!(atm_count, account_count, trace = %path.display(), "trace loaded");

    let commands = trace.commands().context("could not read trace commands")?;

    // Two unidirectional pipes per ATM: atm -> bank and bank -> atm.
    // The engines and the server never create channels themselves.
    let mut bank_channels = Vec::with_capacity(atm_count as usize);
    let mut atm_tasks = Vec::with_capacity(atm_count as usize);
    for atm_id in 0..atm_count {
        let (to_bank_tx, to_bank_rx) = pipe::pipe().context("could not create pipe")?;
        let (to_atm_tx, to_atm_rx) = pipe::pipe().context("could not create pipe")?;
        bank_channels.push((to_bank_rx, to_atm_tx));

        // every ATM filters its own work out of the full trace stream
        let commands = commands.clone();
        atm_tasks.push(tokio::spawn(async move {
            let mut engine = AtmEngine::new(atm_id, to_atm_rx, to_bank_tx);
            engine.run(commands).await
        }));
    }

    let teller = Teller::new(atm_count as usize, account_count as usize);
    let server = BankServer::new(teller, bank_channels);
    let bank_task = tokio::spawn(server.run());

    let mut atm_failures = 0usize;
    for (atm_id, task) in atm_tasks.into_iter().enumerate() {
        match task.await {
            Ok(Ok(())) => info!(atm = atm_id, "ATM exited"),
            Ok(Err(err)) => {
                error!(atm = atm_id, error = %err, "ATM engine failed");
                atm_failures += 1;
            }
            Err(err) => {
                error!(atm = atm_id, error = %err, "ATM task panicked");
                atm_failures += 1;
            }
        }
    }

    let ledger = match bank_task.await.context("bank task aborted")? {
        Ok(ledger) => ledger,
        Err(err) => bail!("bank dispatch loop failed: {err}"),
    };

    println!("bank: dump and close");
    ledger
        .dump(io::stdout().lock())
        .context("could not dump ledger")?;

    if atm_failures > 0 {
        bail!("{atm_failures} ATM engine(s) failed");
    }
    Ok(())
}

/// Writes a demonstration trace exercising every request kind.
fn generate_trace(path: PathBuf, atms: i32, accounts: i32) -> Result<()> {
    let mut writer = TraceWriter::create(&path, atms, accounts)
        .with_context(|| format!("could not create trace file {}", path.display()))?;

    for atm_id in 0..atms {
        let account = atm_id % accounts;
        let other = (atm_id + 1) % accounts;
        writer.write_command(&Command::connect(atm_id))?;
        writer.write_command(&Command::deposit(atm_id, account, 100))?;
        writer.write_command(&Command::transfer(atm_id, account, other, 40))?;
        writer.write_command(&Command::withdraw(atm_id, account, 10))?;
        writer.write_command(&Command::balance(atm_id, account))?;
        writer.write_command(&Command::exit(atm_id))?;
    }
    writer.finish()?;

    println!(
        "wrote trace for {atms} ATM(s) and {accounts} account(s) to {}",
        path.display()
    );
    Ok(())
}
