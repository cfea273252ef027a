//! dbdump Inspect Binary
//!
//! Offline inspection and verification of dump files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dbdump::format::{checksum_hex, MAX_SUPPORTED_VERSION};
use dbdump::Config;
use tracing_subscriber::{fmt, EnvFilter};

/// dbdump Inspect
#[derive(Parser, Debug)]
#[command(name = "dbdump-inspect")]
#[command(about = "Inspect and verify database dump files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header and block table
    Info {
        /// Dump file
        file: PathBuf,

        /// Also list every chunk's size and checksum
        #[arg(short, long)]
        chunks: bool,
    },

    /// Read every chunk and check its checksum
    Verify {
        /// Dump file
        file: PathBuf,

        /// Number of blocks read concurrently
        #[arg(short, long, default_value = "4")]
        fan_out: usize,

        /// Highest archive format version to accept
        #[arg(long, default_value_t = MAX_SUPPORTED_VERSION)]
        max_version: u64,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dbdump=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::debug!("dbdump-inspect v{}", dbdump::VERSION);

    let result = match args.command {
        Command::Info { file, chunks } => info(file, chunks),
        Command::Verify {
            file,
            fan_out,
            max_version,
        } => verify(file, fan_out, max_version),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn info(file: PathBuf, show_chunks: bool) -> dbdump::Result<()> {
    let info = dbdump::parse(&file)?;

    println!("file:            {}", info.path.display());
    println!("format version:  {}", info.dump_version);
    println!("server time:     {}", info.server_timestamp);
    println!(
        "server version:  {}",
        String::from_utf8_lossy(&info.server_version)
    );
    println!("schema:          {} bytes", info.schema_text.len());
    println!("data offset:     {}", info.header_offset);
    println!("data size:       {} bytes", info.data_size());
    println!("blocks:          {}", info.blocks.len());

    for block in &info.blocks {
        println!(
            "  {}  size={} chunks={} offset={} deps={}",
            block.object_id,
            block.total_data_size,
            block.chunks.len(),
            block.data_offset,
            block.dependency_ids.len()
        );
        if show_chunks {
            for (i, chunk) in block.chunks.iter().enumerate() {
                println!(
                    "      [{}] {} bytes  sha1={}",
                    i,
                    chunk.size,
                    checksum_hex(&chunk.checksum)
                );
            }
        }
    }
    Ok(())
}

fn verify(file: PathBuf, fan_out: usize, max_version: u64) -> dbdump::Result<()> {
    let config = Config::builder()
        .fan_out(fan_out)
        .max_supported_version(max_version)
        .build();

    let report = dbdump::verify(&file, &config)?;
    println!(
        "OK: {} blocks, {} chunks, {} bytes",
        report.blocks, report.chunks, report.bytes
    );
    Ok(())
}
