use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use incbak::backup;
use incbak::diff::CompareMode;
use incbak::restore;

#[derive(Parser)]
#[command(
    name = "incbak",
    about = "Incremental directory backup: archive chains of added and changed files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new incremental backup archive
    Backup {
        /// Path to the source directory (the latest state)
        source_dir: PathBuf,
        /// Path to the base (full) backup archive
        #[arg(long = "base-zip", short = 'b')]
        base_zip: PathBuf,
        /// Path for the new incremental archive to be created
        #[arg(long, short)]
        output: PathBuf,
        /// Existing incremental archives, in order of creation
        #[arg(long, short, num_args = 0..)]
        increments: Vec<PathBuf>,
        /// Comparison mode
        #[arg(long, value_enum, default_value = "fast")]
        mode: CompareMode,
        /// Compress the produced archive
        #[arg(long)]
        compress: bool,
    },
    /// Restore a directory from a backup chain
    Restore {
        /// The sequence of backup archives to apply, in order
        #[arg(required = true)]
        archives: Vec<PathBuf>,
        /// The destination directory to restore files to
        #[arg(long, short)]
        destination: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backup {
            source_dir,
            base_zip,
            output,
            increments,
            mode,
            compress,
        } => {
            println!("Creating backup...");
            println!("  Source: {}", source_dir.display());
            println!("  Base: {}", base_zip.display());
            println!("  Output: {}", output.display());

            let start = Instant::now();
            let summary = backup::create_backup(
                &source_dir,
                &base_zip,
                &increments,
                &output,
                mode,
                compress,
            )
            .await?;
            let elapsed = start.elapsed();

            println!("\nBackup created successfully!");
            println!("  Files added: {}", summary.files_added);
            println!("  Files modified: {}", summary.files_modified);
            println!("  Files deleted: {}", summary.files_deleted);
            println!("  Bytes archived: {}", summary.bytes_archived);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Restore {
            archives,
            destination,
        } => {
            println!(
                "Restoring {} archives to {}...",
                archives.len(),
                destination.display()
            );

            let start = Instant::now();
            let summary = restore::restore_chain(&archives, &destination)?;
            let elapsed = start.elapsed();

            println!("\nRestore complete!");
            println!("  Archives applied: {}", summary.archives_applied);
            println!("  Files written: {}", summary.files_written);
            println!("  Files deleted: {}", summary.files_deleted);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
    }

    Ok(())
}
