//! v2vdb operator tool - inspect and recover a v2vdb data file and its log

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use v2vdb::database::{Database, DatabaseConfig};
use v2vdb::storage::page::{
    BTreeInternalPage, BTreeLeafPage, BTreePage, HeapPage, IndexPageType, PageId,
};
use v2vdb::storage::wal::{WalManager, WalRecordPayload};
use v2vdb::storage::{PageManager, PAGE_SIZE};

/// v2vdb - a page-oriented storage engine
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data file
    #[arg(long, default_value = "v2v-1.db")]
    db: PathBuf,

    /// Write-ahead log file
    #[arg(long, default_value = "wal.log")]
    wal: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay the write-ahead log into the data file
    Recover,

    /// Decode the header of one page
    Inspect {
        page_id: i32,

        /// Decode as a B+Tree page instead of a heap page
        #[arg(long)]
        btree: bool,
    },

    /// List every record in the write-ahead log
    WalDump,

    /// Show file sizes and page counts
    Stats,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Recover => recover(args.db, args.wal),
        Command::Inspect { page_id, btree } => inspect(&args.db, PageId(page_id), btree),
        Command::WalDump => wal_dump(&args.wal),
        Command::Stats => stats(&args.db, &args.wal),
    }
}

fn recover(db: PathBuf, wal: PathBuf) -> Result<()> {
    let config = DatabaseConfig {
        data_path: db,
        wal_path: wal,
        ..Default::default()
    };
    let database = Database::open(config).context("Failed to open database")?;
    let stats = database.recovery_stats();

    println!("records read:           {}", stats.records_read);
    println!("inserts redone:         {}", stats.inserts_redone);
    println!("skipped (applied):      {}", stats.skipped_applied);
    println!("skipped (no space):     {}", stats.skipped_no_space);
    println!("last LSN:               {}", stats.last_lsn.0);
    Ok(())
}

fn inspect(db: &Path, page_id: PageId, btree: bool) -> Result<()> {
    let store = PageManager::open(db).context("Failed to open data file")?;
    let mut buf = Box::new([0u8; PAGE_SIZE]);
    store.read_page(page_id, &mut buf[..])?;

    if !btree {
        let page = HeapPage::from_data(&mut buf);
        println!("heap page {}", page_id);
        println!("  initialized:       {}", page.is_initialized());
        println!("  next page:         {}", page.next_page_id());
        println!("  rows:              {}", page.row_count());
        println!("  free space offset: {}", page.free_space_offset());
        println!("  free bytes:        {}", page.free_space());
        println!("  page LSN:          {}", page.page_lsn().0);
        return Ok(());
    }

    match IndexPageType::of(&buf[..]) {
        IndexPageType::Leaf => {
            let leaf = BTreeLeafPage::from_data(buf);
            print_tree_header("leaf", &leaf);
            println!("  next leaf:   {}", leaf.next_page_id());
            for (key, rid) in leaf.entries() {
                println!("    {} -> {}", key, rid);
            }
        }
        IndexPageType::Internal => {
            let node = BTreeInternalPage::from_data(buf);
            print_tree_header("internal", &node);
            for (i, (key, child)) in node.entries().into_iter().enumerate() {
                if i == 0 {
                    println!("    * -> {}", child);
                } else {
                    println!("    {} -> {}", key, child);
                }
            }
        }
        IndexPageType::Invalid => println!("page {} is not a B+Tree page", page_id),
    }
    Ok(())
}

fn print_tree_header(kind: &str, page: &impl BTreePage) {
    println!("{} page {}", kind, page.page_id());
    println!("  parent:      {}", page.parent_page_id());
    println!("  size:        {}/{}", page.size(), page.max_size());
    println!("  LSN:         {}", page.lsn());
}

fn wal_dump(wal: &Path) -> Result<()> {
    let records = WalManager::read_records(wal)?;
    println!(
        "{:>6} {:>6} {:>6}  {:<8} {:>6} {:>6}",
        "lsn", "prev", "txn", "kind", "page", "bytes"
    );
    for record in &records {
        let (page, len) = match &record.payload {
            WalRecordPayload::Insert { page_id, row } => {
                (page_id.0.to_string(), row.len().to_string())
            }
            _ => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:>6} {:>6} {:>6}  {:<8} {:>6} {:>6}",
            record.lsn.0,
            record.prev_lsn.0,
            record.txn_id,
            format!("{:?}", record.record_type()),
            page,
            len
        );
    }
    println!("{} records", records.len());
    Ok(())
}

fn stats(db: &Path, wal: &Path) -> Result<()> {
    match PageManager::file_size(db) {
        Some(size) => println!(
            "data file: {:?}, {} bytes, {} pages",
            db,
            size,
            size.div_ceil(PAGE_SIZE as u64)
        ),
        None => println!("data file: {:?}, unknown size", db),
    }
    match PageManager::file_size(wal) {
        Some(size) => println!("log file:  {:?}, {} bytes", wal, size),
        None => println!("log file:  {:?}, unknown size", wal),
    }
    Ok(())
}
