//! Walks through the engine's API: atomic batches, iteration, snapshots
//! and a custom key order.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kvlite::{
    Comparator, Db, Options, ReadOptions, Result, StorageIterator, WriteBatch, WriteOptions,
};

#[derive(Parser, Debug)]
#[command(name = "kvlite-demo", about = "Exercise the kvlite engine")]
struct Args {
    /// Directory the demo stores are created under.
    #[arg(long, default_value = "/tmp/kvlite-demo")]
    dir: PathBuf,

    /// Delete the demo stores before running.
    #[arg(long)]
    fresh: bool,
}

/// Orders keys by two integer fields: the leading digit, then the number
/// formed by the remaining digits (-1 when there are none). Keys that do
/// not parse sort first.
struct TwoPartComparator;

impl TwoPartComparator {
    fn parts(key: &[u8]) -> (i64, i64) {
        let text = std::str::from_utf8(key).unwrap_or("").trim();
        let mut chars = text.chars();
        let head = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .map_or(-1, i64::from);
        let tail = chars.as_str().parse::<i64>().unwrap_or(-1);
        (head, tail)
    }
}

impl Comparator for TwoPartComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        Self::parts(a).cmp(&Self::parts(b))
    }

    fn name(&self) -> &str {
        "TwoPartComparator"
    }
}

fn dump(db: &Db, options: &ReadOptions<'_>) -> Result<()> {
    let mut it = db.iter(options)?;
    it.seek_to_first()?;
    while it.is_valid() {
        println!(
            "{}:{}",
            String::from_utf8_lossy(it.key()),
            String::from_utf8_lossy(it.value())
        );
        it.next()?;
    }
    println!();
    Ok(())
}

fn run(dir: &Path, fresh: bool) -> Result<()> {
    let main_path = dir.join("db1");
    let custom_path = dir.join("db2");
    if fresh {
        kvlite::destroy(&main_path)?;
        kvlite::destroy(&custom_path)?;
    }

    let write = WriteOptions::default();
    let read = ReadOptions::default();
    let db = Db::open(&main_path, Options::new().create_if_missing(true))?;

    db.put(&write, "K1", "VAL")?;
    let mut batch = WriteBatch::new();
    batch.delete("K1").put("K2", "VAL");
    db.write(&WriteOptions::sync(), &batch)?;

    // A second handle on the same directory is refused.
    if let Err(e) = Db::open(&main_path, Options::new().create_if_missing(true)) {
        eprintln!("{e}");
    }

    dump(&db, &read)?;

    let snapshot = db.get_snapshot()?;
    db.put(&write, "K3", "V3")?;
    dump(&db, &ReadOptions::at(&snapshot))?;
    db.release_snapshot(&snapshot)?;

    // Values come back owned; nothing dangles once the source is gone.
    let copied = db.get(&read, "K2")?.unwrap_or_default();
    println!("{}", String::from_utf8_lossy(&copied));

    let custom = Db::open(
        &custom_path,
        Options::new()
            .create_if_missing(true)
            .comparator(TwoPartComparator),
    )?;
    for key in ["12", "3", "2", "21"] {
        custom.put(&write, key, key)?;
    }
    dump(&custom, &read)?;

    custom.close()?;
    db.close()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args.dir, args.fresh) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
