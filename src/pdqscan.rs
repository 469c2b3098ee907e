use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;
use walkdir::WalkDir;

use rupdq::hash256::Hash256;
use rupdq::pdqhash::PdqHasher;

/// Walk a folder and print one CSV line per image: PDQ hash, quality, path.
#[derive(Parser, Debug)]
#[command(name = "pdqscan")]
struct Args {
    /// Folder to scan
    folder: PathBuf,

    /// Also print the Hamming norm and the distance to the previous hash
    #[arg(long)]
    detailed: bool,
}

/// Content sniffing on the leading magic bytes; extensions are not trusted.
fn is_image_file(path: &Path) -> bool {
    let mut magic = [0u8; 64];
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    let Ok(n) = file.read(&mut magic) else {
        return false;
    };
    image::guess_format(&magic[..n]).is_ok()
}

fn scan_folder(folder: &Path, detailed: bool) -> Result<()> {
    let hasher = PdqHasher::new();
    let mut prev_hash: Option<Hash256> = None;

    for entry in WalkDir::new(folder).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_image_file(path) {
            continue;
        }

        let hq = match hasher.hash_file(path) {
            Ok(hq) => hq,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };

        // 0 for the first image, then distance to the previous one.
        let delta = prev_hash.map_or(0, |prev| hq.hash.hamming_distance(&prev));

        if detailed {
            println!(
                "hash={},norm={},delta={},quality={},filename={}",
                hq.hash,
                hq.hash.hamming_norm(),
                delta,
                hq.quality,
                path.display()
            );
        } else {
            println!("{},{},{}", hq.hash, hq.quality, path.display());
        }
        prev_hash = Some(hq.hash);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let metadata = fs::metadata(&args.folder)
        .with_context(|| format!("cannot access '{}'", args.folder.display()))?;
    if !metadata.is_dir() {
        bail!("'{}' is not a folder", args.folder.display());
    }

    scan_folder(&args.folder, args.detailed)
}
