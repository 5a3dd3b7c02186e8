use std::path::PathBuf;
use std::process;

use anyhow::Result;
use bstr::BString;
use clap::{error::ErrorKind, Parser, Subcommand};

use lfs_scan::{Completion, Scan, WrappedPointer};
use lfs_utils::filter::PathFilter;

#[derive(Parser)]
#[command(
    name = "lfsr",
    about = "Locate LFS pointer references in a git repository",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run as if started in <path>
    #[arg(short = 'C', global = true)]
    change_dir: Option<PathBuf>,

    /// Emit results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every pointer file in the tree at a revision
    Tree {
        /// Revision to scan (e.g. HEAD, a branch, a tag)
        rev: String,
    },
    /// List pointers introduced by commits not reachable from any remote
    Unpushed {
        /// Only report paths matching these patterns
        #[arg(short = 'I', long = "include")]
        include: Vec<String>,

        /// Never report paths matching these patterns
        #[arg(short = 'X', long = "exclude")]
        exclude: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => process::exit(0),
                _ => process::exit(2),
            }
        }
    };

    if let Some(dir) = &cli.change_dir {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("fatal: cannot change to '{}': {}", dir.display(), e);
            process::exit(2);
        }
    }

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("fatal: {e}");
            process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let scan = match &cli.command {
        Commands::Tree { rev } => lfs_scan::scan_tree(rev)?,
        Commands::Unpushed { include, exclude } => {
            let filter = PathFilter::new(to_patterns(include), to_patterns(exclude));
            lfs_scan::scan_unpushed(filter)?
        }
    };

    if cli.json {
        print_json(&scan)?;
    } else {
        for p in &scan.pointers {
            print_pointer(p);
        }
    }

    match scan.completion {
        Completion::Complete => Ok(0),
        Completion::Truncated => {
            eprintln!("warning: scan ended early; results may be incomplete");
            Ok(1)
        }
    }
}

fn to_patterns(raw: &[String]) -> Vec<BString> {
    raw.iter().map(|s| BString::from(s.as_str())).collect()
}

fn print_pointer(p: &WrappedPointer) {
    // Short oid first, like ls-files output; log-derived results have no
    // blob id to show.
    let short_oid = &p.pointer.oid[..10.min(p.pointer.oid.len())];
    match &p.sha1 {
        Some(sha1) => println!("{short_oid} {} {} ({} bytes)", &sha1[..10], p.name, p.size),
        None => println!("{short_oid} - {} ({} bytes)", p.name, p.size),
    }
}

fn print_json(scan: &Scan) -> Result<()> {
    #[derive(serde::Serialize)]
    struct Output<'a> {
        pointers: &'a [WrappedPointer],
        completion: Completion,
    }
    let out = Output {
        pointers: &scan.pointers,
        completion: scan.completion,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
