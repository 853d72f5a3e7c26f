//! Grabber CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};

use grabber::config::Config;
use grabber::har::TraceDocument;
use grabber::replay::TraceIndex;

fn main() {
    grabber::logging::init_stderr();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "inspect" => match args.get(2) {
            Some(path) => inspect(Path::new(path)),
            None => {
                eprintln!("Usage: grabber inspect <trace.har>");
                process::exit(1);
            }
        },
        "lookup" => lookup(&args[2..]),
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'grabber' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn usage() {
    eprintln!("Grabber v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: grabber <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  inspect <trace.har>          Summarize a trace");
    eprintln!("  lookup <trace.har> <url>     Show the recorded response for a URL");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>              TOML configuration (lookup)");
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let document = TraceDocument::from_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let log = &document.log;

    println!("Trace: {}", path.display());
    println!("  HAR version:  {}", log.version);
    println!("  Creator:      {} {}", log.creator.name, log.creator.version);
    println!("  Pages:        {}", log.pages.len());
    for page in &log.pages {
        println!("    {} {}", page.id, page.title);
    }
    println!("  Entries:      {}", log.entries.len());
    println!(
        "  From cache:   {}",
        log.entries.iter().filter(|e| e.is_from_cache()).count()
    );
    println!("  No content:   {}", document.missing_content_count());

    Ok(())
}

fn lookup(args: &[String]) -> anyhow::Result<()> {
    let mut positional = Vec::new();
    let mut config_path: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let Some(path) = iter.next() else {
                bail!("--config needs a file argument");
            };
            config_path = Some(PathBuf::from(path));
        } else {
            positional.push(arg.as_str());
        }
    }

    let [trace, url] = positional[..] else {
        bail!("Usage: grabber lookup <trace.har> <url> [--config <file>]");
    };

    let config = match config_path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };

    let index = TraceIndex::new(config.replay);
    index
        .load_file(Path::new(trace))
        .with_context(|| format!("failed to load {trace}"))?;

    let response = index.lookup(url)?;
    println!("Status: {}", response.status);
    for (name, value) in &response.headers {
        println!("{name}: {value}");
    }
    println!("Body: {} bytes", response.body.len());

    Ok(())
}
