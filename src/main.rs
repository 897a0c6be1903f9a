//! linemill - poor man's grep over the parallel line processor.
//!
//! Prints lines matching a regex pattern, prefixed with their global line
//! numbers, processing the file in parallel line-aligned chunks.

use anyhow::Result;
use clap::{Arg, Command};
use grep_matcher::Matcher;
use grep_regex::RegexMatcher;
use linemill::{process, LineVerdict, Settings};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging for development
    env_logger::init();

    let matches = Command::new("linemill")
        .version(linemill::VERSION)
        .about("Print lines matching a pattern, with global line numbers")
        .long_about(
            "linemill scans a file in parallel line-aligned chunks and prints \
             every line matching the pattern, in file order, prefixed with its \
             global line number.",
        )
        .arg(
            Arg::new("pattern")
                .help("Regex pattern to match against each line")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("file")
                .help("Path to the file to search")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("chunk-size")
                .long("chunk-size")
                .value_name("BYTES")
                .help("Rough chunk size in bytes (default 1 MiB)"),
        )
        .get_matches();

    let pattern = matches
        .get_one::<String>("pattern")
        .expect("pattern argument is required");
    let file_path = PathBuf::from(
        matches
            .get_one::<String>("file")
            .expect("file argument is required"),
    );

    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", file_path.display());
    }

    let mut settings = Settings::default();
    if let Some(size) = matches.get_one::<String>("chunk-size") {
        settings.rough_chunk_size = size
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid chunk size: {size}"))?;
    }

    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut results = process(
        &file_path,
        move |line| match matcher.is_match(line.content()) {
            Ok(true) => LineVerdict::Keep(line.to_text().into_owned()),
            _ => LineVerdict::Skip,
        },
        settings,
    )
    .await?;

    while let Some(result) = results.next().await {
        let line = result?;
        println!("{}: {}", line.line_number, line.value);
    }

    Ok(())
}
