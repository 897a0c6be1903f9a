//! Property tests: byte fidelity and numbering must hold for arbitrary
//! content and any chunk size.

use linemill::{process, LineVerdict, Settings};
use proptest::prelude::*;
use tempfile::NamedTempFile;

/// Line count the scanner is expected to produce for raw content.
fn expected_line_count(contents: &[u8]) -> u64 {
    let terminators = contents.iter().filter(|&&b| b == b'\n').count() as u64;
    match contents.last() {
        None => 0,
        Some(b'\n') => terminators,
        Some(_) => terminators + 1,
    }
}

/// Build file content from terminator-free line bodies.
fn assemble(lines: &[Vec<u8>], trailing_terminator: bool) -> Vec<u8> {
    let mut contents = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            contents.push(b'\n');
        }
        contents.extend_from_slice(line);
    }
    if trailing_terminator {
        contents.push(b'\n');
    }
    contents
}

/// Keep-all run collecting `(line_number, bytes)` pairs.
fn run_keep_all(contents: &[u8], rough_chunk_size: u64) -> Vec<(u64, Vec<u8>)> {
    let file = NamedTempFile::new().expect("create temp file");
    std::fs::write(file.path(), contents).expect("write contents");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");

    runtime.block_on(async {
        let mut results = process(
            file.path(),
            |line| LineVerdict::Keep(line.bytes().to_vec()),
            Settings {
                rough_chunk_size,
                ..Settings::default()
            },
        )
        .await
        .expect("start pipeline");

        let mut collected = Vec::new();
        while let Some(result) = results.next().await {
            let line = result.expect("pipeline faulted");
            collected.push((line.line_number, line.value));
        }
        collected
    })
}

fn line_body() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("no terminator", |&b| b != b'\n'), 0..64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn concatenated_results_rebuild_the_file(
        lines in prop::collection::vec(line_body(), 0..24),
        trailing_terminator in any::<bool>(),
        rough_chunk_size in 1u64..512,
    ) {
        let contents = assemble(&lines, trailing_terminator);
        let results = run_keep_all(&contents, rough_chunk_size);

        let rebuilt: Vec<u8> = results.iter().flat_map(|(_, bytes)| bytes.clone()).collect();
        prop_assert_eq!(rebuilt, contents);
    }

    #[test]
    fn numbering_is_dense_and_one_based(
        lines in prop::collection::vec(line_body(), 0..24),
        trailing_terminator in any::<bool>(),
        rough_chunk_size in 1u64..512,
    ) {
        let contents = assemble(&lines, trailing_terminator);
        let results = run_keep_all(&contents, rough_chunk_size);

        prop_assert_eq!(results.len() as u64, expected_line_count(&contents));
        for (i, (number, _)) in results.iter().enumerate() {
            prop_assert_eq!(*number, i as u64 + 1);
        }
    }

    #[test]
    fn chunk_size_never_changes_the_outcome(
        lines in prop::collection::vec(line_body(), 1..16),
        sizes in prop::collection::vec(1u64..256, 2..4),
    ) {
        let contents = assemble(&lines, true);

        let baseline = run_keep_all(&contents, 1024 * 1024);
        for size in sizes {
            let run = run_keep_all(&contents, size);
            prop_assert_eq!(&run, &baseline);
        }
    }
}
