use clap::Parser;
use opmon_analysis::{reduce, ContentFilter};
use opmon_core::{Platform, RawItem, ReducerConfig};

use super::{Cli, Commands};
use crate::input::items_from_reader;
use crate::reduce::render_reduced;

fn parse_items(raw: &str) -> anyhow::Result<Vec<RawItem>> {
    items_from_reader(raw.as_bytes())?.collect()
}

#[test]
fn analyze_defaults() {
    let cli = Cli::try_parse_from([
        "opmon",
        "analyze",
        "--input",
        "items.jsonl",
        "--keyword",
        "iphone",
    ])
    .expect("should parse");

    match cli.command {
        Commands::Analyze {
            keyword,
            language,
            report_language,
            platforms,
            expected_count,
            no_sampling,
            output,
            ..
        } => {
            assert_eq!(keyword, "iphone");
            assert_eq!(language, "en");
            assert_eq!(report_language, "auto");
            assert!(platforms.is_empty());
            assert_eq!(expected_count, 0);
            assert!(!no_sampling);
            assert!(output.is_none());
        }
        Commands::Reduce { .. } => panic!("expected analyze"),
    }
}

#[test]
fn analyze_accepts_repeated_platforms() {
    let cli = Cli::try_parse_from([
        "opmon",
        "analyze",
        "--input",
        "items.json",
        "--keyword",
        "iphone",
        "--platform",
        "reddit",
        "--platform",
        "twitter",
        "--expected-count",
        "300",
        "--no-sampling",
    ])
    .expect("should parse");

    match cli.command {
        Commands::Analyze {
            platforms,
            expected_count,
            no_sampling,
            ..
        } => {
            assert_eq!(platforms, vec![Platform::Reddit, Platform::X]);
            assert_eq!(expected_count, 300);
            assert!(no_sampling);
        }
        Commands::Reduce { .. } => panic!("expected analyze"),
    }
}

#[test]
fn analyze_rejects_unknown_platform() {
    let result = Cli::try_parse_from([
        "opmon",
        "analyze",
        "--input",
        "items.json",
        "--keyword",
        "iphone",
        "--platform",
        "myspace",
    ]);
    assert!(result.is_err());
}

#[test]
fn analyze_requires_keyword() {
    let result = Cli::try_parse_from(["opmon", "analyze", "--input", "items.json"]);
    assert!(result.is_err());
}

#[test]
fn reduce_defaults() {
    let cli = Cli::try_parse_from(["opmon", "reduce", "--input", "items.json"]).expect("should parse");
    match cli.command {
        Commands::Reduce { top_k, language, .. } => {
            assert_eq!(top_k, 200);
            assert_eq!(language, "en");
        }
        Commands::Analyze { .. } => panic!("expected reduce"),
    }
}

#[test]
fn parses_json_array_input() {
    let raw = r#"[
        {"platform": "reddit", "content_type": "post", "source_id": "r1", "title": "Battery life is great"},
        {"platform": "x", "content_type": "post", "source_id": "x1", "content": "Screen too dim", "metrics": {"likes": 4}}
    ]"#;
    let items = parse_items(raw).expect("valid array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].visible_text(), "Battery life is great");
    assert_eq!(items[1].platform, Platform::X);
    assert_eq!(items[1].metric("likes"), 4);
}

#[test]
fn parses_json_lines_and_skips_blank_lines() {
    let raw = "{\"platform\":\"youtube\",\"content_type\":\"comment\",\"source_id\":\"y1\",\"content\":\"nice\"}\n\n   \n{\"platform\":\"reddit\",\"content_type\":\"comment\",\"source_id\":\"r2\",\"content\":\"meh\"}\n";
    let items = parse_items(raw).expect("valid jsonl");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].source_id, "y1");
    assert_eq!(items[1].source_id, "r2");
}

#[test]
fn bad_json_line_names_the_line() {
    let raw = "{\"platform\":\"reddit\",\"content_type\":\"post\",\"source_id\":\"r1\"}\n{not json}\n";
    let err = parse_items(raw).expect_err("second line is broken");
    assert!(err.to_string().contains("line 2"), "got: {err}");
}

#[test]
fn leading_blank_lines_count_toward_line_numbers() {
    let raw = "\n  \n{broken\n";
    let err = parse_items(raw).expect_err("third line is broken");
    assert!(err.to_string().contains("line 3"), "got: {err}");
}

#[test]
fn json_lines_are_parsed_lazily() {
    let raw = "{\"platform\":\"reddit\",\"content_type\":\"post\",\"source_id\":\"r1\"}\n{not json}\n";
    let mut items = items_from_reader(raw.as_bytes()).expect("opens");
    let first = items.next().expect("one record").expect("valid record");
    assert_eq!(first.source_id, "r1");
    assert!(items.next().expect("second record").is_err());
    assert!(items.next().is_none());
}

#[test]
fn broken_json_array_fails_up_front() {
    let err = items_from_reader("  [ {\"platform\": ".as_bytes())
        .err()
        .expect("truncated array");
    assert!(err.to_string().contains("invalid JSON array"), "got: {err}");
}

#[test]
fn render_reduced_lists_kept_items_and_rejections() {
    let raw = r#"[
        {"platform": "reddit", "content_type": "comment", "source_id": "r1", "content": "The battery easily lasts two full days", "metrics": {"upvotes": 40}},
        {"platform": "x", "content_type": "post", "source_id": "x1", "content": "Camera quality is honestly disappointing", "metrics": {"likes": 1}},
        {"platform": "x", "content_type": "post", "source_id": "x2", "content": "ok"}
    ]"#;
    let items = parse_items(raw).expect("valid array");
    let config = ReducerConfig::default();
    let filter = ContentFilter::new(&config, "auto");
    let reduced = reduce(items, &filter, 10);

    let rendered = render_reduced(&reduced);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "seen 3 item(s), kept 2, rejected 1");
    assert_eq!(lines[1], "  rejected too_short: 1");
    assert!(lines[2].contains("reddit") && lines[2].contains("r1"));
    assert!(lines[3].contains("x1"));
}
