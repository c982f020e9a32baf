use std::fs;
use std::path::PathBuf;

use clap::Parser;
use domc_cli::{Cli, Commands, OutputFormat, Pass, inspect_cmd, parse_scope, render, render_cmd};
use domc_core::Value;
use domc_template::compile_str;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn inspect_lists_bindings() {
    let out = inspect_cmd(&fixture("counter.html"), OutputFormat::Markup).expect("inspect");
    assert!(out.starts_with("4 binding(s); variables: count, label, mode\n"), "{out}");
    assert!(out.contains("/:class"));
    assert!(out.contains("/1@click"));
    assert!(out.contains("/3/0#text"));
    assert!(out.contains("/5"));
    assert!(out.contains("extension v-if"));
}

#[test]
fn inspect_json_is_parseable() {
    let out = inspect_cmd(&fixture("counter.html"), OutputFormat::Json).expect("inspect");
    let report: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(report["bindings"].as_array().map(Vec::len), Some(4));
    assert_eq!(report["handlers"][0], "increment");
    assert_eq!(report["bindings"][1]["kind"], "event-args");
}

#[test]
fn render_applies_follow_up_scopes() {
    let out = render_cmd(
        &fixture("counter.html"),
        Some(r#"{"count": 1, "label": "clicks", "mode": "dark"}"#),
        &[r#"{"count": 3}"#.to_string(), r#"{"count": 3}"#.to_string()],
        OutputFormat::Json,
    )
    .expect("render");
    let report: serde_json::Value = serde_json::from_str(&out).expect("json");
    let markup = report["markup"].as_str().unwrap();
    assert!(markup.starts_with(r#"<div class="counter dark">"#), "{markup}");
    assert!(markup.contains(r#"<span title="clicks">3</span>"#), "{markup}");
    assert!(markup.contains("<p>That is a lot.</p>"), "{markup}");
    assert_eq!(report["passes"][2]["applied"], 0);
    assert_eq!(report["passes"][2]["mutations"], 0);
}

#[test]
fn render_counts_mutations_per_pass() {
    let template = compile_str(r#"<p title="${a}">${b}</p>"#).unwrap();
    let first = parse_scope(r#"{"a": "x", "b": [1, 2]}"#).unwrap();
    let next = parse_scope(r#"{"a": "y"}"#).unwrap();
    let rendered = render(&template, &first, &[next]).unwrap();
    assert_eq!(rendered.markup, r#"<p title="y">1,2</p>"#);
    assert_eq!(rendered.passes[1], Pass { applied: 1, mutations: 1 });
}

#[test]
fn scope_json_maps_onto_values() {
    let scope = parse_scope(r#"{"n": 2, "s": "x", "z": null, "o": {"k": true}}"#).unwrap();
    assert_eq!(scope.lookup("n"), Value::from(2));
    assert_eq!(scope.lookup("z"), Value::Null);
    assert_eq!(scope.lookup("o").property("k"), Value::from(true));
    assert!(parse_scope("[1]").is_err());
    assert!(parse_scope("{").is_err());
}

#[test]
fn scope_can_come_from_a_file() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../target/domc-cli-tests")
        .join(format!("{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create dir");
    let path = dir.join("scope.json");
    fs::write(&path, r#"{"count": 5, "label": "l", "mode": "m"}"#).expect("write scope");

    let arg = format!("@{}", path.display());
    let out = render_cmd(&fixture("counter.html"), Some(&arg), &[], OutputFormat::Markup)
        .expect("render");
    assert!(out.contains(">5</span>"), "{out}");
    assert!(out.contains("create: 4 binding(s) applied"), "{out}");
}

#[test]
fn missing_template_is_reported() {
    let err = inspect_cmd(&fixture("nope.html"), OutputFormat::Markup).unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn format_flag_selects_output() {
    let cli = Cli::try_parse_from(["domc", "inspect", "t.html"]).expect("parse");
    assert!(matches!(
        cli.command,
        Commands::Inspect { format: OutputFormat::Markup, .. }
    ));

    let cli = Cli::try_parse_from([
        "domc", "-v", "render", "t.html", "--then", "{}", "--format", "json",
    ])
    .expect("parse");
    assert_eq!(cli.verbose, 1);
    match cli.command {
        Commands::Render { format, then, .. } => {
            assert_eq!(format, OutputFormat::Json);
            assert_eq!(then, ["{}"]);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(Cli::try_parse_from(["domc", "render", "t.html", "--format", "yaml"]).is_err());
    assert!(Cli::try_parse_from(["domc", "render", "t.html", "--json"]).is_err());
}
