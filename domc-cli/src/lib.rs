use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use domc_core::{Scope, Value};
use domc_dom::Document;
use domc_template::{Template, compile_str};

/// `--format` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Markup,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "domc", version, about = "Compile and render domc templates")]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the binding table of a template file.
    Inspect {
        /// Path to the template markup
        input: PathBuf,
        /// Output as a table (markup) or JSON
        #[arg(long, value_enum, default_value_t = OutputFormat::Markup)]
        format: OutputFormat,
    },
    /// Build an instance against a scope and print the resulting markup.
    Render {
        /// Path to the template markup
        input: PathBuf,
        /// Scope as a JSON object, or @file
        #[arg(long)]
        scope: Option<String>,
        /// Follow-up scope merged over the previous one and applied as an
        /// update; may be repeated
        #[arg(long = "then")]
        then: Vec<String>,
        /// Output as markup with pass counts, or JSON
        #[arg(long, value_enum, default_value_t = OutputFormat::Markup)]
        format: OutputFormat,
    },
}

/// Converts JSON into the template value model. Objects become maps, arrays
/// become lists.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => Value::list(items.iter().map(value_from_json)),
        serde_json::Value::Object(entries) => {
            Value::map(entries.iter().map(|(k, v)| (k.as_str(), value_from_json(v))))
        }
    }
}

/// Parses a JSON object into a scope.
pub fn parse_scope(text: &str) -> Result<Scope> {
    let json: serde_json::Value = serde_json::from_str(text).context("invalid scope JSON")?;
    let serde_json::Value::Object(entries) = json else {
        bail!("scope must be a JSON object, got {json}");
    };
    Ok(entries
        .iter()
        .map(|(k, v)| (k.as_str(), value_from_json(v)))
        .collect())
}

/// Accepts inline JSON or `@path` to read it from a file.
pub fn load_scope(arg: &str) -> Result<Scope> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read scope file {path}"))?;
            parse_scope(&text).with_context(|| format!("in scope file {path}"))
        }
        None => parse_scope(arg),
    }
}

fn read_template(input: &Path) -> Result<Template> {
    let src =
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    compile_str(&src).with_context(|| format!("failed to compile {}", input.display()))
}

/// Describes the bindings of a compiled template.
pub fn inspect(template: &Template, format: OutputFormat) -> String {
    match format {
        OutputFormat::Markup => {
            let mut out = String::new();
            let vars: Vec<&str> = template.variables().iter().map(String::as_str).collect();
            out.push_str(&format!(
                "{} binding(s); variables: {}\n",
                template.bindings().len(),
                if vars.is_empty() { "-".to_string() } else { vars.join(", ") }
            ));
            for b in template.bindings() {
                out.push_str(&format!(
                    "{:<16} {:<10} {:<8} {:<24} {}\n",
                    b.anchor.to_string(),
                    b.kind.as_str(),
                    b.apply.target.to_string(),
                    b.apply.operation.to_string(),
                    b.expression
                ));
            }
            for (path, name) in template.extension_points() {
                out.push_str(&format!("{path:<16} extension {name}\n"));
            }
            out
        }
        OutputFormat::Json => {
            let bindings: Vec<_> = template
                .bindings()
                .iter()
                .map(|b| {
                    json!({
                        "anchor": b.anchor.to_string(),
                        "kind": b.kind.as_str(),
                        "expression": b.expression,
                        "variables": b.variables,
                        "target": b.apply.target.to_string(),
                        "operation": b.apply.operation.to_string(),
                    })
                })
                .collect();
            let extensions: Vec<_> = template
                .extension_points()
                .map(|(path, name)| json!({ "path": path.to_string(), "name": name }))
                .collect();
            let report = json!({
                "variables": template.variables(),
                "events": template.events(),
                "handlers": template.handlers(),
                "bindings": bindings,
                "extensions": extensions,
            });
            format!("{report:#}\n")
        }
    }
}

pub fn inspect_cmd(input: &Path, format: OutputFormat) -> Result<String> {
    Ok(inspect(&read_template(input)?, format))
}

/// Mutation counts of one update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub applied: usize,
    pub mutations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub markup: String,
    /// The construction pass first, then one entry per follow-up scope.
    pub passes: Vec<Pass>,
}

/// Builds an instance of `template` from `scope`, then applies each of
/// `then` in turn. A follow-up scope is merged over the previous one.
/// Handler names missing from the scope are wired to a no-op that logs
/// the call.
pub fn render(template: &Template, scope: &Scope, then: &[Scope]) -> Result<Rendered> {
    let doc = Document::with_journal();
    let mut scope = scope.clone();
    for name in template.handlers() {
        if !scope.contains(name) {
            let handler = name.clone();
            scope.set(
                name.as_str(),
                Value::function(move |args| {
                    tracing::info!(%handler, ?args, "handler called");
                    Value::Undefined
                }),
            );
        }
    }

    let mut inst = template
        .create_instance(&doc, &scope)
        .context("failed to build instance")?;
    let mut passes = vec![Pass {
        applied: inst.snapshot().map_or(0, |s| s.applied()),
        mutations: doc.take_journal().len(),
    }];

    for (i, next) in then.iter().enumerate() {
        for name in next.names() {
            scope.set(name, next.lookup(name));
        }
        inst.update(&doc, &scope)
            .with_context(|| format!("update {} failed", i + 1))?;
        passes.push(Pass {
            applied: inst.snapshot().map_or(0, |s| s.applied()),
            mutations: doc.take_journal().len(),
        });
    }

    Ok(Rendered {
        markup: doc.to_markup(inst.root()),
        passes,
    })
}

pub fn format_rendered(rendered: &Rendered, format: OutputFormat) -> String {
    match format {
        OutputFormat::Markup => {
            let mut out = format!("{}\n", rendered.markup);
            for (i, p) in rendered.passes.iter().enumerate() {
                let label = if i == 0 { "create".to_string() } else { format!("update {i}") };
                out.push_str(&format!(
                    "{label}: {} binding(s) applied, {} mutation(s)\n",
                    p.applied, p.mutations
                ));
            }
            out
        }
        OutputFormat::Json => {
            let passes: Vec<_> = rendered
                .passes
                .iter()
                .map(|p| json!({ "applied": p.applied, "mutations": p.mutations }))
                .collect();
            format!(
                "{:#}\n",
                json!({ "markup": rendered.markup, "passes": passes })
            )
        }
    }
}

pub fn render_cmd(
    input: &Path,
    scope: Option<&str>,
    then: &[String],
    format: OutputFormat,
) -> Result<String> {
    let template = read_template(input)?;
    let scope = match scope {
        Some(arg) => load_scope(arg)?,
        None => Scope::new(),
    };
    let then = then
        .iter()
        .map(|arg| load_scope(arg))
        .collect::<Result<Vec<_>>>()?;
    let rendered = render(&template, &scope, &then)?;
    Ok(format_rendered(&rendered, format))
}
