//! Command-line driver: render a single template file against an optional
//! JSON context, printing the result to stdout.

use anyhow::Context as _;
use clap::Parser as ClapParser;
use std::{path::PathBuf, rc::Rc};
use tinja_engine::{Config, Environment, Value};

#[derive(ClapParser)]
#[command(version, about = "Render a Jinja-compatible template")]
struct Args {
    /// Path to the template source file
    template: PathBuf,

    /// Path to a JSON file providing the render context (a top-level object)
    #[arg(long)]
    context: Option<PathBuf>,

    /// Raise an error on undefined names instead of rendering them empty
    #[arg(long)]
    strict_undefined: bool,

    /// HTML-escape output values that aren't marked safe
    #[arg(long)]
    autoescape: bool,
}

fn main() -> anyhow::Result<()> {
    tinja_util::init_tracing("warn");
    let args = Args::parse();

    let source = std::fs::read_to_string(&args.template)
        .with_context(|| format!("reading template {}", args.template.display()))?;
    let context = match &args.context {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading context {}", path.display()))?;
            let json: serde_json::Value =
                serde_json::from_str(&raw).context("parsing context as JSON")?;
            json_object_to_bindings(json)?
        }
        None => Vec::new(),
    };

    let environment = Rc::new(Environment::new(Config {
        strict_undefined: args.strict_undefined,
        autoescape: args.autoescape,
        ..Config::default()
    }));
    let name = args.template.display().to_string();
    let template = environment
        .from_string(&name, &source)
        .with_context(|| format!("parsing template {name}"))?;
    let rendered = template
        .execute(context)
        .with_context(|| format!("rendering template {name}"))?;
    print!("{rendered}");
    Ok(())
}

/// A JSON object's entries become the template's top-level bindings; any
/// other JSON shape is rejected since a render context is a name→value map.
fn json_object_to_bindings(json: serde_json::Value) -> anyhow::Result<Vec<(String, Value)>> {
    let serde_json::Value::Object(map) = json else {
        anyhow::bail!("context file must contain a JSON object");
    };
    Ok(map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect())
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or_default())),
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Dict(
            map.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}
