//! Command-line front end for the state resolution engine.
//!
//! Resolves URL query strings to audited state snapshots, applies
//! single-field changes, and inspects the field/view catalog. JSON on
//! stdout, diagnostics on stderr.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use resolver::catalog;
use resolver::core::classifier::classify_field;
use resolver::core::field::{Field, FieldValue, Kind};
use resolver::core::resolver::{ResolvedState, resolve_change, resolve_initial};
use resolver::core::state::{ChangeSource, StateChange};

#[derive(Parser)]
#[command(
    name = "resolver",
    version,
    about = "Deterministic state resolution for the mortality-charts explorer"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a URL query string into an audited state snapshot.
    Resolve {
        /// Raw query string, e.g. "cs=matrix&sb=1".
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Resolve a query, then apply one field change to the result.
    Change {
        /// Raw query string resolved first.
        #[arg(long, default_value = "")]
        query: String,
        /// Logical field name, e.g. "showTotals".
        #[arg(long)]
        field: String,
        /// New value: "true"/"false", an integer, a token, or a
        /// comma-separated list, depending on the field.
        #[arg(long)]
        value: String,
    },
    /// List every field with its url key, kind, default and refresh class.
    Fields,
    /// List registered views with shorthands and defaults.
    Views,
    /// Validate the catalog (url keys, views, constraint patches).
    Check,
}

fn main() {
    resolver::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Resolve { query } => cmd_resolve(&query),
        Command::Change { query, field, value } => cmd_change(&query, &field, &value),
        Command::Fields => cmd_fields(),
        Command::Views => cmd_views(),
        Command::Check => cmd_check(),
    }
}

fn cmd_resolve(query: &str) -> Result<()> {
    catalog::validate()?;
    let resolved = resolve(query)?;
    print_resolved(&resolved)
}

fn cmd_change(query: &str, field: &str, value: &str) -> Result<()> {
    catalog::validate()?;
    let field = Field::from_name(field).ok_or_else(|| anyhow!("unknown field '{}'", field))?;
    let value = parse_value(field, value)?;

    let registry = catalog::view_registry();
    let globals = catalog::global_constraints();
    let prev = resolve_initial(query, &registry, &globals).map_err(|err| anyhow!(err))?;
    let change = StateChange {
        field,
        value,
        source: ChangeSource::User,
    };
    let resolved =
        resolve_change(&change, &prev, &registry, &globals).map_err(|err| anyhow!(err))?;
    print_resolved(&resolved)?;
    eprintln!("url: {}", resolved.canonical_query(&registry));
    Ok(())
}

fn cmd_fields() -> Result<()> {
    for field in Field::ALL {
        println!(
            "{:<24} {:<4} {:<5} refresh={:<9} default={}",
            field.name(),
            field.url_key(),
            kind_tag(field.kind()),
            format!("{:?}", classify_field(*field)).to_lowercase(),
            field.base_default()
        );
    }
    Ok(())
}

fn cmd_views() -> Result<()> {
    let registry = catalog::view_registry();
    for view in registry.views() {
        let shorthand = view
            .shorthand
            .map(|field| format!("{}=1", field.url_key()))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<10} shorthand={:<6} defaults:", view.id, shorthand);
        for (field, value) in &view.defaults {
            println!("  {} = {}", field.name(), value);
        }
    }
    println!("default view: {}", registry.default_view().id);
    Ok(())
}

fn cmd_check() -> Result<()> {
    catalog::validate()?;
    println!("catalog ok");
    Ok(())
}

fn resolve(query: &str) -> Result<ResolvedState> {
    let registry = catalog::view_registry();
    let globals = catalog::global_constraints();
    resolve_initial(query, &registry, &globals).map_err(|err| anyhow!(err))
}

fn print_resolved(resolved: &ResolvedState) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(resolved).context("serialize resolved state")?;
    payload.push('\n');
    print!("{}", payload);
    Ok(())
}

fn parse_value(field: Field, raw: &str) -> Result<FieldValue> {
    match field.kind() {
        Kind::Bool => match raw {
            "true" | "1" => Ok(FieldValue::Bool(true)),
            "false" | "0" => Ok(FieldValue::Bool(false)),
            _ => bail!("{}: expected a boolean, got '{}'", field, raw),
        },
        Kind::Int => raw
            .parse::<i64>()
            .map(FieldValue::Int)
            .with_context(|| format!("{}: expected an integer, got '{}'", field, raw)),
        Kind::Text => Ok(FieldValue::Text(raw.to_string())),
        Kind::List => Ok(FieldValue::List(
            raw.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect(),
        )),
    }
}

fn kind_tag(kind: Kind) -> &'static str {
    match kind {
        Kind::Bool => "bool",
        Kind::Int => "int",
        Kind::Text => "text",
        Kind::List => "list",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolve() {
        let cli = Cli::parse_from(["resolver", "resolve", "--query", "cs=matrix"]);
        assert!(matches!(cli.command, Command::Resolve { query } if query == "cs=matrix"));
    }

    #[test]
    fn parse_change() {
        let cli = Cli::parse_from([
            "resolver",
            "change",
            "--field",
            "showTotals",
            "--value",
            "false",
        ]);
        match cli.command {
            Command::Change { query, field, value } => {
                assert_eq!(query, "");
                assert_eq!(field, "showTotals");
                assert_eq!(value, "false");
            }
            _ => panic!("expected change command"),
        }
    }

    #[test]
    fn parse_value_per_kind() {
        assert_eq!(
            parse_value(Field::ShowTotals, "false").expect("bool"),
            FieldValue::Bool(false)
        );
        assert_eq!(
            parse_value(Field::BaselineWindow, "7").expect("int"),
            FieldValue::Int(7)
        );
        assert_eq!(
            parse_value(Field::Countries, "DEU, FRA").expect("list"),
            FieldValue::list(&["DEU", "FRA"])
        );
        assert!(parse_value(Field::ShowTotals, "maybe").is_err());
    }
}
