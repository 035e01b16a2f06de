//! EntityStore operator CLI
//!
//! Connects a document store with the configured settings and either reports
//! its capability flags or runs a list query.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use entitystore::{
    AttributeType, ConnectOptions, DocumentStore, Entity, EntityCollection, Filter, Order,
    SortDirection, Store, Value,
};
use entitystore_common::telemetry::init_tracing;
use entitystore_common::Config;

#[derive(Parser)]
#[command(name = "entitystore")]
#[command(author, version, about = "EntityStore - attribute-based entity persistence", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (TOML or JSON)
    #[arg(short, long, env = "ENTITYSTORE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print the capability flags
    Probe,

    /// List entities of one model type
    List {
        /// Collection / model type
        #[arg(short, long)]
        model_type: String,

        /// Attribute declaration, `name:type` (repeatable)
        #[arg(short, long = "attr")]
        attributes: Vec<String>,

        /// Equality filter, `name=value` (repeatable)
        #[arg(short, long)]
        filter: Vec<String>,

        /// Sort key, `name` or `name:desc` (repeatable)
        #[arg(short, long)]
        order: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .await
            .with_context(|| format!("loading {path}"))?,
        None => Config::default(),
    }
    .from_env_overrides();
    init_tracing(&config.logging);

    let store = DocumentStore::with_settings(config.store.clone());
    let options = ConnectOptions::from(&config.connection);
    store
        .connect(&config.connection.location, Some(options))
        .await
        .context("connecting")?;
    info!(store = store.name(), "Store ready");

    match cli.command {
        Commands::Probe => {
            println!("{}", serde_json::to_string_pretty(&store.capabilities())?);
        }

        Commands::List {
            model_type,
            attributes,
            filter,
            order,
        } => {
            let model = parse_model(&model_type, &attributes)?;
            let filter = parse_filter(&model, &filter)?;
            let order = parse_order(&order)?;

            let mut list = EntityCollection::new(model);
            store.get_list(&mut list, &filter, Some(&order)).await?;

            let columns: Vec<&str> = list
                .model()
                .attributes
                .iter()
                .map(|a| a.name.as_str())
                .collect();
            let output = json!({ "columns": columns, "rows": list.rows() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn parse_model(model_type: &str, attributes: &[String]) -> Result<Entity> {
    let mut model = Entity::new(model_type);
    for declaration in attributes {
        let (name, kind) = declaration
            .split_once(':')
            .ok_or_else(|| anyhow!("expected name:type, got {declaration}"))?;
        let attribute_type: AttributeType = kind.parse().map_err(anyhow::Error::msg)?;
        model = model.with_attribute(name, attribute_type);
    }
    Ok(model)
}

fn parse_filter(model: &Entity, entries: &[String]) -> Result<Filter> {
    let mut filter = Filter::new();
    for entry in entries {
        let (name, raw) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("expected name=value, got {entry}"))?;
        let value = match model.attribute_type(name) {
            Some(AttributeType::Number) => raw
                .parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| raw.parse::<f64>().map(Value::Float))
                .with_context(|| format!("{name} expects a number"))?,
            Some(AttributeType::Boolean) => Value::Bool(
                raw.parse()
                    .with_context(|| format!("{name} expects true or false"))?,
            ),
            None => bail!("unknown attribute {name}"),
            _ => Value::from(raw),
        };
        filter.insert(name, value);
    }
    Ok(filter)
}

fn parse_order(keys: &[String]) -> Result<Order> {
    let mut order = Order::new();
    for key in keys {
        let (name, direction) = match key.split_once(':') {
            None => (key.as_str(), SortDirection::Ascending),
            Some((name, "asc")) => (name, SortDirection::Ascending),
            Some((name, "desc")) => (name, SortDirection::Descending),
            Some((_, other)) => bail!("unknown sort direction {other}"),
        };
        order = order.by(name, direction);
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn account() -> Entity {
        parse_model("Account", &args(&["owner:string", "balance:number", "active:bool"])).unwrap()
    }

    #[test]
    fn test_parse_model() {
        let model = account();
        assert_eq!(model.model_type, "Account");
        assert_eq!(model.attribute_type("id"), Some(AttributeType::Id));
        assert_eq!(model.attribute_type("balance"), Some(AttributeType::Number));
        assert_eq!(model.attribute_type("active"), Some(AttributeType::Boolean));

        let err = parse_model("Account", &args(&["owner"])).unwrap_err();
        assert_eq!(err.to_string(), "expected name:type, got owner");
        let err = parse_model("Account", &args(&["owner:blob"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown attribute type: blob");
    }

    #[test]
    fn test_parse_filter_coerces_by_attribute_type() {
        let model = account();
        let filter = parse_filter(
            &model,
            &args(&["balance=12", "owner=ann", "active=true"]),
        )
        .unwrap();
        let entries: Vec<_> = filter.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assert!(entries.contains(&("balance".to_string(), Value::Integer(12))));
        assert!(entries.contains(&("owner".to_string(), Value::from("ann"))));
        assert!(entries.contains(&("active".to_string(), Value::Bool(true))));

        let filter = parse_filter(&model, &args(&["balance=2.5"])).unwrap();
        assert_eq!(filter.iter().next(), Some(("balance", &Value::Float(2.5))));

        // numeric-looking text on a string attribute stays text
        let filter = parse_filter(&model, &args(&["owner=42"])).unwrap();
        assert_eq!(filter.iter().next(), Some(("owner", &Value::from("42"))));
    }

    #[test]
    fn test_parse_filter_rejects_bad_entries() {
        let model = account();
        let err = parse_filter(&model, &args(&["colour=red"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown attribute colour");
        let err = parse_filter(&model, &args(&["balance=lots"])).unwrap_err();
        assert_eq!(err.to_string(), "balance expects a number");
        let err = parse_filter(&model, &args(&["active=maybe"])).unwrap_err();
        assert_eq!(err.to_string(), "active expects true or false");
        assert!(parse_filter(&model, &args(&["owner"])).is_err());
    }

    #[test]
    fn test_parse_order() {
        let order = parse_order(&args(&["owner", "balance:desc", "active:asc"])).unwrap();
        let keys: Vec<_> = order.iter().collect();
        assert_eq!(
            keys,
            vec![
                ("owner", SortDirection::Ascending),
                ("balance", SortDirection::Descending),
                ("active", SortDirection::Ascending),
            ]
        );

        let err = parse_order(&args(&["owner:sideways"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown sort direction sideways");
    }
}
