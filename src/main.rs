//! SQL Template CLI - Main entry point.
//!
//! Runs one statement through the database template against the configured
//! database (SQLite, PostgreSQL, MySQL) and prints the result as JSON.

use clap::Parser;
use serde_json::{Map, Value, json};
use sqltemplate::config::{Config, QueryMode};
use sqltemplate::db::DatabaseTemplate;
use sqltemplate::models::Row;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the JSON result.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Render a row as an object keyed by column name. Rows whose column names
/// are missing or repeated render as an array of values instead.
fn row_to_json(row: &Row) -> Result<Value, serde_json::Error> {
    let columns = row.columns();
    let keyed = columns.len() == row.len()
        && columns
            .iter()
            .enumerate()
            .all(|(i, name)| !name.is_empty() && !columns[..i].contains(name));
    if !keyed {
        return serde_json::to_value(row.values());
    }

    let mut object = Map::with_capacity(row.len());
    for (column, value) in columns.iter().zip(row.values()) {
        object.insert(column.clone(), serde_json::to_value(value)?);
    }
    Ok(Value::Object(object))
}

fn run(template: &DatabaseTemplate, config: &Config) -> Result<Value, Box<dyn std::error::Error>> {
    let request = config.request()?;
    let output = match config.mode {
        QueryMode::List => {
            let rows = template.query_for_list(request)?;
            Value::Array(rows.iter().map(row_to_json).collect::<Result<_, _>>()?)
        }
        QueryMode::Int => Value::from(template.query_for_int(request)?),
        QueryMode::Long => Value::from(template.query_for_long(request)?),
        QueryMode::Object => {
            let value =
                template.query_for_object(request.required_type(config.required_type))?;
            serde_json::to_value(value)?
        }
        QueryMode::Update => json!({ "rowcount": template.update(request)? }),
        QueryMode::Execute => json!({ "rowcount": template.execute(request)? }),
    };
    Ok(output)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        mode = %config.mode,
        "Starting sqltemplate v{}",
        env!("CARGO_PKG_VERSION")
    );

    let factory = config.data_source_config()?.build()?;
    let template = DatabaseTemplate::new(factory);

    match run(&template, &config) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Statement failed");
            Err(e)
        }
    }
}
