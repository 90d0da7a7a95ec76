pub mod cli;
pub mod data;
pub mod filter;
pub mod io_utils;
pub mod loader;
pub mod schema;
pub mod summary;
pub mod table;
pub mod view;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};
use serde_json::json;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("portfolio_dash", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Summary(args) => summary::execute(&args),
        Commands::View(args) => view::execute(&args),
    }
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.source.input_encoding.as_deref())?;
    let raw = loader::load_table(args.source.input.as_deref(), args.source.delimiter, encoding);
    let (canonical, roles) = schema::normalize(&raw)?;
    let categories = schema::categories(&canonical, &roles);
    let bounds = schema::timestamp_bounds(&canonical, &roles);

    let resolved = [
        ("identity", Some(roles.identity)),
        ("category", Some(roles.category)),
        ("timestamp", roles.timestamp),
        ("value", roles.value),
        ("quantity", roles.quantity),
    ];

    if args.json {
        let role_columns: serde_json::Map<String, serde_json::Value> = resolved
            .iter()
            .map(|(role, idx)| {
                let column = idx.map(|idx| canonical.headers[idx].clone());
                (role.to_string(), json!(column))
            })
            .collect();
        let payload = json!({
            "roles": role_columns,
            "categories": categories,
            "date_from": bounds.map(|(min, _)| min),
            "date_to": bounds.map(|(_, max)| max),
            "rows": canonical.row_count(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let headers = vec!["role".to_string(), "column".to_string()];
        let rows = resolved
            .iter()
            .map(|(role, idx)| {
                let column = idx
                    .map(|idx| canonical.headers[idx].clone())
                    .unwrap_or_else(|| "(absent)".to_string());
                vec![role.to_string(), column]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);

        println!();
        println!("categories: {}", categories.join(", "));
        match bounds {
            Some((min, max)) => println!(
                "date span: {} .. {}",
                min.format("%Y-%m-%d"),
                max.format("%Y-%m-%d")
            ),
            None => println!("date span: (none)"),
        }
    }

    info!(
        "Probed {} column(s) across {} row(s)",
        canonical.headers.len(),
        canonical.row_count()
    );
    Ok(())
}
