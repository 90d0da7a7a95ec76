use anyhow::Result;
use log::info;
use serde_json::json;

use crate::{
    cli::ViewArgs,
    data::Value,
    filter::{self, FilterState},
    io_utils, loader, schema, table,
};

pub fn execute(args: &ViewArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.source.input_encoding.as_deref())?;
    let raw = loader::load_table(args.source.input.as_deref(), args.source.delimiter, encoding);
    let (canonical, roles) = schema::normalize(&raw)?;
    let mut state = FilterState::from_flags(
        &canonical,
        &roles,
        args.filter.sector.as_deref(),
        args.filter.from.as_deref(),
        args.filter.to.as_deref(),
    )?;
    let view = filter::apply_filters(&canonical, &roles, &mut state);
    let limit = args.limit.unwrap_or(usize::MAX);

    if args.json {
        let payload = json!({
            "headers": canonical.headers,
            "rows": view.filtered_rows.iter().take(limit).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let rows = view
            .filtered_rows
            .iter()
            .take(limit)
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        table::print_table(&canonical.headers, &rows);
    }

    info!(
        "Rendered {} of {} filtered row(s)",
        view.row_count.min(limit),
        view.row_count
    );
    Ok(())
}
