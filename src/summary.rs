use anyhow::Result;
use log::info;

use crate::{
    cli::SummaryArgs,
    filter::{self, FilterState},
    io_utils, loader, schema, table,
};

pub fn execute(args: &SummaryArgs) -> Result<()> {
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

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        let headers = vec![
            "rows".to_string(),
            "value_sum".to_string(),
            "quantity_sum".to_string(),
        ];
        let row = vec![
            view.row_count.to_string(),
            table::format_number(view.value_sum),
            table::format_number(view.quantity_sum),
        ];
        table::print_table(&headers, &[row]);

        if !view.daily_series.is_empty() {
            println!();
            let headers = vec!["date".to_string(), "value".to_string()];
            let rows = view
                .daily_series
                .iter()
                .map(|(date, value)| {
                    vec![
                        date.format("%Y-%m-%d").to_string(),
                        table::format_number(*value),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
        }
    }

    info!(
        "Summarized {} of {} row(s) (category '{}')",
        view.row_count,
        canonical.row_count(),
        state.category
    );
    Ok(())
}
