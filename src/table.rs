use std::fmt::Write as _;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    push_row(&mut output, headers, &widths);
    let separators = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    push_row(&mut output, &separators, &widths);
    for row in rows {
        push_row(&mut output, row, &widths);
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn push_row(output: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<w$}", w = *width))
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    let _ = writeln!(output, "{line}");
}

/// Renders a metric value: integral magnitudes without a fraction,
/// everything else with two decimal places.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_pads_columns() {
        let headers = vec!["name".to_string(), "value".to_string()];
        let rows = vec![
            vec!["short".to_string(), "1".to_string()],
            vec!["a longer cell".to_string(), "2".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("name"));
        assert!(lines[1].starts_with("---"));
        assert!(lines[3].starts_with("a longer cell"));
    }

    #[test]
    fn format_number_rounds_to_cents() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(275941400.152), "275941400.15");
        assert_eq!(format_number(-5.4), "-5.40");
    }
}
