use chrono::{DateTime, Local, Utc};
use hostmon_core::{FieldValue, ProcessField, ProjectedRecord};

const MAX_COLUMN_WIDTH: usize = 40;

/// Plain text table for one query result, headed by a status line.
pub fn render_table(
    generation: u64,
    taken_at: Option<DateTime<Utc>>,
    total: usize,
    columns: &[ProcessField],
    rows: &[ProjectedRecord],
) -> String {
    let taken = taken_at
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut out = format!(
        "snapshot #{} at {} | {} processes, showing {}\n",
        generation,
        taken,
        total,
        rows.len()
    );

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|field| row.get(*field).map(cell_text).unwrap_or_else(|| "-".to_string()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, field)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(field.as_str().len()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let header: Vec<String> = columns.iter().map(|f| f.as_str().to_uppercase()).collect();
    push_line(&mut out, &header, &widths);
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let cell: String = cell.chars().take(*width).collect();
            format!("{:<width$}", cell, width = *width)
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn cell_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Unavailable => "-".to_string(),
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Float(v) => format!("{:.1}", v),
        FieldValue::Text(s) => s.clone(),
        FieldValue::List(items) => items.join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&FieldValue::Unavailable), "-");
        assert_eq!(cell_text(&FieldValue::Float(12.345)), "12.3");
        assert_eq!(
            cell_text(&FieldValue::List(vec!["/bin/sh".into(), "-c".into()])),
            "/bin/sh -c"
        );
    }

    #[test]
    fn test_empty_table_has_header() {
        let table = render_table(3, None, 0, &[ProcessField::Pid, ProcessField::Name], &[]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "snapshot #3 at - | 0 processes, showing 0");
        assert_eq!(lines[1], "PID  NAME");
    }
}
