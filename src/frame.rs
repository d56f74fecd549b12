use crate::calendar::MonthLabelLocale;
use crate::progress;
use crate::schedule::{self, MonthGroup};
use chrono::NaiveDate;
use polars::prelude::*;

/// Tabular view of a schedule, one row per week, with the cumulative
/// plan/realization curve alongside.
pub fn schedule_frame(groups: &[MonthGroup], locale: MonthLabelLocale) -> PolarsResult<DataFrame> {
    let entries: Vec<_> = schedule::entries(groups).collect();
    let curve = progress::cumulative_curve(groups);

    let months: Vec<String> = entries.iter().map(|e| e.month.to_string()).collect();
    let labels: Vec<String> = entries.iter().map(|e| e.month.label(locale)).collect();
    let weeks: Vec<u32> = entries.iter().map(|e| e.week).collect();
    let starts: Vec<NaiveDate> = entries.iter().map(|e| e.start_date).collect();
    let ends: Vec<NaiveDate> = entries.iter().map(|e| e.end_date).collect();
    let rencana: Vec<f64> = entries.iter().map(|e| e.rencana()).collect();
    let realisasi: Vec<f64> = entries.iter().map(|e| e.realisasi()).collect();
    let deviasi: Vec<f64> = entries.iter().map(|e| e.deviasi()).collect();
    let cumulative_rencana: Vec<f64> = curve.iter().map(|p| p.cumulative_rencana).collect();
    let cumulative_realisasi: Vec<f64> = curve.iter().map(|p| p.cumulative_realisasi).collect();

    let columns: Vec<Column> = vec![
        Series::new(PlSmallStr::from_static("month"), months).into_column(),
        Series::new(PlSmallStr::from_static("label"), labels).into_column(),
        Series::new(PlSmallStr::from_static("week"), weeks).into_column(),
        series_from_dates("start_date", &starts)?.into_column(),
        series_from_dates("end_date", &ends)?.into_column(),
        Series::new(PlSmallStr::from_static("rencana"), rencana).into_column(),
        Series::new(PlSmallStr::from_static("realisasi"), realisasi).into_column(),
        Series::new(PlSmallStr::from_static("deviasi"), deviasi).into_column(),
        Series::new(
            PlSmallStr::from_static("cumulative_rencana"),
            cumulative_rencana,
        )
        .into_column(),
        Series::new(
            PlSmallStr::from_static("cumulative_realisasi"),
            cumulative_realisasi,
        )
        .into_column(),
    ];

    DataFrame::new(columns)
}

fn series_from_dates(name: &str, dates: &[NaiveDate]) -> PolarsResult<Series> {
    let data: Vec<i32> = dates.iter().copied().map(date_to_i32).collect();
    Series::new(name.into(), data).cast(&DataType::Date)
}

fn date_to_i32(date: NaiveDate) -> i32 {
    // NaiveDate::default() is 1970-01-01
    (date - NaiveDate::default()).num_days() as i32
}

/// Render a frame as a boxed text table for terminal output.
pub fn render_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let cells: Vec<Vec<String>> = (0..df.height())
        .map(|row_idx| {
            columns
                .iter()
                .map(|col| match col.get(row_idx) {
                    Ok(AnyValue::Null) | Err(_) => String::new(),
                    Ok(AnyValue::String(s)) => s.to_string(),
                    Ok(AnyValue::Float64(v)) => format!("{v:.2}"),
                    Ok(av) => av.to_string(),
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for row in &cells {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    push_row(&mut out, &col_names, &widths);
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        push_row(&mut out, row, &widths);
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    out.push('|');
    for (cell, width) in cells.iter().zip(widths) {
        out.push(' ');
        out.push_str(cell);
        out.push_str(&" ".repeat(width.saturating_sub(cell.len())));
        out.push_str(" |");
    }
    out.push('\n');
}
