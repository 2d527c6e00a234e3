use crate::errors::InvalidWindow;
use crate::models::{A1cOutcome, ChartPoint, ChartResponse, Record, SortOrder};
use chrono::{DateTime, Duration, Months, Utc};

/// Lowest top-of-scale for the chart, in mg/dL.
const CHART_Y_MAX: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAverage {
    pub records: usize,
    pub average: f64,
}

/// Start of the trailing window ending at `now`.
///
/// Whole months are subtracted on the calendar (the day clamps to the end of
/// a shorter month). A fractional remainder is pro-rated against the length of
/// the next one-month step back, so 0.25 months is a quarter of that month.
pub fn window_start(now: DateTime<Utc>, months: f64) -> Result<DateTime<Utc>, InvalidWindow> {
    if !months.is_finite() || months < 0.0 {
        return Err(InvalidWindow(months));
    }

    let whole = months.trunc();
    let fraction = months - whole;
    let whole = u32::try_from(whole as i64).map_err(|_| InvalidWindow(months))?;
    let base = now
        .checked_sub_months(Months::new(whole))
        .ok_or(InvalidWindow(months))?;
    if fraction == 0.0 {
        return Ok(base);
    }

    let previous = base
        .checked_sub_months(Months::new(1))
        .ok_or(InvalidWindow(months))?;
    let step_ms = (base - previous).num_milliseconds() as f64;
    let back = Duration::milliseconds((step_ms * fraction).round() as i64);
    base.checked_sub_signed(back).ok_or(InvalidWindow(months))
}

/// Mean level over records dated at or after `since`; `None` when none qualify.
pub fn windowed_average(records: &[Record], since: DateTime<Utc>) -> Option<WindowAverage> {
    let (count, sum) = records
        .iter()
        .filter(|record| record.date >= since)
        .fold((0usize, 0.0f64), |(count, sum), record| {
            (count + 1, sum + record.blood_sugar)
        });

    (count > 0).then(|| WindowAverage {
        records: count,
        average: sum / count as f64,
    })
}

/// ADA linear mapping from mean glucose (mg/dL) to A1c (%).
pub fn a1c_from_average(average: f64) -> f64 {
    (average + 46.7) / 28.7
}

pub fn display_a1c(a1c: f64) -> String {
    format!("{a1c:.2}")
}

pub fn estimate_a1c(
    records: &[Record],
    months: f64,
    now: DateTime<Utc>,
) -> Result<A1cOutcome, InvalidWindow> {
    let since = window_start(now, months)?;
    let outcome = match windowed_average(records, since) {
        Some(window) => {
            let a1c = a1c_from_average(window.average);
            A1cOutcome::Estimate {
                window_months: months,
                records: window.records,
                average_glucose: window.average,
                a1c,
                display: display_a1c(a1c),
            }
        }
        None => A1cOutcome::InsufficientData {
            window_months: months,
        },
    };
    Ok(outcome)
}

/// Returns a new, stably ordered copy; ties keep their incoming order.
pub fn sort_records(records: &[Record], order: SortOrder) -> Vec<Record> {
    let mut sorted = records.to_vec();
    match order {
        SortOrder::Asc => sorted.sort_by(|a, b| a.date.cmp(&b.date)),
        SortOrder::Desc => sorted.sort_by(|a, b| b.date.cmp(&a.date)),
    }
    sorted
}

pub fn chart_series(records: &[Record]) -> ChartResponse {
    let ordered = sort_records(records, SortOrder::Asc);
    let y_max = ordered
        .iter()
        .map(|record| record.blood_sugar)
        .fold(CHART_Y_MAX, f64::max);
    let count = ordered.len() as f64;

    let points = ordered
        .iter()
        .enumerate()
        .map(|(index, record)| ChartPoint {
            x: index as f64 / count * 100.0,
            y: (1.0 - record.blood_sugar / y_max) * 100.0,
            label: record.blood_sugar.to_string(),
        })
        .collect();

    ChartResponse { y_max, points }
}
