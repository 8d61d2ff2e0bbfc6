//! Monthly climatologies from multi-year monthly series.

use anyhow::{bail, ensure, Context, Result};
use chrono::{Datelike, Duration, NaiveDate};
use ndarray::{Array3, ArrayView3, Axis};

/// Decodes a CF-style time axis (`days since <date> [time]`) to dates.
pub fn decode_time_axis(values: &[f64], units: &str) -> Result<Vec<NaiveDate>> {
    let rest = units
        .strip_prefix("days since ")
        .with_context(|| format!("unsupported time units `{units}`"))?;
    let origin_text = rest
        .split_whitespace()
        .next()
        .with_context(|| format!("no reference date in time units `{units}`"))?;
    let origin = parse_reference_date(origin_text)
        .with_context(|| format!("unparseable reference date in `{units}`"))?;

    values
        .iter()
        .map(|offset| {
            origin
                .checked_add_signed(Duration::days(offset.trunc() as i64))
                .with_context(|| format!("time offset {offset} overflows the calendar"))
        })
        .collect()
}

// Reference dates appear both zero-padded (1850-01-01) and not (1850-1-1).
fn parse_reference_date(text: &str) -> Result<NaiveDate> {
    let mut parts = text.split('-');
    let (year, month, day) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(y), Some(m), Some(d), None) => (y.parse()?, m.parse()?, d.parse()?),
        _ => bail!("expected YYYY-MM-DD, got `{text}`"),
    };

    NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("`{text}` is not a calendar date"))
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> f64 {
    let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .expect("first of an existing month");
    let next = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
    .expect("first of the following month");

    (next - start).num_days() as f64
}

/// Collapses a `(time, lat, lon)` monthly series into a 12-month
/// climatology, each calendar month averaged over the years with the
/// month's length in days as the weight.
pub fn monthly_climatology(
    series: ArrayView3<'_, f64>,
    dates: &[NaiveDate],
) -> Result<Array3<f64>> {
    let n_time = series.len_of(Axis(0));
    ensure!(
        n_time == dates.len(),
        "series has {} timesteps but the time axis has {} entries",
        n_time,
        dates.len()
    );
    ensure!(n_time > 0, "cannot build a climatology from an empty series");

    let (_, n_lat, n_lon) = series.dim();
    let mut climatology = Array3::zeros((12, n_lat, n_lon));
    let mut weights = [0.0_f64; 12];

    for (step, date) in dates.iter().enumerate() {
        let month = date.month0() as usize;
        let weight = days_in_month(*date);

        let mut accumulated = climatology.index_axis_mut(Axis(0), month);
        accumulated.scaled_add(weight, &series.index_axis(Axis(0), step));
        weights[month] += weight;
    }

    for (month, weight) in weights.iter().enumerate() {
        ensure!(
            *weight > 0.0,
            "no timesteps found for calendar month {}",
            month + 1
        );
        climatology
            .index_axis_mut(Axis(0), month)
            .mapv_inplace(|v| v / weight);
    }

    Ok(climatology)
}

// -- Tests -------------------------------------------------------------------
