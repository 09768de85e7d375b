use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{PriceField, PriceSeries};

/// Average length of a year in days, leap years included
const DAYS_PER_YEAR: f64 = 365.25;

/// Realized simple rate of return, in percent:
///
/// `(final_amount - initial_amount) / initial_amount * 100`
///
/// `rate_percent` does not enter the formula. It is the rate the caller
/// expected and is only compared with the realized rate in the debug log.
///
/// ```
/// let realized = finkit::calculate_return(1000.0, 5.0, 1500.0).unwrap();
/// assert_eq!(realized, 50.0);
/// ```
pub fn calculate_return(initial_amount: f64, rate_percent: f64, final_amount: f64) -> Result<f64> {
    if !initial_amount.is_finite() || !final_amount.is_finite() {
        return Err(Error::invalid("Amounts must be finite numbers"));
    }
    if initial_amount == 0.0 {
        return Err(Error::invalid("Initial amount cannot be zero"));
    }

    let realized = (final_amount - initial_amount) / initial_amount * 100.0;
    debug!(
        "Realized return {:.4}% vs expected {:.4}% (difference {:.4} points)",
        realized,
        rate_percent,
        realized - rate_percent
    );

    Ok(realized)
}

/// Compound rate per period that grows `present_value` into `future_value`
/// over `periods` periods: `(FV / PV)^(1 / n) - 1`, as a decimal.
pub fn calculate_periodic_rate(present_value: f64, periods: f64, future_value: f64) -> Result<f64> {
    if !present_value.is_finite() || !periods.is_finite() || !future_value.is_finite() {
        return Err(Error::invalid("Values and periods must be finite numbers"));
    }
    if present_value == 0.0 {
        return Err(Error::invalid("Present value cannot be zero"));
    }
    if periods <= 0.0 {
        return Err(Error::invalid(format!("Number of periods must be positive, got {}", periods)));
    }

    let growth = future_value / present_value;
    if growth < 0.0 {
        return Err(Error::invalid(
            "Present and future values must have the same sign",
        ));
    }

    Ok(growth.powf(1.0 / periods) - 1.0)
}

/// Annualized rate of return of `field` between two dates of a series.
///
/// Dates default to the first and last bar. Both must be trading dates
/// present in the series; the number of years is `days / 365.25`.
pub fn series_annualized_return(
    series: &PriceSeries,
    field: PriceField,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<f64> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(Error::invalid(format!("Series for {} is empty", series.symbol()))),
    };

    let start = start.unwrap_or(first.date);
    let end = end.unwrap_or(last.date);

    let (start_bar, end_bar) = match (series.get(start), series.get(end)) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            return Err(Error::invalid(format!(
                "Dates {} and {} must both be in the series ({}..={})",
                start, end, first.date, last.date
            )))
        }
    };

    let present_value = start_bar.value(field);
    let future_value = end_bar.value(field);
    if present_value == 0.0 {
        return Err(Error::invalid(format!(
            "{} on {} is zero, cannot compute a rate of return",
            field.label(),
            start
        )));
    }

    let years = (end - start).num_days() as f64 / DAYS_PER_YEAR;
    if years <= 0.0 {
        return Err(Error::invalid("End date must be after start date"));
    }

    let rate = calculate_periodic_rate(present_value, years, future_value)?;
    debug!(
        "{} {} annualized over {:.3} years: {:.6}",
        series.symbol(),
        field.label(),
        years,
        rate
    );
    Ok(rate)
}
