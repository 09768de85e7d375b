//! Mortgage and house running-cost analysis
//!
//! Loans use the French (constant payment) amortization system. Curves over
//! a range of financed amounts scale a reference loan linearly, since both
//! the payment and the total cost are proportional to the capital.

use std::fmt;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{AmortizationRow, Curve, HouseCostRow};
use crate::services::chart_service::{render_panels, ChartStyle, CurvePanel};
use crate::utils::{round_cents, Table};

/// Fixed-rate loan
#[derive(Debug, Clone, PartialEq)]
pub struct Mortgage {
    capital: f64,
    annual_rate_percent: f64,
    term_years: u32,
}

impl Mortgage {
    pub fn new(capital: f64, annual_rate_percent: f64, term_years: u32) -> Result<Self> {
        if !capital.is_finite() || capital <= 0.0 {
            return Err(Error::invalid(format!("Capital must be positive, got {}", capital)));
        }
        if !annual_rate_percent.is_finite() || annual_rate_percent < 0.0 {
            return Err(Error::invalid(format!(
                "Interest rate cannot be negative, got {}",
                annual_rate_percent
            )));
        }
        if term_years == 0 {
            return Err(Error::invalid("Term must be at least one year"));
        }

        Ok(Self {
            capital,
            annual_rate_percent,
            term_years,
        })
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn annual_rate_percent(&self) -> f64 {
        self.annual_rate_percent
    }

    pub fn term_years(&self) -> u32 {
        self.term_years
    }

    pub fn term_months(&self) -> u32 {
        self.term_years * 12
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate_percent / (12.0 * 100.0)
    }

    /// `C * i * (1 + i)^n / ((1 + i)^n - 1)`, or `C / n` for an interest-free loan
    pub fn monthly_payment(&self) -> f64 {
        let i = self.monthly_rate();
        let n = self.term_months() as f64;
        // ln_1p/exp_m1 keep (1 + i)^n - 1 accurate for tiny positive rates
        let x = n * i.ln_1p();
        let denom = x.exp_m1();
        if i == 0.0 || denom == 0.0 || !denom.is_finite() {
            return self.capital / n;
        }
        self.capital * i * x.exp() / denom
    }

    pub fn total_payment(&self) -> f64 {
        self.monthly_payment() * self.term_months() as f64
    }

    pub fn total_interest(&self) -> f64 {
        self.total_payment() - self.capital
    }

    /// Month-by-month schedule; the balance never goes below zero and the
    /// schedule stops at the month it reaches zero.
    pub fn amortization_schedule(&self) -> Vec<AmortizationRow> {
        let payment = self.monthly_payment();
        let rate = self.monthly_rate();
        let mut balance = self.capital;
        let mut schedule = Vec::with_capacity(self.term_months() as usize);

        for month in 1..=self.term_months() {
            let interest = balance * rate;
            let principal = payment - interest;
            balance = (balance - principal).max(0.0);

            schedule.push(AmortizationRow {
                month,
                payment: round_cents(payment),
                interest: round_cents(interest),
                principal: round_cents(principal),
                balance: round_cents(balance),
            });

            if balance == 0.0 {
                break;
            }
        }

        schedule
    }
}

impl fmt::Display for Mortgage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mortgage(capital={:.2}, rate={}%, term={}y)",
            self.capital, self.annual_rate_percent, self.term_years
        )
    }
}

/// A mortgage plus the recurring costs of owning the property
#[derive(Debug, Clone, PartialEq)]
pub struct House {
    pub mortgage: Mortgage,
    /// Annual
    pub property_tax: f64,
    /// Annual
    pub home_insurance: f64,
    /// Annual
    pub maintenance_cost: f64,
    /// Monthly
    pub community_fees: f64,
    /// Monthly
    pub utilities: f64,
}

impl House {
    pub fn new(
        mortgage: Mortgage,
        property_tax: f64,
        home_insurance: f64,
        maintenance_cost: f64,
        community_fees: f64,
        utilities: f64,
    ) -> Result<Self> {
        let costs = [property_tax, home_insurance, maintenance_cost, community_fees, utilities];
        if costs.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(Error::invalid("House costs must be non-negative numbers"));
        }

        Ok(Self {
            mortgage,
            property_tax,
            home_insurance,
            maintenance_cost,
            community_fees,
            utilities,
        })
    }

    pub fn monthly_property_tax(&self) -> f64 {
        self.property_tax / 12.0
    }

    pub fn monthly_home_insurance(&self) -> f64 {
        self.home_insurance / 12.0
    }

    pub fn monthly_maintenance_cost(&self) -> f64 {
        self.maintenance_cost / 12.0
    }

    /// Running costs on top of the loan payment, per month
    pub fn monthly_extras(&self) -> f64 {
        self.monthly_property_tax()
            + self.monthly_home_insurance()
            + self.monthly_maintenance_cost()
            + self.community_fees
            + self.utilities
    }

    pub fn total_monthly_cost(&self) -> f64 {
        self.mortgage.monthly_payment() + self.monthly_extras()
    }

    /// One year of running costs
    pub fn total_first_year_extras(&self) -> f64 {
        self.property_tax
            + self.home_insurance
            + self.maintenance_cost
            + (self.community_fees + self.utilities) * 12.0
    }

    /// Loan total plus a single year of running costs
    pub fn total_payment(&self) -> f64 {
        self.mortgage.total_payment() + self.total_first_year_extras()
    }

    pub fn detailed_schedule(&self) -> Vec<HouseCostRow> {
        let property_tax = self.monthly_property_tax();
        let home_insurance = self.monthly_home_insurance();
        let maintenance = self.monthly_maintenance_cost();

        self.mortgage
            .amortization_schedule()
            .into_iter()
            .map(|row| {
                let total = row.payment
                    + property_tax
                    + home_insurance
                    + maintenance
                    + self.community_fees
                    + self.utilities;
                HouseCostRow {
                    amortization: row,
                    property_tax: round_cents(property_tax),
                    home_insurance: round_cents(home_insurance),
                    maintenance: round_cents(maintenance),
                    community_fees: round_cents(self.community_fees),
                    utilities: round_cents(self.utilities),
                    total: round_cents(total),
                }
            })
            .collect()
    }
}

impl fmt::Display for House {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "House({}, property_tax={:.2}, home_insurance={:.2}, maintenance={:.2}, community_fees={:.2}, utilities={:.2})",
            self.mortgage,
            self.property_tax,
            self.home_insurance,
            self.maintenance_cost,
            self.community_fees,
            self.utilities
        )
    }
}

/// Which panels a comparison plot should contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Monthly,
    Total,
    /// Monthly and total panels side by side
    Both,
}

/// Upper bound on the number of points `amount_range` will produce
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Inclusive grid `min, min + step, ..., max`
pub fn amount_range(min: f64, max: f64, step: f64) -> Result<Vec<f64>> {
    if !min.is_finite() || !max.is_finite() || !step.is_finite() {
        return Err(Error::invalid("Amount range bounds must be finite"));
    }
    if step <= 0.0 {
        return Err(Error::invalid(format!("Step must be positive, got {}", step)));
    }
    if min > max {
        return Err(Error::invalid(format!("Minimum {} is above maximum {}", min, max)));
    }

    let steps = ((max - min) / step + 1e-9).floor();
    if steps + 1.0 > MAX_GRID_POINTS as f64 {
        return Err(Error::invalid(format!(
            "Range {}..={} with step {} exceeds {} points",
            min, max, step, MAX_GRID_POINTS
        )));
    }
    let count = steps as usize + 1;
    Ok((0..count).map(|k| min + step * k as f64).collect())
}

/// Collects loans and houses to compare side by side
#[derive(Debug, Default)]
pub struct MortgageSimulator {
    mortgages: Vec<Mortgage>,
    houses: Vec<House>,
}

impl MortgageSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mortgage(&mut self, mortgage: Mortgage) {
        self.mortgages.push(mortgage);
    }

    pub fn add_house(&mut self, house: House) {
        self.houses.push(house);
    }

    pub fn mortgages(&self) -> &[Mortgage] {
        &self.mortgages
    }

    pub fn houses(&self) -> &[House] {
        &self.houses
    }

    pub fn compare_mortgages(&self) -> Table {
        let mut table = Table::new(&["Mortgage", "Monthly", "Total", "Interest"]).numeric();
        for mortgage in &self.mortgages {
            table.add_row(vec![
                mortgage.to_string(),
                format!("{:.2}", mortgage.monthly_payment()),
                format!("{:.2}", mortgage.total_payment()),
                format!("{:.2}", mortgage.total_interest()),
            ]);
        }
        table
    }

    pub fn compare_houses(&self) -> Table {
        let mut table = Table::new(&["Rate", "Loan/month", "Extras/month", "Total/month"]).numeric();
        for house in &self.houses {
            table.add_row(vec![
                format!("{}%", house.mortgage.annual_rate_percent()),
                format!("{:.2}", house.mortgage.monthly_payment()),
                format!("{:.2}", house.monthly_extras()),
                format!("{:.2}", house.total_monthly_cost()),
            ]);
        }
        table
    }

    /// Annual rate (percent) at which `capital` over `term_years` costs
    /// exactly `max_monthly_payment`, found by bisection on [0, 100].
    pub fn required_interest(capital: f64, term_years: u32, max_monthly_payment: f64) -> Result<f64> {
        const TOLERANCE: f64 = 1e-6;
        const MAX_ITERATIONS: u32 = 1000;

        let mut lower = 0.0_f64;
        let mut upper = 100.0_f64;

        for iteration in 0..MAX_ITERATIONS {
            let mid = (lower + upper) / 2.0;
            let payment = Mortgage::new(capital, mid, term_years)?.monthly_payment();

            if (payment - max_monthly_payment).abs() < TOLERANCE {
                debug!("Required interest {:.6}% found after {} iterations", mid, iteration + 1);
                return Ok(mid);
            }
            if payment > max_monthly_payment {
                upper = mid;
            } else {
                lower = mid;
            }
        }

        Err(Error::invalid(format!(
            "No interest rate in [0, 100]% gives a monthly payment of {:.2}",
            max_monthly_payment
        )))
    }

    fn scaled_curves<F>(&self, amounts: &[f64], value: F) -> Vec<Curve>
    where
        F: Fn(&Mortgage) -> f64,
    {
        self.mortgages
            .iter()
            .map(|m| Curve {
                label: format!("{}% TIN", m.annual_rate_percent()),
                points: amounts
                    .iter()
                    .map(|&amount| (amount, value(m) * amount / m.capital()))
                    .collect(),
            })
            .collect()
    }

    fn scaled_house_curves<F>(&self, amounts: &[f64], value: F) -> Vec<Curve>
    where
        F: Fn(&House) -> f64,
    {
        self.houses
            .iter()
            .map(|h| Curve {
                label: format!("{}% TIN", h.mortgage.annual_rate_percent()),
                points: amounts
                    .iter()
                    .map(|&amount| (amount, value(h) * amount / h.mortgage.capital()))
                    .collect(),
            })
            .collect()
    }

    /// Monthly payment vs. financed amount, one curve per mortgage
    pub fn payment_curves(&self, amounts: &[f64]) -> Vec<Curve> {
        self.scaled_curves(amounts, Mortgage::monthly_payment)
    }

    /// Total paid vs. financed amount, one curve per mortgage
    pub fn total_curves(&self, amounts: &[f64]) -> Vec<Curve> {
        self.scaled_curves(amounts, Mortgage::total_payment)
    }

    pub fn house_monthly_curves(&self, amounts: &[f64]) -> Vec<Curve> {
        self.scaled_house_curves(amounts, House::total_monthly_cost)
    }

    pub fn house_total_curves(&self, amounts: &[f64]) -> Vec<Curve> {
        self.scaled_house_curves(amounts, House::total_payment)
    }

    /// PNG of the mortgage comparison for the requested panel
    pub fn plot_mortgages(
        &self,
        amounts: &[f64],
        kind: PlotKind,
        style: &ChartStyle,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>> {
        info!("Plotting {} mortgages over {} amounts", self.mortgages.len(), amounts.len());
        let monthly = self.payment_curves(amounts);
        let total = self.total_curves(amounts);
        let panels = select_panels(
            kind,
            CurvePanel {
                title: "Monthly payment vs. financed amount",
                x_desc: "Financed amount",
                y_desc: "Monthly payment",
                curves: &monthly,
            },
            CurvePanel {
                title: "Total paid vs. financed amount",
                x_desc: "Financed amount",
                y_desc: "Total paid",
                curves: &total,
            },
        );
        render_panels(&panels, style, width, height)
    }

    /// PNG of the house cost comparison for the requested panel
    pub fn plot_houses(
        &self,
        amounts: &[f64],
        kind: PlotKind,
        style: &ChartStyle,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>> {
        info!("Plotting {} houses over {} amounts", self.houses.len(), amounts.len());
        let monthly = self.house_monthly_curves(amounts);
        let total = self.house_total_curves(amounts);
        let panels = select_panels(
            kind,
            CurvePanel {
                title: "Total monthly cost vs. financed amount",
                x_desc: "Financed amount",
                y_desc: "Total monthly cost",
                curves: &monthly,
            },
            CurvePanel {
                title: "Total paid vs. financed amount",
                x_desc: "Financed amount",
                y_desc: "Total paid",
                curves: &total,
            },
        );
        render_panels(&panels, style, width, height)
    }
}

fn select_panels<'a>(kind: PlotKind, monthly: CurvePanel<'a>, total: CurvePanel<'a>) -> Vec<CurvePanel<'a>> {
    match kind {
        PlotKind::Monthly => vec![monthly],
        PlotKind::Total => vec![total],
        PlotKind::Both => vec![monthly, total],
    }
}
