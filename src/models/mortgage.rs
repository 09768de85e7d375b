//! Mortgage schedule models

use serde::Serialize;

/// One month of a French amortization schedule, rounded to cents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmortizationRow {
    pub month: u32,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub balance: f64,
}

/// Amortization row extended with the running costs of the property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseCostRow {
    pub amortization: AmortizationRow,
    pub property_tax: f64,
    pub home_insurance: f64,
    pub maintenance: f64,
    pub community_fees: f64,
    pub utilities: f64,
    pub total: f64,
}

/// A labelled line for plotting: (financed amount, value)
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}
