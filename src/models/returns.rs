//! Rate of return models

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::services::return_service;

/// Parameters of a single return calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnInput {
    pub initial_amount: f64,
    /// Expected rate in percent, only compared against the realized rate
    pub rate_percent: f64,
    pub final_amount: f64,
}

impl ReturnInput {
    pub fn new(initial_amount: f64, rate_percent: f64, final_amount: f64) -> Self {
        Self {
            initial_amount,
            rate_percent,
            final_amount,
        }
    }

    /// Realized rate of return in percent
    pub fn calculate(&self) -> Result<f64> {
        return_service::calculate_return(self.initial_amount, self.rate_percent, self.final_amount)
    }
}
