use crate::config::ProjectionConfig;
use crate::reconciliation::ReconciledEntry;
use crate::schema::PlanRow;
use serde::{Deserialize, Serialize};

/// Where an executed monthly value falls relative to the budget band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandPosition {
    Below,
    Within,
    Above,
}

/// Monthly and annual cost bands derived from the budgeted plan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialProjection {
    pub monthly_total: f64,
    pub monthly_lower: f64,
    pub monthly_upper: f64,
    pub annual_total: f64,
    pub annual_min: f64,
    pub annual_max: f64,
}

impl FinancialProjection {
    pub fn from_rows<'a, I>(rows: I, config: &ProjectionConfig) -> Self
    where
        I: IntoIterator<Item = &'a PlanRow>,
    {
        let (monthly_total, monthly_min, monthly_max) =
            rows.into_iter().fold((0.0, 0.0, 0.0), |(total, min, max), row| {
                (
                    total + row.monthly_cost,
                    min + row.min_value,
                    max + row.max_value,
                )
            });

        Self::from_monthly(monthly_total, monthly_min, monthly_max, config)
    }

    /// Projects a reconciled subset. Entries carry no explicit min/max value, so the
    /// annual extremes follow the band factors.
    pub fn from_entries<'a, I>(entries: I, config: &ProjectionConfig) -> Self
    where
        I: IntoIterator<Item = &'a ReconciledEntry>,
    {
        let monthly_total: f64 = entries.into_iter().map(|e| e.expected_value).sum();
        Self::from_monthly(
            monthly_total,
            monthly_total * config.lower_factor,
            monthly_total * config.upper_factor,
            config,
        )
    }

    fn from_monthly(
        monthly_total: f64,
        monthly_min: f64,
        monthly_max: f64,
        config: &ProjectionConfig,
    ) -> Self {
        let months = config.months_per_year as f64;
        Self {
            monthly_total,
            monthly_lower: monthly_total * config.lower_factor,
            monthly_upper: monthly_total * config.upper_factor,
            annual_total: monthly_total * months,
            annual_min: monthly_min * months,
            annual_max: monthly_max * months,
        }
    }

    pub fn band_position(&self, executed_monthly_value: f64) -> BandPosition {
        if executed_monthly_value < self.monthly_lower {
            BandPosition::Below
        } else if executed_monthly_value > self.monthly_upper {
            BandPosition::Above
        } else {
            BandPosition::Within
        }
    }
}
