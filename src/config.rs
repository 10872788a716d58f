use chrono::{FixedOffset, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{BillingError, Result};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub delinquency: DelinquencyConfig,
}

/// amount handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// largest difference at which a received amount still settles the balance
    pub amount_tolerance: Decimal,
}

/// installment schedule shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// days between consecutive installments
    pub installment_interval_days: u32,
}

/// daily reconciliation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// installments due before today + horizon become outstanding
    pub horizon_days: u32,
    /// also re-examine pending installments on every run
    pub include_pending: bool,
    /// business timezone used for day boundaries and due dates
    pub utc_offset_hours: i32,
    /// local time of the daily run
    pub run_at: NaiveTime,
}

/// which payment sets the pending threshold is counted over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelinquencyScope {
    /// threshold must be reached on a single loan
    PerLoan,
    /// pending payments accumulate across all of a customer's loans
    AcrossLoans,
}

/// delinquency rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelinquencyConfig {
    pub pending_threshold: usize,
    pub scope: DelinquencyScope,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: dec!(0.00001),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            installment_interval_days: 7,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            include_pending: false,
            utc_offset_hours: 0,
            run_at: NaiveTime::MIN,
        }
    }
}

impl Default for DelinquencyConfig {
    fn default() -> Self {
        Self {
            pending_threshold: 2,
            scope: DelinquencyScope::AcrossLoans,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl ReconciliationConfig {
    /// business timezone as a chrono offset
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| BillingError::InvalidConfiguration {
                message: format!("utc offset out of range: {}h", self.utc_offset_hours),
            })
    }
}

impl EngineConfig {
    /// weekly installments, reconciliation over scheduled/outstanding only
    pub fn standard() -> Self {
        Self {
            billing: BillingConfig::default(),
            schedule: ScheduleConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            delinquency: DelinquencyConfig::default(),
        }
    }

    /// like `standard`, but the daily run also re-examines pending installments
    pub fn strict() -> Self {
        let mut config = Self::standard();
        config.reconciliation.include_pending = true;
        config
    }

    /// same rules, day boundaries in a fixed business timezone
    pub fn with_utc_offset(mut self, hours: i32) -> Self {
        self.reconciliation.utc_offset_hours = hours;
        self
    }

    /// parse and validate a json document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| BillingError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(BillingError::InvalidConfiguration {
                message: message.to_string(),
            })
        };

        if self.billing.amount_tolerance.is_sign_negative() {
            return invalid("amount tolerance must not be negative");
        }
        if self.schedule.installment_interval_days == 0 {
            return invalid("installment interval must be at least one day");
        }
        if self.reconciliation.horizon_days == 0 {
            return invalid("reconciliation horizon must be at least one day");
        }
        // a wider window could promote two installments of the same loan at once
        if self.reconciliation.horizon_days > self.schedule.installment_interval_days {
            return invalid("reconciliation horizon must not exceed the installment interval");
        }
        if self.reconciliation.utc_offset_hours.unsigned_abs() > 23 {
            return invalid("utc offset must lie within -23..=23 hours");
        }
        if self.delinquency.pending_threshold == 0 {
            return invalid("delinquency threshold must be at least one pending payment");
        }

        Ok(())
    }
}
