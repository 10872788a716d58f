//! storage-shaped records exchanged with a repository gateway
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{CustomerId, LoanId, PaymentId};

/// customer row, optionally with its loans preloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// zero asks storage to assign an id
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub loans: Vec<LoanRecord>,
}

/// loan row, optionally with its payments preloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub total_amount: Money,
    /// flat rate in percent, e.g. 10 for 10%
    pub rates: Decimal,
    pub term_weeks: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

/// payment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub week: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: String,
}

impl CustomerRecord {
    /// customer row without preloaded loans
    pub fn without_loans(&self) -> CustomerRecord {
        CustomerRecord {
            loans: Vec::new(),
            ..self.clone()
        }
    }
}

impl LoanRecord {
    /// loan row without preloaded payments
    pub fn without_payments(&self) -> LoanRecord {
        LoanRecord {
            payments: Vec::new(),
            ..self.clone()
        }
    }
}
