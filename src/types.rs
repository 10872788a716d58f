use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::BillingError;

/// storage-assigned identifier for a customer
pub type CustomerId = u64;

/// storage-assigned identifier for a loan
pub type LoanId = u64;

/// storage-assigned identifier for a payment
pub type PaymentId = u64;

/// weekly installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// created at issuance, not yet due
    Scheduled,
    /// the single currently-due installment of a loan
    Outstanding,
    /// due date passed without payment
    Pending,
    /// settled, terminal
    Paid,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Scheduled,
        PaymentStatus::Outstanding,
        PaymentStatus::Pending,
        PaymentStatus::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Scheduled => "scheduled",
            PaymentStatus::Outstanding => "outstanding",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    /// statuses that still count towards an open loan
    pub fn is_unsettled(&self) -> bool {
        !matches!(self, PaymentStatus::Paid)
    }

    /// position in the one-directional progression
    pub fn rank(&self) -> u8 {
        match self {
            PaymentStatus::Scheduled => 0,
            PaymentStatus::Outstanding => 1,
            PaymentStatus::Pending => 2,
            PaymentStatus::Paid => 3,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BillingError::InvalidStatus {
                value: s.to_string(),
            })
    }
}

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// installments remain to be settled
    Open,
    /// every installment paid, terminal
    Closed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Open => "open",
            LoanStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(LoanStatus::Open),
            "closed" => Ok(LoanStatus::Closed),
            other => Err(BillingError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_parsing() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }

        let err = "overdue".parse::<PaymentStatus>().unwrap_err();
        assert!(matches!(err, BillingError::InvalidStatus { value } if value == "overdue"));
    }

    #[test]
    fn test_loan_status_parsing() {
        assert_eq!("open".parse::<LoanStatus>().unwrap(), LoanStatus::Open);
        assert_eq!("closed".parse::<LoanStatus>().unwrap(), LoanStatus::Closed);
        assert!("close".parse::<LoanStatus>().is_err());
        assert!("OPEN".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_lowercase() {
        let json = serde_json::to_string(&PaymentStatus::Outstanding).unwrap();
        assert_eq!(json, "\"outstanding\"");

        let status: LoanStatus = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(status, LoanStatus::Closed);
    }
}
