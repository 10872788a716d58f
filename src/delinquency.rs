use serde::{Deserialize, Serialize};

use crate::config::{DelinquencyConfig, DelinquencyScope};
use crate::entities::Customer;
use crate::types::{CustomerId, LoanId};

/// breakdown behind a delinquency decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelinquencyAssessment {
    pub customer_id: CustomerId,
    pub pending_by_loan: Vec<(LoanId, usize)>,
    pub threshold: usize,
    pub delinquent: bool,
}

impl DelinquencyAssessment {
    pub fn total_pending(&self) -> usize {
        self.pending_by_loan.iter().map(|(_, n)| n).sum()
    }
}

pub fn assess(customer: &Customer, config: &DelinquencyConfig) -> DelinquencyAssessment {
    let pending_by_loan: Vec<(LoanId, usize)> = customer
        .loans()
        .iter()
        .map(|loan| (loan.id(), loan.pending_count()))
        .collect();

    let delinquent = match config.scope {
        DelinquencyScope::PerLoan => pending_by_loan
            .iter()
            .any(|(_, pending)| *pending >= config.pending_threshold),
        DelinquencyScope::AcrossLoans => {
            pending_by_loan.iter().map(|(_, n)| n).sum::<usize>() >= config.pending_threshold
        }
    };

    DelinquencyAssessment {
        customer_id: customer.id(),
        pending_by_loan,
        threshold: config.pending_threshold,
        delinquent,
    }
}

/// true once the pending threshold is reached under the configured scope
pub fn is_delinquent(customer: &Customer, config: &DelinquencyConfig) -> bool {
    assess(customer, config).delinquent
}
