//! serializable results returned to the service layer
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::entities::{Loan, Payment};
use crate::payments::OutstandingBalance;
use crate::types::{CustomerId, LoanId, LoanStatus, PaymentId, PaymentStatus};

/// result of issuing a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanIssuance {
    pub loan_id: LoanId,
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub outstanding_amount: Money,
    pub week: u32,
    pub due_date: NaiveDate,
}

/// amount currently due on a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingSummary {
    pub loan_id: LoanId,
    pub total_amount: Money,
    pub outstanding_amount: Money,
    pub due_date: NaiveDate,
    /// week the amount is reported against
    pub weeks_outstanding: u32,
}

impl OutstandingSummary {
    pub fn new(loan_id: LoanId, total_amount: Money, balance: &OutstandingBalance) -> Self {
        Self {
            loan_id,
            total_amount,
            outstanding_amount: balance.amount,
            due_date: balance.reference_due_date,
            weeks_outstanding: balance.reference_week,
        }
    }
}

/// acknowledgement of an accepted payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: Uuid,
    pub loan_id: LoanId,
    pub amount: Money,
    pub settled_weeks: Vec<u32>,
    pub next_outstanding_week: Option<u32>,
    pub loan_closed: bool,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentView {
    pub id: PaymentId,
    pub week: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
}

impl From<&Payment> for InstallmentView {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id(),
            week: payment.week(),
            amount: payment.amount(),
            due_date: payment.due_date(),
            status: payment.status(),
        }
    }
}

/// full state of a loan and its schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub customer_id: CustomerId,
    pub status: LoanStatus,
    pub principal: Money,
    pub interest_rate: Rate,
    pub total_amount: Money,
    pub term_weeks: u32,
    pub paid_amount: Money,
    pub remaining_amount: Money,
    pub paid_count: usize,
    pub pending_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub installments: Vec<InstallmentView>,
}

impl LoanView {
    pub fn from_loan(loan: &Loan) -> Self {
        let paid_amount: Money = loan
            .payments()
            .iter()
            .filter(|p| p.status() == PaymentStatus::Paid)
            .map(|p| p.amount())
            .sum();

        LoanView {
            id: loan.id(),
            customer_id: loan.customer_id(),
            status: loan.status(),
            principal: loan.principal(),
            interest_rate: loan.rate(),
            total_amount: loan.total_amount(),
            term_weeks: loan.term_weeks(),
            paid_amount,
            remaining_amount: (loan.total_amount() - paid_amount).max(Money::ZERO),
            paid_count: loan.count_with_status(PaymentStatus::Paid),
            pending_count: loan.pending_count(),
            created_at: loan.created_at(),
            updated_at: loan.updated_at(),
            installments: loan.payments().iter().map(InstallmentView::from).collect(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
