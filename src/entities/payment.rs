use chrono::NaiveDate;

use crate::decimal::Money;
use crate::errors::Result;
use crate::payments::ensure_transition;
use crate::repository::PaymentRecord;
use crate::types::{LoanId, PaymentId, PaymentStatus};

/// one weekly installment of a loan
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    id: PaymentId,
    loan_id: LoanId,
    week: u32,
    amount: Money,
    due_date: NaiveDate,
    status: PaymentStatus,
}

impl Payment {
    /// unsaved installment; storage assigns the id
    pub fn new(
        loan_id: LoanId,
        week: u32,
        amount: Money,
        due_date: NaiveDate,
        status: PaymentStatus,
    ) -> Self {
        Self {
            id: 0,
            loan_id,
            week,
            amount,
            due_date,
            status,
        }
    }

    pub fn from_record(record: &PaymentRecord) -> Result<Self> {
        Ok(Self {
            id: record.id,
            loan_id: record.loan_id,
            week: record.week,
            amount: record.amount,
            due_date: record.due_date,
            status: record.status.parse()?,
        })
    }

    pub fn to_record(&self) -> PaymentRecord {
        PaymentRecord {
            id: self.id,
            loan_id: self.loan_id,
            week: self.week,
            amount: self.amount,
            due_date: self.due_date,
            status: self.status.as_str().to_string(),
        }
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn loan_id(&self) -> LoanId {
        self.loan_id
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub(crate) fn assign_id(&mut self, id: PaymentId) {
        self.id = id;
    }

    pub(crate) fn assign_loan(&mut self, loan_id: LoanId) {
        self.loan_id = loan_id;
    }

    /// move along a legal edge; returns false when already in `next`
    pub fn transition_to(&mut self, next: PaymentStatus) -> Result<bool> {
        if self.status == next {
            return Ok(false);
        }
        ensure_transition(self.status, next)?;
        self.status = next;
        Ok(true)
    }

    /// parse then transition; an unknown value leaves the payment untouched
    pub fn set_status(&mut self, status: &str) -> Result<bool> {
        let next: PaymentStatus = status.parse()?;
        self.transition_to(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BillingError;

    fn payment(status: PaymentStatus) -> Payment {
        Payment::new(
            1,
            1,
            Money::from_major(110_000),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            status,
        )
    }

    #[test]
    fn test_unknown_status_does_not_mutate() {
        let mut p = payment(PaymentStatus::Scheduled);

        let err = p.set_status("late").unwrap_err();
        assert!(matches!(err, BillingError::InvalidStatus { .. }));
        assert_eq!(p.status(), PaymentStatus::Scheduled);
    }

    #[test]
    fn test_illegal_transition_does_not_mutate() {
        let mut p = payment(PaymentStatus::Paid);

        let err = p.transition_to(PaymentStatus::Pending).unwrap_err();
        assert!(matches!(err, BillingError::IllegalTransition { .. }));
        assert_eq!(p.status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut p = payment(PaymentStatus::Pending);
        assert!(!p.set_status("pending").unwrap());
        assert!(p.set_status("paid").unwrap());
        assert_eq!(p.status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_record_mapping() {
        let mut p = payment(PaymentStatus::Outstanding);
        p.assign_id(9);

        let record = p.to_record();
        assert_eq!(record.status, "outstanding");
        assert_eq!(Payment::from_record(&record).unwrap(), p);

        let corrupt = PaymentRecord {
            status: "overdue".to_string(),
            ..record
        };
        assert!(matches!(
            Payment::from_record(&corrupt),
            Err(BillingError::InvalidStatus { .. })
        ));
    }
}
