use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::entities::Payment;
use crate::errors::{BillingError, Result};
use crate::types::{PaymentId, PaymentStatus};

/// amount currently due on a loan and the installment it is reported against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingBalance {
    pub amount: Money,
    pub reference_week: u32,
    pub reference_due_date: NaiveDate,
    pub pending_count: usize,
    pub outstanding_payment_id: Option<PaymentId>,
}

/// classify pending payments and the single outstanding one into the balance due
///
/// - no pending: the outstanding installment
/// - one pending: the pending installment only, reported against the pending week
/// - two or more pending: every pending installment plus the outstanding one,
///   reported against the outstanding week
/// - pending but nothing outstanding (the schedule ran out): every pending
///   installment, reported against the latest pending week
///
/// Returns `None` when nothing is pending or outstanding.
pub fn compute_outstanding(payments: &[Payment]) -> Result<Option<OutstandingBalance>> {
    let mut pending: Vec<&Payment> = Vec::new();
    let mut outstanding: Vec<&Payment> = Vec::new();

    for payment in payments {
        match payment.status() {
            PaymentStatus::Pending => pending.push(payment),
            PaymentStatus::Outstanding => outstanding.push(payment),
            PaymentStatus::Scheduled | PaymentStatus::Paid => {}
        }
    }

    if outstanding.len() > 1 {
        let loan_id = outstanding[0].loan_id();
        tracing::error!(loan_id, outstanding = outstanding.len(), "more than one outstanding payment");
        return Err(BillingError::InvariantViolation {
            loan_id,
            outstanding: outstanding.len(),
        });
    }

    pending.sort_by_key(|p| p.week());

    let Some(current) = outstanding.first() else {
        let Some(latest) = pending.last() else {
            return Ok(None);
        };
        return Ok(Some(OutstandingBalance {
            amount: pending.iter().map(|p| p.amount()).sum(),
            reference_week: latest.week(),
            reference_due_date: latest.due_date(),
            pending_count: pending.len(),
            outstanding_payment_id: None,
        }));
    };

    let (amount, reference) = match pending.as_slice() {
        [] => (current.amount(), *current),
        [only] => (only.amount(), *only),
        many => (
            many.iter().map(|p| p.amount()).sum::<Money>() + current.amount(),
            *current,
        ),
    };

    Ok(Some(OutstandingBalance {
        amount,
        reference_week: reference.week(),
        reference_due_date: reference.due_date(),
        pending_count: pending.len(),
        outstanding_payment_id: Some(current.id()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installment(week: u32, status: PaymentStatus) -> Payment {
        let due = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(7 * week as i64);
        let mut payment = Payment::new(1, week, Money::from_major(110_000), due, status);
        payment.assign_id(week as u64 * 10);
        payment
    }

    #[test]
    fn test_single_outstanding() {
        let payments = vec![
            installment(1, PaymentStatus::Outstanding),
            installment(2, PaymentStatus::Scheduled),
        ];

        let balance = compute_outstanding(&payments).unwrap().unwrap();
        assert_eq!(balance.amount, Money::from_major(110_000));
        assert_eq!(balance.reference_week, 1);
        assert_eq!(balance.pending_count, 0);
        assert_eq!(balance.outstanding_payment_id, Some(10));
    }

    #[test]
    fn test_one_pending_reports_pending_amount_only() {
        let payments = vec![
            installment(1, PaymentStatus::Pending),
            installment(2, PaymentStatus::Outstanding),
        ];

        let balance = compute_outstanding(&payments).unwrap().unwrap();
        assert_eq!(balance.amount, Money::from_major(110_000));
        assert_eq!(balance.reference_week, 1);
        assert_eq!(balance.reference_due_date, payments[0].due_date());
    }

    #[test]
    fn test_many_pending_include_outstanding() {
        let payments = vec![
            installment(1, PaymentStatus::Pending),
            installment(2, PaymentStatus::Pending),
            installment(3, PaymentStatus::Outstanding),
            installment(4, PaymentStatus::Scheduled),
        ];

        let balance = compute_outstanding(&payments).unwrap().unwrap();
        assert_eq!(balance.amount, Money::from_major(330_000));
        assert_eq!(balance.reference_week, 3);
        assert_eq!(balance.pending_count, 2);
    }

    #[test]
    fn test_nothing_due_has_no_result() {
        let payments = vec![
            installment(1, PaymentStatus::Paid),
            installment(2, PaymentStatus::Scheduled),
        ];
        assert!(compute_outstanding(&payments).unwrap().is_none());
        assert!(compute_outstanding(&[]).unwrap().is_none());
    }

    #[test]
    fn test_lapsed_tail_sums_pending() {
        let payments = vec![
            installment(1, PaymentStatus::Paid),
            installment(2, PaymentStatus::Pending),
            installment(3, PaymentStatus::Pending),
        ];

        let balance = compute_outstanding(&payments).unwrap().unwrap();
        assert_eq!(balance.amount, Money::from_major(220_000));
        assert_eq!(balance.reference_week, 3);
        assert_eq!(balance.outstanding_payment_id, None);
    }

    #[test]
    fn test_two_outstanding_is_invariant_violation() {
        let payments = vec![
            installment(1, PaymentStatus::Outstanding),
            installment(2, PaymentStatus::Outstanding),
        ];

        assert!(matches!(
            compute_outstanding(&payments),
            Err(BillingError::InvariantViolation { loan_id: 1, outstanding: 2 })
        ));
    }
}
