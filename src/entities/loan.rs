use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{BillingError, Result};
use crate::payments::AmortizationSchedule;
use crate::repository::LoanRecord;
use crate::types::{CustomerId, LoanId, LoanStatus, PaymentId, PaymentStatus};

use super::Payment;

/// requested loan terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanTerms {
    pub principal: Money,
    pub rate: Rate,
    pub term_weeks: u32,
}

impl LoanTerms {
    pub fn new(principal: Money, rate: Rate, term_weeks: u32) -> Self {
        Self {
            principal,
            rate,
            term_weeks,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(BillingError::InvalidLoanTerms {
                message: format!("principal must be positive, got {}", self.principal),
            });
        }
        if !self.rate.is_valid_flat_rate() {
            return Err(BillingError::InvalidInterestRate { rate: self.rate });
        }
        if self.term_weeks == 0 {
            return Err(BillingError::InvalidLoanTerms {
                message: "term must be at least one week".to_string(),
            });
        }
        Ok(())
    }
}

/// installment loan with its weekly payment schedule
#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    id: LoanId,
    customer_id: CustomerId,
    principal: Money,
    total_amount: Money,
    rate: Rate,
    term_weeks: u32,
    status: LoanStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    payments: Vec<Payment>,
}

impl Loan {
    /// new open loan with its full schedule; ids are assigned once stored
    pub fn issue(
        customer_id: CustomerId,
        terms: LoanTerms,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Result<Self> {
        terms.validate()?;

        let issue_date = now.with_timezone(&config.reconciliation.offset()?).date_naive();
        let schedule = AmortizationSchedule::generate(
            0,
            terms.principal,
            terms.rate,
            terms.term_weeks,
            issue_date,
            config.schedule.installment_interval_days,
        )?;

        // installments are rounded to 8 dp, so the drift grows with the term
        let scheduled = schedule.scheduled_total();
        if !scheduled.approx_eq(schedule.total_amount, config.billing.amount_tolerance) {
            return Err(BillingError::InvalidLoanTerms {
                message: format!(
                    "{} installments of {} sum to {}, too far from the total {}",
                    terms.term_weeks, schedule.installment, scheduled, schedule.total_amount
                ),
            });
        }

        Ok(Self {
            id: 0,
            customer_id,
            principal: terms.principal,
            total_amount: schedule.total_amount,
            rate: terms.rate,
            term_weeks: terms.term_weeks,
            status: LoanStatus::Open,
            created_at: now,
            updated_at: now,
            payments: schedule.into_payments(),
        })
    }

    /// rebuild from storage; rejects bad amounts, unknown statuses and a second outstanding payment
    pub fn from_record(record: &LoanRecord) -> Result<Self> {
        let rate = Rate::from_percentage_decimal(record.rates);
        if !record.amount.is_positive() || !record.total_amount.is_positive() || record.term_weeks == 0 {
            return Err(BillingError::InvalidLoanTerms {
                message: format!(
                    "loan {} has invalid stored terms: amount {}, total {}, term {}",
                    record.id, record.amount, record.total_amount, record.term_weeks
                ),
            });
        }
        if !rate.is_valid_flat_rate() {
            return Err(BillingError::InvalidInterestRate { rate });
        }

        let mut payments = record
            .payments
            .iter()
            .map(Payment::from_record)
            .collect::<Result<Vec<_>>>()?;
        payments.sort_by_key(|p| p.week());

        let loan = Self {
            id: record.id,
            customer_id: record.customer_id,
            principal: record.amount,
            total_amount: record.total_amount,
            rate,
            term_weeks: record.term_weeks,
            status: record.status.parse()?,
            created_at: record.created_at,
            updated_at: record.updated_at,
            payments,
        };
        loan.ensure_single_outstanding()?;

        Ok(loan)
    }

    pub fn to_record(&self) -> LoanRecord {
        LoanRecord {
            id: self.id,
            customer_id: self.customer_id,
            amount: self.principal,
            total_amount: self.total_amount,
            rates: self.rate.as_percentage(),
            term_weeks: self.term_weeks,
            status: self.status.as_str().to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            payments: self.payments.iter().map(Payment::to_record).collect(),
        }
    }

    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn principal(&self) -> Money {
        self.principal
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn term_weeks(&self) -> u32 {
        self.term_weeks
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn is_closed(&self) -> bool {
        self.status == LoanStatus::Closed
    }

    /// storage assigned the loan id; propagate it to the schedule
    pub(crate) fn assign_id(&mut self, id: LoanId) {
        self.id = id;
        for payment in &mut self.payments {
            payment.assign_loan(id);
        }
    }

    /// ids in week order, as returned by a bulk insert
    pub(crate) fn assign_payment_ids(&mut self, ids: &[PaymentId]) {
        for (payment, id) in self.payments.iter_mut().zip(ids) {
            payment.assign_id(*id);
        }
    }

    pub fn count_with_status(&self, status: PaymentStatus) -> usize {
        self.payments.iter().filter(|p| p.status() == status).count()
    }

    pub fn pending_count(&self) -> usize {
        self.count_with_status(PaymentStatus::Pending)
    }

    pub fn ensure_single_outstanding(&self) -> Result<()> {
        let outstanding = self.count_with_status(PaymentStatus::Outstanding);
        if outstanding > 1 {
            tracing::error!(loan_id = self.id, outstanding, "more than one outstanding payment");
            return Err(BillingError::InvariantViolation {
                loan_id: self.id,
                outstanding,
            });
        }
        Ok(())
    }

    /// sum of every scheduled installment
    pub fn scheduled_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount()).sum()
    }

    /// open -> closed, exactly once
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.is_closed() {
            return Err(BillingError::LoanClosed { loan_id: self.id });
        }
        self.status = LoanStatus::Closed;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn issued() -> Loan {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let terms = LoanTerms::new(Money::from_major(5_000_000), Rate::from_percentage(10), 50);
        Loan::issue(3, terms, now, &EngineConfig::standard()).unwrap()
    }

    #[test]
    fn test_issue_builds_schedule() {
        let loan = issued();

        assert_eq!(loan.status(), LoanStatus::Open);
        assert_eq!(loan.total_amount(), Money::from_major(5_500_000));
        assert_eq!(loan.payments().len(), 50);
        assert_eq!(loan.count_with_status(PaymentStatus::Outstanding), 1);
        assert_eq!(loan.count_with_status(PaymentStatus::Scheduled), 49);
        assert_eq!(
            loan.payments()[0].due_date(),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
        assert!(loan.scheduled_total().approx_eq(loan.total_amount(), dec!(0.00001)));
    }

    #[test]
    fn test_issue_date_follows_business_timezone() {
        // 20:00 UTC on Jan 1 is already Jan 2 at UTC+7
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        let terms = LoanTerms::new(Money::from_major(700), Rate::ZERO, 1);
        let config = EngineConfig::standard().with_utc_offset(7);

        let loan = Loan::issue(1, terms, now, &config).unwrap();
        assert_eq!(
            loan.payments()[0].due_date(),
            NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
        );
    }

    #[test]
    fn test_terms_validation() {
        let config = EngineConfig::standard();
        let now = Utc::now();

        let zero_principal = LoanTerms::new(Money::ZERO, Rate::from_percentage(10), 10);
        assert!(matches!(
            Loan::issue(1, zero_principal, now, &config),
            Err(BillingError::InvalidLoanTerms { .. })
        ));

        let bad_rate = LoanTerms::new(Money::from_major(100), Rate::from_percentage(101), 10);
        assert!(matches!(
            Loan::issue(1, bad_rate, now, &config),
            Err(BillingError::InvalidInterestRate { .. })
        ));

        let no_term = LoanTerms::new(Money::from_major(100), Rate::from_percentage(10), 0);
        assert!(Loan::issue(1, no_term, now, &config).is_err());
    }

    #[test]
    fn test_long_term_rounding_drift_rejected() {
        let config = EngineConfig::standard();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let principal = Money::from_str_exact("493.82713999").unwrap();

        // 0.12345678 per week leaves 493.82712000, short by 0.00001999
        let drifting = LoanTerms::new(principal, Rate::ZERO, 4_000);
        assert!(matches!(
            Loan::issue(1, drifting, now, &config),
            Err(BillingError::InvalidLoanTerms { .. })
        ));

        let short = LoanTerms::new(principal, Rate::ZERO, 1_000);
        let loan = Loan::issue(1, short, now, &config).unwrap();
        assert!(loan.scheduled_total().approx_eq(loan.total_amount(), dec!(0.00001)));

        // an even split stays exact at any length
        let even = LoanTerms::new(Money::from_major(4_000), Rate::ZERO, 4_000);
        let loan = Loan::issue(1, even, now, &config).unwrap();
        assert_eq!(loan.scheduled_total(), loan.total_amount());
    }

    #[test]
    fn test_assign_ids_propagate() {
        let mut loan = issued();
        loan.assign_id(42);
        let ids: Vec<PaymentId> = (100..150).collect();
        loan.assign_payment_ids(&ids);

        assert!(loan.payments().iter().all(|p| p.loan_id() == 42));
        assert_eq!(loan.payments()[0].id(), 100);
        assert_eq!(loan.payments()[49].id(), 149);
    }

    #[test]
    fn test_record_round_trip_and_corruption() {
        let mut loan = issued();
        loan.assign_id(1);

        let record = loan.to_record();
        assert_eq!(record.status, "open");
        assert_eq!(record.rates, dec!(10));
        assert_eq!(Loan::from_record(&record).unwrap(), loan);

        let mut corrupt = record.clone();
        corrupt.payments[1].status = "outstanding".to_string();
        assert!(matches!(
            Loan::from_record(&corrupt),
            Err(BillingError::InvariantViolation { loan_id: 1, outstanding: 2 })
        ));

        let mut bad_status = record;
        bad_status.status = "close".to_string();
        assert!(matches!(
            Loan::from_record(&bad_status),
            Err(BillingError::InvalidStatus { .. })
        ));
    }

    #[test]
    fn test_close_exactly_once() {
        let mut loan = issued();
        let now = Utc::now();

        loan.close(now).unwrap();
        assert!(loan.is_closed());
        assert!(matches!(loan.close(now), Err(BillingError::LoanClosed { .. })));
    }
}
