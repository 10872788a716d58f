use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::entities::Payment;
use crate::errors::{BillingError, Result};
use crate::types::{LoanId, PaymentStatus};

/// principal plus flat interest, fixed at issuance
pub fn compute_total(principal: Money, rate: Rate) -> Money {
    principal + principal.percentage(rate.as_percentage())
}

/// equal weekly installment; any rounding remainder is not redistributed
pub fn compute_installment(total: Money, term_weeks: u32) -> Result<Money> {
    if term_weeks == 0 {
        return Err(BillingError::InvalidLoanTerms {
            message: "term must be at least one week".to_string(),
        });
    }
    Ok(total / Decimal::from(term_weeks))
}

/// weekly installment schedule seeded at loan issuance
#[derive(Debug, Clone)]
pub struct AmortizationSchedule {
    pub principal: Money,
    pub interest_rate: Rate,
    pub term_weeks: u32,
    pub issue_date: NaiveDate,
    pub total_amount: Money,
    pub installment: Money,
    pub payments: Vec<Payment>,
}

impl AmortizationSchedule {
    /// week 1 starts outstanding, every later week scheduled;
    /// week `n` falls due `n * interval_days` after the issue date
    pub fn generate(
        loan_id: LoanId,
        principal: Money,
        interest_rate: Rate,
        term_weeks: u32,
        issue_date: NaiveDate,
        interval_days: u32,
    ) -> Result<Self> {
        let total_amount = compute_total(principal, interest_rate);
        let installment = compute_installment(total_amount, term_weeks)?;

        let payments = (1..=term_weeks)
            .map(|week| {
                let status = if week == 1 {
                    PaymentStatus::Outstanding
                } else {
                    PaymentStatus::Scheduled
                };
                let due_date = due_date_for_week(issue_date, week, interval_days)?;
                Ok(Payment::new(loan_id, week, installment, due_date, status))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            principal,
            interest_rate,
            term_weeks,
            issue_date,
            total_amount,
            installment,
            payments,
        })
    }

    /// get installment for a specific week
    pub fn get_payment(&self, week: u32) -> Option<&Payment> {
        self.payments.iter().find(|p| p.week() == week)
    }

    /// sum of every installment
    pub fn scheduled_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount()).sum()
    }

    pub fn into_payments(self) -> Vec<Payment> {
        self.payments
    }
}

/// calendar date on which installment `week` falls due
pub fn due_date_for_week(issue_date: NaiveDate, week: u32, interval_days: u32) -> Result<NaiveDate> {
    let offset = u64::from(week) * u64::from(interval_days);
    issue_date
        .checked_add_days(Days::new(offset))
        .ok_or_else(|| BillingError::InvalidLoanTerms {
            message: format!("due date of week {week} is out of range"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn issue_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_total_and_installment() {
        let total = compute_total(Money::from_major(5_000_000), Rate::from_percentage(10));
        assert_eq!(total, Money::from_major(5_500_000));

        let installment = compute_installment(total, 50).unwrap();
        assert_eq!(installment, Money::from_major(110_000));
    }

    #[test]
    fn test_zero_rate_total_is_principal() {
        let total = compute_total(Money::from_major(1_000), Rate::ZERO);
        assert_eq!(total, Money::from_major(1_000));
    }

    #[test]
    fn test_zero_term_rejected() {
        assert!(matches!(
            compute_installment(Money::from_major(100), 0),
            Err(BillingError::InvalidLoanTerms { .. })
        ));
    }

    #[test]
    fn test_weekly_schedule() {
        let schedule = AmortizationSchedule::generate(
            1,
            Money::from_major(5_000_000),
            Rate::from_percentage(10),
            50,
            issue_date(),
            7,
        )
        .unwrap();

        assert_eq!(schedule.payments.len(), 50);
        assert_eq!(schedule.total_amount, Money::from_major(5_500_000));

        let first = schedule.get_payment(1).unwrap();
        assert_eq!(first.status(), PaymentStatus::Outstanding);
        assert_eq!(first.due_date(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());

        for week in 2..=50 {
            let payment = schedule.get_payment(week).unwrap();
            assert_eq!(payment.status(), PaymentStatus::Scheduled);
            assert_eq!(payment.amount(), Money::from_major(110_000));
            assert_eq!(
                (payment.due_date() - issue_date()).num_days(),
                7 * week as i64
            );
        }

        assert_eq!(schedule.scheduled_total(), schedule.total_amount);
    }

    #[test]
    fn test_uneven_division_stays_within_tolerance() {
        let schedule = AmortizationSchedule::generate(
            1,
            Money::from_major(1_000),
            Rate::from_percentage_decimal(dec!(12.5)),
            7,
            issue_date(),
            7,
        )
        .unwrap();

        assert_eq!(schedule.total_amount, Money::from_major(1_125));
        assert!(schedule
            .scheduled_total()
            .approx_eq(schedule.total_amount, dec!(0.00001)));
    }
}
