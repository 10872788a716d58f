//! daily reconciliation of payment statuses against the calendar
//!
//! Each run looks at the installments due before `today + horizon`: anything
//! already past due becomes pending, anything scheduled inside the horizon
//! becomes outstanding. Runs are idempotent and never move a status backward.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::config::ReconciliationConfig;
use crate::entities::Payment;
use crate::errors::{BillingError, Result};
use crate::events::{Event, EventStore};
use crate::repository::RepositoryGateway;
use crate::types::{LoanId, PaymentStatus};

/// what a single run looked at and changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub today: NaiveDate,
    pub horizon: NaiveDate,
    pub examined: usize,
    pub marked_pending: usize,
    pub marked_outstanding: usize,
}

impl ReconciliationReport {
    pub fn updated(&self) -> usize {
        self.marked_pending + self.marked_outstanding
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationJob {
    config: ReconciliationConfig,
}

impl ReconciliationJob {
    pub fn new(config: ReconciliationConfig) -> Self {
        Self { config }
    }

    /// business-day `today` and the exclusive horizon for `now`
    pub fn window(&self, now: DateTime<Utc>) -> Result<(NaiveDate, NaiveDate)> {
        let today = now.with_timezone(&self.config.offset()?).date_naive();
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.config.horizon_days)))
            .ok_or_else(|| BillingError::InvalidConfiguration {
                message: format!("horizon out of range for {today}"),
            })?;
        Ok((today, horizon))
    }

    /// status a payment should move to, `None` when it stays put
    pub fn decide(payment: &Payment, today: NaiveDate, horizon: NaiveDate) -> Option<PaymentStatus> {
        match payment.status() {
            PaymentStatus::Paid | PaymentStatus::Pending => None,
            PaymentStatus::Scheduled | PaymentStatus::Outstanding if payment.due_date() < today => {
                Some(PaymentStatus::Pending)
            }
            PaymentStatus::Scheduled if payment.due_date() < horizon => {
                Some(PaymentStatus::Outstanding)
            }
            _ => None,
        }
    }

    fn statuses(&self) -> Vec<PaymentStatus> {
        let mut statuses = vec![PaymentStatus::Scheduled, PaymentStatus::Outstanding];
        if self.config.include_pending {
            statuses.push(PaymentStatus::Pending);
        }
        statuses
    }

    /// advance every due installment as of `now`
    ///
    /// All transitions are planned before the first write. A plan that would
    /// leave a loan with two outstanding installments is rejected without
    /// writing anything. A failed write aborts the run; the caller's
    /// transaction decides whether earlier writes survive.
    pub fn reconcile_due<G: RepositoryGateway>(
        &self,
        tx: &mut G,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<ReconciliationReport> {
        let (today, horizon) = self.window(now)?;

        let records = tx
            .get_payments_due_before_date(horizon, &self.statuses())
            .map_err(BillingError::repository("get_payments_due_before_date", horizon))?;

        let mut plan = Vec::new();
        for record in &records {
            let mut payment = Payment::from_record(record)?;
            if let Some(next) = Self::decide(&payment, today, horizon) {
                payment.transition_to(next)?;
                plan.push(payment);
            }
        }

        self.check_plan(tx, &plan)?;

        let mut report = ReconciliationReport {
            today,
            horizon,
            examined: records.len(),
            marked_pending: 0,
            marked_outstanding: 0,
        };
        let mut emitted = Vec::with_capacity(plan.len());

        for payment in &plan {
            tx.update_payment_status(payment.id(), payment.status())
                .map_err(BillingError::repository("update_payment_status", payment.id()))?;

            tracing::debug!(
                loan_id = payment.loan_id(),
                payment_id = payment.id(),
                week = payment.week(),
                status = %payment.status(),
                "payment status reconciled"
            );

            let event = if payment.status() == PaymentStatus::Pending {
                report.marked_pending += 1;
                Event::PaymentMissed {
                    loan_id: payment.loan_id(),
                    payment_id: payment.id(),
                    week: payment.week(),
                    amount: payment.amount(),
                    due_date: payment.due_date(),
                }
            } else {
                report.marked_outstanding += 1;
                Event::PaymentDue {
                    loan_id: payment.loan_id(),
                    payment_id: payment.id(),
                    week: payment.week(),
                    amount: payment.amount(),
                    due_date: payment.due_date(),
                }
            };
            emitted.push(event);
        }

        for event in emitted {
            events.emit(event);
        }
        events.emit(Event::ReconciliationCompleted {
            today,
            examined: report.examined,
            updated: report.updated(),
            timestamp: now,
        });

        tracing::info!(
            %today,
            %horizon,
            examined = report.examined,
            marked_pending = report.marked_pending,
            marked_outstanding = report.marked_outstanding,
            "reconciliation completed"
        );

        Ok(report)
    }

    /// reconcile at the provider's current instant
    pub fn run<G: RepositoryGateway>(
        &self,
        tx: &mut G,
        time: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<ReconciliationReport> {
        self.reconcile_due(tx, time.now(), events)
    }

    /// next configured run strictly after `now`
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let offset = self.config.offset()?;
        let local = now.with_timezone(&offset);

        let mut date = local.date_naive();
        if date.and_time(self.config.run_at) <= local.naive_local() {
            date = date.succ_opt().ok_or_else(|| BillingError::InvalidConfiguration {
                message: format!("no run date after {date}"),
            })?;
        }

        offset
            .from_local_datetime(&date.and_time(self.config.run_at))
            .single()
            .map(|next| next.with_timezone(&Utc))
            .ok_or_else(|| BillingError::InvalidConfiguration {
                message: format!("ambiguous run time on {date}"),
            })
    }

    /// reject a plan that would put a second installment of a loan in outstanding
    fn check_plan<G: RepositoryGateway>(&self, tx: &mut G, plan: &[Payment]) -> Result<()> {
        let mut promoted: BTreeMap<LoanId, usize> = BTreeMap::new();
        for payment in plan {
            if payment.status() == PaymentStatus::Outstanding {
                *promoted.entry(payment.loan_id()).or_default() += 1;
            }
        }

        for (loan_id, promotions) in promoted {
            let current = tx
                .get_outstanding_and_pending_payments(loan_id)
                .map_err(BillingError::repository("get_outstanding_and_pending_payments", loan_id))?;

            let kept = current
                .iter()
                .filter(|record| record.status == PaymentStatus::Outstanding.as_str())
                .filter(|record| !plan.iter().any(|p| p.id() == record.id))
                .count();

            let outstanding = kept + promotions;
            if outstanding > 1 {
                tracing::error!(loan_id, outstanding, "reconciliation would leave more than one outstanding payment");
                return Err(BillingError::InvariantViolation {
                    loan_id,
                    outstanding,
                });
            }
        }

        Ok(())
    }
}
