use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::delinquency::{self, DelinquencyAssessment};
use crate::entities::{Customer, Loan, LoanTerms, Payment};
use crate::errors::{BillingError, Result};
use crate::events::{Event, EventStore};
use crate::payments::{compute_outstanding, validate_settlement_amount, FifoWaterfall};
use crate::reconciliation::{ReconciliationJob, ReconciliationReport};
use crate::repository::{CustomerRecord, PaymentRecord, RepositoryGateway};
use crate::types::{CustomerId, LoanId, LoanStatus, PaymentStatus};
use crate::views::{LoanIssuance, LoanView, OutstandingSummary, PaymentReceipt};

/// loan application as received from the service layer
#[derive(Debug, Clone, PartialEq)]
pub struct CreateLoanRequest {
    /// zero lets storage assign a new customer id
    pub customer_id: CustomerId,
    pub name: String,
    pub email: String,
    pub principal: Money,
    pub term_weeks: u32,
    /// flat rate in percent
    pub rate_percent: Decimal,
}

impl CreateLoanRequest {
    pub fn new(
        customer_id: CustomerId,
        name: impl Into<String>,
        email: impl Into<String>,
        principal: Money,
        term_weeks: u32,
        rate_percent: Decimal,
    ) -> Self {
        Self {
            customer_id,
            name: name.into(),
            email: email.into(),
            principal,
            term_weeks,
            rate_percent,
        }
    }

    fn terms(&self) -> LoanTerms {
        LoanTerms::new(
            self.principal,
            Rate::from_percentage_decimal(self.rate_percent),
            self.term_weeks,
        )
    }
}

/// payment lifecycle core
///
/// Every operation runs against the transaction handle passed in; the engine
/// never commits. Events are buffered here only once an operation has made
/// all of its writes.
pub struct BillingEngine {
    config: EngineConfig,
    reconciliation: ReconciliationJob,
    events: EventStore,
}

impl BillingEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let reconciliation = ReconciliationJob::new(config.reconciliation.clone());
        Ok(Self {
            config,
            reconciliation,
            events: EventStore::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    /// issue a loan, registering the customer on first contact
    pub fn create_loan<G: RepositoryGateway>(
        &mut self,
        tx: &mut G,
        request: CreateLoanRequest,
        time: &SafeTimeProvider,
    ) -> Result<LoanIssuance> {
        let now = time.now();
        let terms = request.terms();
        terms.validate()?;

        let mut emitted = Vec::new();
        let customer_id = self.ensure_customer(tx, &request, now, &mut emitted)?;

        let mut loan = Loan::issue(customer_id, terms, now, &self.config)?;
        let loan_id = tx
            .save_loan(&loan.to_record().without_payments())
            .map_err(BillingError::repository("save_loan", customer_id))?;
        loan.assign_id(loan_id);

        let records: Vec<PaymentRecord> = loan.payments().iter().map(Payment::to_record).collect();
        let ids = tx
            .save_payments(&records)
            .map_err(BillingError::repository("save_payments", loan_id))?;
        loan.assign_payment_ids(&ids);

        let first = loan
            .payments()
            .first()
            .cloned()
            .ok_or_else(|| BillingError::InvalidLoanTerms {
                message: format!("loan {loan_id} has an empty schedule"),
            })?;

        emitted.push(Event::LoanIssued {
            loan_id,
            customer_id,
            principal: loan.principal(),
            total_amount: loan.total_amount(),
            installment: first.amount(),
            term_weeks: loan.term_weeks(),
            timestamp: now,
        });
        emitted.push(Event::PaymentDue {
            loan_id,
            payment_id: first.id(),
            week: first.week(),
            amount: first.amount(),
            due_date: first.due_date(),
        });
        self.emit_all(emitted);

        tracing::info!(
            loan_id,
            customer_id,
            principal = %loan.principal(),
            total_amount = %loan.total_amount(),
            term_weeks = loan.term_weeks(),
            "loan issued"
        );

        Ok(LoanIssuance {
            loan_id,
            customer_id,
            total_amount: loan.total_amount(),
            outstanding_amount: first.amount(),
            week: first.week(),
            due_date: first.due_date(),
        })
    }

    /// amount due right now, `None` when nothing is due
    pub fn get_outstanding<G: RepositoryGateway>(
        &self,
        tx: &mut G,
        loan_id: LoanId,
    ) -> Result<Option<OutstandingSummary>> {
        let loan = self.load_loan(tx, loan_id)?;
        let balance = compute_outstanding(loan.payments())?;

        Ok(balance.map(|b| OutstandingSummary::new(loan.id(), loan.total_amount(), &b)))
    }

    /// settle the currently-due balance in full
    pub fn apply_payment<G: RepositoryGateway>(
        &mut self,
        tx: &mut G,
        loan_id: LoanId,
        amount: Money,
        time: &SafeTimeProvider,
    ) -> Result<PaymentReceipt> {
        let now = time.now();
        let mut loan = self.load_loan(tx, loan_id)?;
        if loan.is_closed() {
            tracing::warn!(loan_id, provided = %amount, "payment against closed loan");
            return Err(BillingError::LoanClosed { loan_id });
        }

        let mut due = tx
            .get_outstanding_and_pending_payments(loan_id)
            .map_err(BillingError::repository("get_outstanding_and_pending_payments", loan_id))?
            .iter()
            .map(Payment::from_record)
            .collect::<Result<Vec<_>>>()?;

        let tolerance = self.config.billing.amount_tolerance;
        let expected = compute_outstanding(&due)?.map_or(Money::ZERO, |b| b.amount);
        if let Err(err) = validate_settlement_amount(expected, amount, tolerance) {
            tracing::warn!(loan_id, %expected, provided = %amount, "payment rejected");
            return Err(err);
        }

        let settlement = FifoWaterfall::new(tolerance).apply(&mut due, amount)?;

        let mut emitted = Vec::new();
        for settled in &settlement.settled {
            tx.update_payment_status(settled.payment_id, PaymentStatus::Paid)
                .map_err(BillingError::repository("update_payment_status", settled.payment_id))?;
            emitted.push(Event::InstallmentPaid {
                loan_id,
                payment_id: settled.payment_id,
                week: settled.week,
                amount: settled.amount,
                timestamp: now,
            });
        }

        let next = tx
            .get_next_payment(loan_id)
            .map_err(BillingError::repository("get_next_payment", loan_id))?
            .map(|record| Payment::from_record(&record))
            .transpose()?;

        let mut next_outstanding_week = None;
        let mut loan_closed = false;
        match next {
            Some(mut payment) if payment.status() == PaymentStatus::Scheduled => {
                let after_settled = settlement
                    .last_settled_week()
                    .map_or(true, |week| payment.week() > week);
                if after_settled {
                    payment.transition_to(PaymentStatus::Outstanding)?;
                    tx.update_payment_status(payment.id(), payment.status())
                        .map_err(BillingError::repository("update_payment_status", payment.id()))?;
                    next_outstanding_week = Some(payment.week());
                    emitted.push(Event::PaymentDue {
                        loan_id,
                        payment_id: payment.id(),
                        week: payment.week(),
                        amount: payment.amount(),
                        due_date: payment.due_date(),
                    });
                }
            }
            Some(payment) => next_outstanding_week = Some(payment.week()),
            None if due.iter().all(|p| !p.status().is_unsettled()) => {
                loan.close(now)?;
                tx.update_loan_status(loan_id, LoanStatus::Closed, now)
                    .map_err(BillingError::repository("update_loan_status", loan_id))?;
                loan_closed = true;
                emitted.push(Event::LoanClosed {
                    loan_id,
                    timestamp: now,
                });
            }
            None => {}
        }

        emitted.push(Event::PaymentReceived {
            loan_id,
            amount,
            installments_settled: settlement.settled.len(),
            timestamp: now,
        });
        self.emit_all(emitted);

        let settled_weeks: Vec<u32> = settlement.settled.iter().map(|s| s.week).collect();
        tracing::info!(
            loan_id,
            amount = %amount,
            settled = ?settled_weeks,
            next_outstanding_week = ?next_outstanding_week,
            loan_closed,
            "payment applied"
        );

        Ok(PaymentReceipt {
            reference: Uuid::new_v4(),
            loan_id,
            amount,
            settled_weeks,
            next_outstanding_week,
            loan_closed,
            received_at: now,
        })
    }

    /// delinquency under the configured rule; unknown customers are not delinquent
    pub fn is_delinquent<G: RepositoryGateway>(
        &self,
        tx: &mut G,
        customer_id: CustomerId,
    ) -> Result<bool> {
        Ok(self
            .assess_delinquency(tx, customer_id)?
            .is_some_and(|assessment| assessment.delinquent))
    }

    pub fn assess_delinquency<G: RepositoryGateway>(
        &self,
        tx: &mut G,
        customer_id: CustomerId,
    ) -> Result<Option<DelinquencyAssessment>> {
        let Some(record) = tx
            .get_customer_by_id(customer_id)
            .map_err(BillingError::repository("get_customer_by_id", customer_id))?
        else {
            tracing::debug!(customer_id, "delinquency check for unknown customer");
            return Ok(None);
        };

        let customer = Customer::from_record(&record)?;
        Ok(Some(delinquency::assess(&customer, &self.config.delinquency)))
    }

    /// scheduler entry point
    pub fn reconcile_due<G: RepositoryGateway>(
        &mut self,
        tx: &mut G,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport> {
        self.reconciliation.reconcile_due(tx, now, &mut self.events)
    }

    /// reconcile at the provider's current instant
    pub fn run_daily<G: RepositoryGateway>(
        &mut self,
        tx: &mut G,
        time: &SafeTimeProvider,
    ) -> Result<ReconciliationReport> {
        self.reconciliation.run(tx, time, &mut self.events)
    }

    pub fn next_reconciliation_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.reconciliation.next_run_after(now)
    }

    pub fn loan_view<G: RepositoryGateway>(&self, tx: &mut G, loan_id: LoanId) -> Result<LoanView> {
        Ok(LoanView::from_loan(&self.load_loan(tx, loan_id)?))
    }

    fn load_loan<G: RepositoryGateway>(&self, tx: &mut G, loan_id: LoanId) -> Result<Loan> {
        let record = tx
            .get_loan_by_id(loan_id)
            .map_err(BillingError::repository("get_loan_by_id", loan_id))?
            .ok_or(BillingError::NotFound {
                entity: "loan",
                id: loan_id,
            })?;
        Loan::from_record(&record)
    }

    fn ensure_customer<G: RepositoryGateway>(
        &self,
        tx: &mut G,
        request: &CreateLoanRequest,
        now: DateTime<Utc>,
        emitted: &mut Vec<Event>,
    ) -> Result<CustomerId> {
        if request.customer_id != 0 {
            let existing = tx
                .get_customer_by_id(request.customer_id)
                .map_err(BillingError::repository("get_customer_by_id", request.customer_id))?;
            if let Some(customer) = existing {
                return Ok(customer.id);
            }
        }

        let customer = Customer::new(request.customer_id, &request.name, &request.email);
        let record: CustomerRecord = customer.to_record();
        let customer_id = tx
            .save_customer(&record)
            .map_err(BillingError::repository("save_customer", request.customer_id))?;

        tracing::info!(customer_id, email = %request.email, "customer registered");
        emitted.push(Event::CustomerRegistered {
            customer_id,
            timestamp: now,
        });
        Ok(customer_id)
    }

    fn emit_all(&mut self, events: Vec<Event>) {
        for event in events {
            self.events.emit(event);
        }
    }
}
