use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{CustomerId, LoanId, PaymentId};

/// all events that can be emitted by the billing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // customer events
    CustomerRegistered {
        customer_id: CustomerId,
        timestamp: DateTime<Utc>,
    },

    // lifecycle events
    LoanIssued {
        loan_id: LoanId,
        customer_id: CustomerId,
        principal: Money,
        total_amount: Money,
        installment: Money,
        term_weeks: u32,
        timestamp: DateTime<Utc>,
    },
    LoanClosed {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentDue {
        loan_id: LoanId,
        payment_id: PaymentId,
        week: u32,
        amount: Money,
        due_date: NaiveDate,
    },
    PaymentMissed {
        loan_id: LoanId,
        payment_id: PaymentId,
        week: u32,
        amount: Money,
        due_date: NaiveDate,
    },
    InstallmentPaid {
        loan_id: LoanId,
        payment_id: PaymentId,
        week: u32,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentReceived {
        loan_id: LoanId,
        amount: Money,
        installments_settled: usize,
        timestamp: DateTime<Utc>,
    },

    // scheduler events
    ReconciliationCompleted {
        today: NaiveDate,
        examined: usize,
        updated: usize,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
