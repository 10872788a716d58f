pub mod config;
pub mod decimal;
pub mod delinquency;
pub mod engine;
pub mod entities;
pub mod errors;
pub mod events;
pub mod payments;
pub mod reconciliation;
pub mod repository;
pub mod types;
pub mod views;

// re-export key types
pub use config::{DelinquencyScope, EngineConfig};
pub use decimal::{Money, Rate};
pub use engine::{BillingEngine, CreateLoanRequest};
pub use entities::{Customer, Loan, LoanTerms, Payment};
pub use errors::{BillingError, RepositoryError, Result};
pub use events::{Event, EventStore};
pub use payments::{
    compute_installment, compute_outstanding, compute_total, AmortizationSchedule, FifoWaterfall,
    OutstandingBalance,
};
pub use reconciliation::{ReconciliationJob, ReconciliationReport};
pub use repository::{MemoryStore, MemoryTransaction, RepositoryGateway};
pub use types::{CustomerId, LoanId, LoanStatus, PaymentId, PaymentStatus};
pub use views::{LoanIssuance, LoanView, OutstandingSummary, PaymentReceipt};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
