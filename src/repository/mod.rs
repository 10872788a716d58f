//! persistence contract consumed by the billing core
//!
//! A `RepositoryGateway` is implemented by a *transaction handle*: every core
//! operation receives `&mut impl RepositoryGateway` and performs all of its
//! reads and writes through it, so the caller decides where the unit of work
//! begins and whether it commits.

pub mod memory;
pub mod records;

use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::RepositoryError;
use crate::types::{CustomerId, LoanId, LoanStatus, PaymentId, PaymentStatus};

pub use memory::{MemoryStore, MemoryTransaction};
pub use records::{CustomerRecord, LoanRecord, PaymentRecord};

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// statuses fetched by `get_outstanding_and_pending_payments`
pub const SETTLEABLE_STATUSES: [PaymentStatus; 2] =
    [PaymentStatus::Pending, PaymentStatus::Outstanding];

/// statuses considered by `get_next_payment`
pub const UPCOMING_STATUSES: [PaymentStatus; 2] =
    [PaymentStatus::Scheduled, PaymentStatus::Outstanding];

pub trait RepositoryGateway {
    /// insert a customer; returns the stored id
    fn save_customer(&mut self, customer: &CustomerRecord) -> RepositoryResult<CustomerId>;

    /// customer with loans and their payments preloaded, `None` when absent
    fn get_customer_by_id(&mut self, id: CustomerId) -> RepositoryResult<Option<CustomerRecord>>;

    /// insert a loan row (payments are saved separately); returns the assigned id
    fn save_loan(&mut self, loan: &LoanRecord) -> RepositoryResult<LoanId>;

    /// loan with all of its payments, ordered by week
    fn get_loan_by_id(&mut self, id: LoanId) -> RepositoryResult<Option<LoanRecord>>;

    fn update_loan_status(
        &mut self,
        id: LoanId,
        status: LoanStatus,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// bulk insert at issuance; returns ids in input order
    fn save_payments(&mut self, payments: &[PaymentRecord]) -> RepositoryResult<Vec<PaymentId>>;

    /// earliest week with status scheduled or outstanding
    fn get_next_payment(&mut self, loan_id: LoanId) -> RepositoryResult<Option<PaymentRecord>>;

    fn update_payment_status(&mut self, id: PaymentId, status: PaymentStatus)
        -> RepositoryResult<()>;

    /// payments of every loan with a status in `statuses` and due strictly before `date`
    fn get_payments_due_before_date(
        &mut self,
        date: NaiveDate,
        statuses: &[PaymentStatus],
    ) -> RepositoryResult<Vec<PaymentRecord>>;

    /// pending and outstanding payments of a loan, ordered by week ascending
    fn get_outstanding_and_pending_payments(
        &mut self,
        loan_id: LoanId,
    ) -> RepositoryResult<Vec<PaymentRecord>>;
}
