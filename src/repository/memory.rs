use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::RepositoryError;
use crate::types::{CustomerId, LoanId, LoanStatus, PaymentId, PaymentStatus};

use super::records::{CustomerRecord, LoanRecord, PaymentRecord};
use super::{RepositoryGateway, RepositoryResult, SETTLEABLE_STATUSES, UPCOMING_STATUSES};

/// injected failure: the named operation fails once `after` calls have succeeded
#[cfg(test)]
#[derive(Debug, Clone)]
struct Fault {
    operation: &'static str,
    after: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct IdCounters {
    customer: u64,
    loan: u64,
    payment: u64,
}

#[derive(Debug, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, CustomerRecord>,
    loans: BTreeMap<LoanId, LoanRecord>,
    payments: BTreeMap<PaymentId, PaymentRecord>,
    ids: IdCounters,
    #[cfg(test)]
    fault: Option<Fault>,
}

impl Tables {
    fn next_id(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }

    fn loan_payments(&self, loan_id: LoanId) -> Vec<PaymentRecord> {
        let mut payments: Vec<PaymentRecord> = self
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.week);
        payments
    }

    fn loan_with_payments(&self, loan: &LoanRecord) -> LoanRecord {
        LoanRecord {
            payments: self.loan_payments(loan.id),
            ..loan.clone()
        }
    }
}

/// prior value of a row touched by a transaction, `None` when the row was inserted
#[derive(Debug)]
enum Undo {
    Customer(CustomerId, Option<CustomerRecord>),
    Loan(LoanId, Option<LoanRecord>),
    Payment(PaymentId, Option<PaymentRecord>),
}

fn restore<K: Ord, V>(table: &mut BTreeMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(row) => {
            table.insert(key, row);
        }
        None => {
            table.remove(&key);
        }
    }
}

fn has_status(record: &PaymentRecord, statuses: &[PaymentStatus]) -> bool {
    statuses.iter().any(|s| s.as_str() == record.status)
}

/// in-process repository with serialised, all-or-nothing transactions
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// start a unit of work; blocks while another transaction is open
    pub fn begin(&self) -> RepositoryResult<MemoryTransaction<'_>> {
        let guard = self.tables.lock().map_err(|_| RepositoryError::Unavailable)?;
        Ok(MemoryTransaction {
            ids: guard.ids,
            #[cfg(test)]
            fault: guard.fault.clone(),
            guard,
            undo: Vec::new(),
            committed: false,
        })
    }

    /// make `operation` fail in later transactions after it has succeeded `after` times
    #[cfg(test)]
    pub(crate) fn inject_fault(&self, operation: &'static str, after: usize) -> RepositoryResult<()> {
        let mut tables = self.tables.lock().map_err(|_| RepositoryError::Unavailable)?;
        tables.fault = Some(Fault { operation, after });
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn clear_fault(&self) -> RepositoryResult<()> {
        let mut tables = self.tables.lock().map_err(|_| RepositoryError::Unavailable)?;
        tables.fault = None;
        Ok(())
    }
}

/// transaction handle; writes go straight to the locked tables and are
/// undone on drop unless `commit` was called
pub struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, Tables>,
    undo: Vec<Undo>,
    /// id counters as of `begin`
    ids: IdCounters,
    committed: bool,
    #[cfg(test)]
    fault: Option<Fault>,
}

impl MemoryTransaction<'_> {
    pub fn commit(mut self) {
        self.committed = true;
    }

    #[cfg(test)]
    fn check_fault(&mut self, operation: &'static str) -> RepositoryResult<()> {
        if let Some(fault) = self.fault.as_mut() {
            if fault.operation == operation {
                if fault.after == 0 {
                    return Err(RepositoryError::Backend {
                        message: format!("injected failure in {operation}"),
                    });
                }
                fault.after -= 1;
            }
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_fault(&mut self, _operation: &'static str) -> RepositoryResult<()> {
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let tables = &mut *self.guard;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Customer(id, prior) => restore(&mut tables.customers, id, prior),
                Undo::Loan(id, prior) => restore(&mut tables.loans, id, prior),
                Undo::Payment(id, prior) => restore(&mut tables.payments, id, prior),
            }
        }
        tables.ids = self.ids;
    }
}

impl RepositoryGateway for MemoryTransaction<'_> {
    fn save_customer(&mut self, customer: &CustomerRecord) -> RepositoryResult<CustomerId> {
        self.check_fault("save_customer")?;
        let tables = &mut *self.guard;

        if tables.customers.values().any(|c| c.email == customer.email) {
            return Err(RepositoryError::Conflict {
                message: format!("email {} already registered", customer.email),
            });
        }

        let id = if customer.id == 0 {
            let mut id = Tables::next_id(&mut tables.ids.customer);
            while tables.customers.contains_key(&id) {
                id = Tables::next_id(&mut tables.ids.customer);
            }
            id
        } else if tables.customers.contains_key(&customer.id) {
            return Err(RepositoryError::Conflict {
                message: format!("customer {} already exists", customer.id),
            });
        } else {
            customer.id
        };

        let mut row = customer.without_loans();
        row.id = id;
        let prior = tables.customers.insert(id, row);
        self.undo.push(Undo::Customer(id, prior));
        Ok(id)
    }

    fn get_customer_by_id(&mut self, id: CustomerId) -> RepositoryResult<Option<CustomerRecord>> {
        self.check_fault("get_customer_by_id")?;
        let tables = &*self.guard;

        Ok(tables.customers.get(&id).map(|customer| CustomerRecord {
            loans: tables
                .loans
                .values()
                .filter(|loan| loan.customer_id == id)
                .map(|loan| tables.loan_with_payments(loan))
                .collect(),
            ..customer.clone()
        }))
    }

    fn save_loan(&mut self, loan: &LoanRecord) -> RepositoryResult<LoanId> {
        self.check_fault("save_loan")?;
        let tables = &mut *self.guard;

        if !tables.customers.contains_key(&loan.customer_id) {
            return Err(RepositoryError::Backend {
                message: format!("loan references unknown customer {}", loan.customer_id),
            });
        }

        let id = Tables::next_id(&mut tables.ids.loan);
        let mut row = loan.without_payments();
        row.id = id;
        let prior = tables.loans.insert(id, row);
        self.undo.push(Undo::Loan(id, prior));
        Ok(id)
    }

    fn get_loan_by_id(&mut self, id: LoanId) -> RepositoryResult<Option<LoanRecord>> {
        self.check_fault("get_loan_by_id")?;
        let tables = &*self.guard;
        Ok(tables.loans.get(&id).map(|loan| tables.loan_with_payments(loan)))
    }

    fn update_loan_status(
        &mut self,
        id: LoanId,
        status: LoanStatus,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        self.check_fault("update_loan_status")?;
        let loan = self.guard.loans.get_mut(&id).ok_or_else(|| RepositoryError::Backend {
            message: format!("loan {id} does not exist"),
        })?;
        self.undo.push(Undo::Loan(id, Some(loan.clone())));
        loan.status = status.as_str().to_string();
        loan.updated_at = updated_at;
        Ok(())
    }

    fn save_payments(&mut self, payments: &[PaymentRecord]) -> RepositoryResult<Vec<PaymentId>> {
        self.check_fault("save_payments")?;
        let tables = &mut *self.guard;

        let mut ids = Vec::with_capacity(payments.len());
        for payment in payments {
            if !tables.loans.contains_key(&payment.loan_id) {
                return Err(RepositoryError::Backend {
                    message: format!("payment references unknown loan {}", payment.loan_id),
                });
            }
            let duplicate_week = tables
                .payments
                .values()
                .any(|p| p.loan_id == payment.loan_id && p.week == payment.week);
            if duplicate_week {
                return Err(RepositoryError::Conflict {
                    message: format!("loan {} already has week {}", payment.loan_id, payment.week),
                });
            }

            let id = Tables::next_id(&mut tables.ids.payment);
            let mut row = payment.clone();
            row.id = id;
            let prior = tables.payments.insert(id, row);
            self.undo.push(Undo::Payment(id, prior));
            ids.push(id);
        }

        Ok(ids)
    }

    fn get_next_payment(&mut self, loan_id: LoanId) -> RepositoryResult<Option<PaymentRecord>> {
        self.check_fault("get_next_payment")?;
        Ok(self
            .guard
            .loan_payments(loan_id)
            .into_iter()
            .find(|p| has_status(p, &UPCOMING_STATUSES)))
    }

    fn update_payment_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> RepositoryResult<()> {
        self.check_fault("update_payment_status")?;
        let payment = self.guard.payments.get_mut(&id).ok_or_else(|| RepositoryError::Backend {
            message: format!("payment {id} does not exist"),
        })?;
        self.undo.push(Undo::Payment(id, Some(payment.clone())));
        payment.status = status.as_str().to_string();
        Ok(())
    }

    fn get_payments_due_before_date(
        &mut self,
        date: NaiveDate,
        statuses: &[PaymentStatus],
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        self.check_fault("get_payments_due_before_date")?;
        let mut due: Vec<PaymentRecord> = self
            .guard
            .payments
            .values()
            .filter(|p| p.due_date < date && has_status(p, statuses))
            .cloned()
            .collect();
        due.sort_by_key(|p| (p.loan_id, p.week));
        Ok(due)
    }

    fn get_outstanding_and_pending_payments(
        &mut self,
        loan_id: LoanId,
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        self.check_fault("get_outstanding_and_pending_payments")?;
        Ok(self
            .guard
            .loan_payments(loan_id)
            .into_iter()
            .filter(|p| has_status(p, &SETTLEABLE_STATUSES))
            .collect())
    }
}
