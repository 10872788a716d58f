//! domain entities rebuilt from repository records

pub mod customer;
pub mod loan;
pub mod payment;

pub use customer::Customer;
pub use loan::{Loan, LoanTerms};
pub use payment::Payment;
