use crate::errors::Result;
use crate::repository::CustomerRecord;
use crate::types::CustomerId;

use super::Loan;

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    id: CustomerId,
    name: String,
    email: String,
    loans: Vec<Loan>,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            loans: Vec::new(),
        }
    }

    /// customer with every preloaded loan rebuilt and checked
    pub fn from_record(record: &CustomerRecord) -> Result<Self> {
        let loans = record
            .loans
            .iter()
            .map(Loan::from_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: record.id,
            name: record.name.clone(),
            email: record.email.clone(),
            loans,
        })
    }

    /// customer row only; loans are stored on their own
    pub fn to_record(&self) -> CustomerRecord {
        CustomerRecord {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            loans: Vec::new(),
        }
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BillingError;

    #[test]
    fn test_from_record_without_loans() {
        let record = CustomerRecord {
            id: 7,
            name: "Ayu".to_string(),
            email: "ayu@example.com".to_string(),
            loans: Vec::new(),
        };

        let customer = Customer::from_record(&record).unwrap();
        assert_eq!(customer.id(), 7);
        assert_eq!(customer.email(), "ayu@example.com");
        assert!(customer.loans().is_empty());
        assert_eq!(customer.to_record(), record);
    }

    #[test]
    fn test_corrupt_loan_fails_the_customer() {
        let record: CustomerRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Budi",
            "email": "budi@example.com",
            "loans": [{
                "id": 1,
                "customer_id": 1,
                "amount": "1000",
                "total_amount": "1100",
                "rates": "10",
                "term_weeks": 2,
                "status": "defaulted",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }]
        }))
        .unwrap();

        assert!(matches!(
            Customer::from_record(&record),
            Err(BillingError::InvalidStatus { .. })
        ));
    }
}
