use rust_decimal::Decimal;

use crate::decimal::Money;
use crate::entities::Payment;
use crate::errors::Result;
use crate::types::{PaymentId, PaymentStatus};

/// installment marked paid by a settlement
#[derive(Debug, Clone, PartialEq)]
pub struct SettledInstallment {
    pub payment_id: PaymentId,
    pub week: u32,
    pub amount: Money,
}

/// result of walking a received amount over the due installments
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub settled: Vec<SettledInstallment>,
    pub remaining: Money,
}

impl Settlement {
    pub fn last_settled_week(&self) -> Option<u32> {
        self.settled.last().map(|s| s.week)
    }

    pub fn total_applied(&self) -> Money {
        self.settled.iter().map(|s| s.amount).sum()
    }
}

/// oldest-first application: each unpaid installment is paid in full or the walk stops
#[derive(Debug, Clone)]
pub struct FifoWaterfall {
    tolerance: Decimal,
}

impl FifoWaterfall {
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    /// mark installments paid in week order while the amount covers them
    pub fn apply(&self, payments: &mut [Payment], amount: Money) -> Result<Settlement> {
        payments.sort_by_key(|p| p.week());

        let mut remaining = amount;
        let mut settled = Vec::new();

        for payment in payments.iter_mut() {
            if !matches!(
                payment.status(),
                PaymentStatus::Pending | PaymentStatus::Outstanding
            ) {
                continue;
            }
            // the tolerance absorbs rounding drift left by amount validation
            if remaining.as_decimal() + self.tolerance < payment.amount().as_decimal() {
                break;
            }

            payment.transition_to(PaymentStatus::Paid)?;
            remaining = (remaining - payment.amount()).max(Money::ZERO);
            settled.push(SettledInstallment {
                payment_id: payment.id(),
                week: payment.week(),
                amount: payment.amount(),
            });
        }

        Ok(Settlement { settled, remaining })
    }
}
