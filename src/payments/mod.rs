pub mod amortization;
pub mod outstanding;
pub mod waterfall;

use rust_decimal::Decimal;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::types::PaymentStatus;

pub use amortization::{compute_installment, compute_total, AmortizationSchedule};
pub use outstanding::{compute_outstanding, OutstandingBalance};
pub use waterfall::{FifoWaterfall, SettledInstallment, Settlement};

/// legal edges of the payment state machine
///
/// ```text
/// scheduled ──► outstanding ──► paid
///     │              │           ▲
///     └──► pending ◄─┘           │
///             └──────────────────┘
/// ```
pub fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;

    matches!(
        (from, to),
        (Scheduled, Outstanding)
            | (Scheduled, Pending)
            | (Outstanding, Pending)
            | (Outstanding, Paid)
            | (Pending, Paid)
    )
}

/// fails with `IllegalTransition` unless `from -> to` is an edge of the state machine
pub fn ensure_transition(from: PaymentStatus, to: PaymentStatus) -> Result<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(BillingError::IllegalTransition { from, to })
    }
}

/// only exact settlement of the currently-due balance is accepted
pub fn validate_settlement_amount(
    expected: Money,
    provided: Money,
    tolerance: Decimal,
) -> Result<()> {
    if !provided.is_positive() || !expected.approx_eq(provided, tolerance) {
        return Err(BillingError::AmountMismatch { expected, provided });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transition_table() {
        use PaymentStatus::*;

        let legal = [
            (Scheduled, Outstanding),
            (Scheduled, Pending),
            (Outstanding, Pending),
            (Outstanding, Paid),
            (Pending, Paid),
        ];

        for from in PaymentStatus::ALL {
            for to in PaymentStatus::ALL {
                assert_eq!(
                    can_transition(from, to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_legal_edges_only_move_forward() {
        for from in PaymentStatus::ALL {
            for to in PaymentStatus::ALL {
                if can_transition(from, to) {
                    assert!(to.rank() > from.rank(), "{from} -> {to} regresses");
                }
            }
        }
    }

    #[test]
    fn test_paid_is_terminal() {
        for to in PaymentStatus::ALL {
            assert!(ensure_transition(PaymentStatus::Paid, to).is_err());
        }
    }

    #[test]
    fn test_settlement_amount_validation() {
        let due = Money::from_major(110_000);
        let tolerance = dec!(0.00001);

        assert!(validate_settlement_amount(due, due, tolerance).is_ok());
        assert!(validate_settlement_amount(
            due,
            Money::from_str_exact("110000.000005").unwrap(),
            tolerance
        )
        .is_ok());

        let err = validate_settlement_amount(due, Money::from_major(100_000), tolerance)
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::AmountMismatch { expected, provided }
                if expected == due && provided == Money::from_major(100_000)
        ));

        // overpayment is rejected as well
        assert!(validate_settlement_amount(due, Money::from_major(120_000), tolerance).is_err());
        assert!(validate_settlement_amount(Money::ZERO, Money::ZERO, tolerance).is_err());
    }
}
