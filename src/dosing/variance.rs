use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Difference between a recorded dose and the dose that was due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variance {
    pub amount: Option<Decimal>,
    /// Relative to the expected dose, 2 dp. Absent when nothing was due.
    pub percentage: Option<Decimal>,
    pub has_variance: bool,
}

impl Variance {
    pub fn none() -> Self {
        Self {
            amount: None,
            percentage: None,
            has_variance: false,
        }
    }
}

/// Compare `actual` against `expected`.
///
/// `expected = None` means no expected dose could be determined and yields no
/// variance at all. `Some(0)` means nothing was due: the full dosage is the
/// variance, with no percentage.
pub fn compute_variance(expected: Option<Decimal>, actual: Decimal, tolerance: Decimal) -> Variance {
    let Some(expected) = expected else {
        return Variance::none();
    };

    let amount = actual - expected;
    let percentage = (!expected.is_zero()).then(|| {
        (amount / expected * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    });

    Variance {
        amount: Some(amount),
        percentage,
        has_variance: amount.abs() > tolerance,
    }
}
