//! Contribution percentage allocation.

use rust_decimal::Decimal;

use crate::constants::PERCENT_PRECISION;

/// Splits 100% across `contributions` in proportion to their size, at two
/// decimal places, using the largest-remainder method so the result always
/// sums to exactly 100 when any contribution is positive.
///
/// Ties on the remainder go to the earlier entry. All-zero input yields zeros.
pub fn allocate_percentages(contributions: &[Decimal]) -> Vec<Decimal> {
    let total: Decimal = contributions
        .iter()
        .filter(|c| **c > Decimal::ZERO)
        .copied()
        .sum();
    if total <= Decimal::ZERO {
        return vec![Decimal::ZERO; contributions.len()];
    }

    let scale = Decimal::from(10u32.pow(PERCENT_PRECISION));
    let units_total = Decimal::ONE_HUNDRED * scale;

    let mut floors = Vec::with_capacity(contributions.len());
    let mut remainders = Vec::with_capacity(contributions.len());
    for contribution in contributions {
        let exact = if *contribution > Decimal::ZERO {
            // Ratio first: contribution * units_total can exceed the Decimal range.
            *contribution / total * units_total
        } else {
            Decimal::ZERO
        };
        let floor = exact.floor();
        floors.push(floor);
        remainders.push(exact - floor);
    }

    let assigned: Decimal = floors.iter().copied().sum();
    let mut leftover = units_total - assigned;
    let mut order: Vec<usize> = (0..contributions.len())
        .filter(|i| contributions[*i] > Decimal::ZERO)
        .collect();
    order.sort_by(|a, b| remainders[*b].cmp(&remainders[*a]).then(a.cmp(b)));
    for index in order {
        if leftover <= Decimal::ZERO {
            break;
        }
        floors[index] += Decimal::ONE;
        leftover -= Decimal::ONE;
    }

    floors
        .into_iter()
        .map(|units| (units / scale).round_dp(PERCENT_PRECISION).normalize())
        .collect()
}
