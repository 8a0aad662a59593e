//! Decimal money arithmetic for cart and order totals.

use rust_decimal::Decimal;

/// Largest quantity a single cart line may accumulate.
pub const MAX_LINE_QUANTITY: i32 = 9_999;

/// Exclusive upper bound of a unit price, `NUMERIC(10,2)`.
pub fn price_ceiling() -> Decimal {
    Decimal::from(100_000_000)
}

/// Largest order total that fits `NUMERIC(12,2)`.
pub fn max_order_total() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Anything that contributes `unit_price * quantity` to a total.
pub trait PricedLine {
    fn unit_price(&self) -> Decimal;
    fn quantity(&self) -> i32;

    fn line_total(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity())
    }
}

/// Sum of all line totals, rounded to the currency's minor unit.
pub fn order_total<L: PricedLine>(lines: &[L]) -> Decimal {
    lines
        .iter()
        .map(PricedLine::line_total)
        .sum::<Decimal>()
        .round_dp(2)
}
