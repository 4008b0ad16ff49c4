//! Bill total computation: subtotal, discount, then the flat shop tax.
//!
//! Pure and deterministic; re-invoked after every item mutation so the
//! persisted sale always matches its item set. No rounding happens here;
//! presentation layers round for display only.

/// Fixed shop tax rate, applied after the discount.
pub const TAX_RATE: f64 = 0.14;

#[derive(Debug, Clone, Copy)]
pub struct LineAmount {
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBreakdown {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub after_discount: f64,
    pub tax_amount: f64,
    pub total: f64,
}

impl PriceBreakdown {
    pub const ZERO: Self = Self {
        subtotal: 0.0,
        discount_amount: 0.0,
        after_discount: 0.0,
        tax_amount: 0.0,
        total: 0.0,
    };
}

/// Compute the breakdown for a set of line items and a discount
/// percentage. The percentage is clamped to [0, 100].
pub fn price_items(items: &[LineAmount], discount_percentage: f64) -> PriceBreakdown {
    let pct = discount_percentage.clamp(0.0, 100.0);

    let subtotal: f64 = items.iter().map(|i| i.price * i.quantity as f64).sum();
    let discount_amount = subtotal * pct / 100.0;
    let after_discount = subtotal - discount_amount;
    let tax_amount = after_discount * TAX_RATE;
    let total = after_discount + tax_amount;

    PriceBreakdown {
        subtotal,
        discount_amount,
        after_discount,
        tax_amount,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: f64, quantity: u32) -> LineAmount {
        LineAmount { price, quantity }
    }

    #[test]
    fn two_item_bill_with_ten_percent_discount() {
        let items = [line(8000.0, 1), line(1500.0, 2)];
        let b = price_items(&items, 10.0);
        assert_eq!(b.subtotal, 11000.0);
        assert_eq!(b.discount_amount, 1100.0);
        assert_eq!(b.after_discount, 9900.0);
        assert!((b.tax_amount - 1386.0).abs() < 1e-9);
        assert!((b.total - 11286.0).abs() < 1e-9);
    }

    #[test]
    fn total_matches_closed_form() {
        let items = [line(750.0, 3), line(12000.0, 1), line(99.99, 7)];
        for d in [0.0, 12.5, 50.0, 100.0] {
            let b = price_items(&items, d);
            let expected = b.subtotal * (1.0 - d / 100.0) * (1.0 + TAX_RATE);
            assert!((b.total - expected).abs() < 1e-9, "discount {d}");
        }
    }

    #[test]
    fn discount_is_clamped() {
        let items = [line(1000.0, 1)];
        assert_eq!(price_items(&items, -20.0).discount_amount, 0.0);
        let b = price_items(&items, 250.0);
        assert_eq!(b.discount_amount, 1000.0);
        assert_eq!(b.total, 0.0);
    }

    #[test]
    fn empty_item_set_yields_zeros() {
        let b = price_items(&[], 35.0);
        assert_eq!(b, PriceBreakdown::ZERO);
        assert!(!b.total.is_nan());
    }

    #[test]
    fn recompute_is_idempotent() {
        let items = [line(8500.0, 1), line(1500.0, 4)];
        let first = price_items(&items, 15.0);
        let second = price_items(&items, 15.0);
        assert_eq!(first, second);
    }

    #[test]
    fn quick_bill_figures() {
        let b = price_items(&[line(500.0, 1)], 0.0);
        assert_eq!(b.subtotal, 500.0);
        assert!((b.tax_amount - 70.0).abs() < 1e-9);
        assert!((b.total - 570.0).abs() < 1e-9);
    }
}
