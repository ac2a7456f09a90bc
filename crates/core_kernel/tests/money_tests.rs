//! Unit tests for the Money module
//!
//! Tests cover minor-unit conversion, balance arithmetic and currency handling.

use core_kernel::{Currency, Money, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::php(dec!(100.123456789));
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_converts_centavos() {
        let m = Money::from_minor(30000, Currency::PHP);
        assert_eq!(m.amount(), dec!(300.00));
    }

    #[test]
    fn test_from_minor_handles_jpy_no_decimals() {
        let m = Money::from_minor(10000, Currency::JPY);
        assert_eq!(m.amount(), dec!(10000));
    }

    #[test]
    fn test_from_minor_decimal_keeps_fraction() {
        let m = Money::from_minor_decimal(dec!(12345.5), Currency::PHP);
        assert_eq!(m.amount(), dec!(123.455));
    }

    #[test]
    fn test_default_currency_is_peso() {
        assert_eq!(Currency::default(), Currency::PHP);
    }
}

mod balances {
    use super::*;

    #[test]
    fn test_is_covered_by_exact_payment() {
        let expected = Money::php(dec!(750));
        assert!(expected.is_covered_by(&Money::php(dec!(750))).unwrap());
        assert!(!expected.is_covered_by(&Money::php(dec!(749.99))).unwrap());
    }

    #[test]
    fn test_remaining_after_partial_payment() {
        let expected = Money::php(dec!(500));
        let remaining = expected.remaining_after(&Money::php(dec!(300))).unwrap();
        assert_eq!(remaining.amount(), dec!(200));
    }

    #[test]
    fn test_sum_of_collections() {
        let items = [Money::php(dec!(750)), Money::php(dec!(250.50)), Money::php(dec!(0))];
        let total = Money::sum(Currency::PHP, &items).unwrap();
        assert_eq!(total.amount(), dec!(1000.50));
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let items = [Money::php(dec!(1)), Money::new(dec!(1), Currency::USD)];
        let result = Money::sum(Currency::PHP, &items);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_is_covered_by_rejects_mixed_currencies() {
        let expected = Money::php(dec!(1));
        let paid = Money::new(dec!(1), Currency::SGD);
        assert!(expected.is_covered_by(&paid).is_err());
    }
}

mod predicates {
    use super::*;

    #[test]
    fn test_zero_is_neither_positive_nor_negative() {
        let m = Money::zero(Currency::PHP);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::php(dec!(10.005)).round_to_currency();
        assert_eq!(m.amount(), dec!(10.00));
    }
}
