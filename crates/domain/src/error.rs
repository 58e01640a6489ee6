use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while validating a pair configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The pair has no name.
    #[error("pair name must not be empty")]
    EmptyName,
    /// The pair has no pool address.
    #[error("pair {pair}: pool address must not be empty")]
    EmptyPoolAddress {
        /// Pair name.
        pair: String,
    },
    /// A reserve is negative.
    #[error("pair {pair}: {field} must not be negative (got {value})")]
    NegativeReserve {
        /// Pair name.
        pair: String,
        /// Offending field.
        field: &'static str,
        /// Configured value.
        value: Decimal,
    },
    /// The position size ceiling is zero or negative.
    #[error("pair {pair}: max_position_size_in_y must be positive (got {value})")]
    NonPositivePositionSize {
        /// Pair name.
        pair: String,
        /// Configured value.
        value: Decimal,
    },
    /// The range interval cannot be placed inside a single position.
    #[error("pair {pair}: total_range_interval must be between {min} and {max} bins (got {value})")]
    RangeOutOfBounds {
        /// Pair name.
        pair: String,
        /// Configured value.
        value: u32,
        /// Smallest accepted value.
        min: u32,
        /// Largest accepted value.
        max: u32,
    },
    /// The bin step is zero.
    #[error("pair {pair}: bin_step must be positive")]
    ZeroBinStep {
        /// Pair name.
        pair: String,
    },
}

/// Errors raised while converting token amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The token has more decimals than a `Decimal` can scale by.
    #[error("tokens with {decimals} decimals are not supported")]
    UnsupportedDecimals {
        /// Reported decimals.
        decimals: u8,
    },
}
