//! Per-pair configuration as read from the pairs file.

use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Smallest range interval that still leaves one bin on each side of the active bin.
pub const MIN_RANGE_INTERVAL: u32 = 2;

/// Largest range interval that fits inside a freshly created empty position.
pub const MAX_RANGE_INTERVAL: u32 = 68;

/// Liquidity distribution shape across the bins of a range.
///
/// The position manager never interprets the shape; it is forwarded to the
/// pool when liquidity is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    /// Uniform distribution.
    #[default]
    Spot,
    /// Concentrated around the active bin.
    Curve,
    /// Concentrated at the edges of the range.
    BidAsk,
    /// Uniform, accepting unequal token amounts.
    SpotImBalanced,
    /// Curve, accepting unequal token amounts.
    CurveImBalanced,
    /// Bid-ask, accepting unequal token amounts.
    BidAskImBalanced,
}

/// Configuration of a managed trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConfig {
    /// Pair label, e.g. `SOL-USDC`.
    pub name: String,
    /// Pool (LB pair) address.
    pub pool_address: String,
    /// Token X amount that always stays in the wallet.
    pub min_reserve_x: Decimal,
    /// Token Y amount that always stays in the wallet.
    pub min_reserve_y: Decimal,
    /// Bin step of the pool in basis points.
    pub bin_step: u16,
    /// Ceiling on committed value, denominated in token Y.
    pub max_position_size_in_y: Decimal,
    /// Width, in bins, of newly placed liquidity.
    pub total_range_interval: u32,
    /// Liquidity shape forwarded to the pool.
    #[serde(default)]
    pub strategy_type: StrategyType,
    /// Whether one-sided positions are turned two-sided once the market flips them.
    #[serde(default)]
    pub balance_out_position: bool,
}

impl PairConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.pool_address.trim().is_empty() {
            return Err(ConfigError::EmptyPoolAddress {
                pair: self.name.clone(),
            });
        }
        for (field, value) in [
            ("min_reserve_x", self.min_reserve_x),
            ("min_reserve_y", self.min_reserve_y),
        ] {
            if value < Decimal::ZERO {
                return Err(ConfigError::NegativeReserve {
                    pair: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        if self.max_position_size_in_y <= Decimal::ZERO {
            return Err(ConfigError::NonPositivePositionSize {
                pair: self.name.clone(),
                value: self.max_position_size_in_y,
            });
        }
        if !(MIN_RANGE_INTERVAL..=MAX_RANGE_INTERVAL).contains(&self.total_range_interval) {
            return Err(ConfigError::RangeOutOfBounds {
                pair: self.name.clone(),
                value: self.total_range_interval,
                min: MIN_RANGE_INTERVAL,
                max: MAX_RANGE_INTERVAL,
            });
        }
        if self.bin_step == 0 {
            return Err(ConfigError::ZeroBinStep {
                pair: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Number of bins placed on each side of the active bin.
    pub fn half_range(&self) -> i32 {
        (self.total_range_interval / 2) as i32
    }

    /// Value, in token Y, one bin receives when the cap is spread over the full range.
    pub fn per_bin_cap(&self) -> Decimal {
        self.max_position_size_in_y / Decimal::from(self.total_range_interval.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sol_usdc() -> PairConfig {
        PairConfig {
            name: "SOL-USDC".to_string(),
            pool_address: "BVRbyLjjfSBcoyiYFuxbgKYnWuiFaF9CSXEa5vdSZ9Hh".to_string(),
            min_reserve_x: dec!(2),
            min_reserve_y: dec!(200),
            bin_step: 10,
            max_position_size_in_y: dec!(10),
            total_range_interval: 6,
            strategy_type: StrategyType::BidAskImBalanced,
            balance_out_position: true,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(sol_usdc().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_cap() {
        let config = PairConfig {
            max_position_size_in_y: Decimal::ZERO,
            ..sol_usdc()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositivePositionSize { .. })
        ));
    }

    #[test]
    fn test_rejects_range_out_of_bounds() {
        for interval in [0, 1, 69, 200] {
            let config = PairConfig {
                total_range_interval: interval,
                ..sol_usdc()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::RangeOutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_negative_reserve() {
        let config = PairConfig {
            min_reserve_y: dec!(-1),
            ..sol_usdc()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NegativeReserve {
                pair: "SOL-USDC".to_string(),
                field: "min_reserve_y",
                value: dec!(-1),
            })
        );
    }

    #[test]
    fn test_rejects_empty_pool() {
        let config = PairConfig {
            pool_address: " ".to_string(),
            ..sol_usdc()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyPoolAddress { .. })
        ));
    }

    #[test]
    fn test_half_range_and_per_bin_cap() {
        let config = PairConfig {
            max_position_size_in_y: dec!(12),
            ..sol_usdc()
        };
        assert_eq!(config.half_range(), 3);
        assert_eq!(config.per_bin_cap(), dec!(2));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "name": "JUP-USDC",
            "pool_address": "pool",
            "min_reserve_x": 5,
            "min_reserve_y": "12.5",
            "bin_step": 20,
            "max_position_size_in_y": 100,
            "total_range_interval": 10
        }"#;
        let config: PairConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.strategy_type, StrategyType::Spot);
        assert!(!config.balance_out_position);
        assert_eq!(config.min_reserve_y, dec!(12.5));
        assert!(config.validate().is_ok());
    }
}
