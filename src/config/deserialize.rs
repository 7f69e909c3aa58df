// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Rejects wait plans with an empty strategy list.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::StrategyConfig;

pub fn deserialize_strategies<'de, D>(deserializer: D) -> Result<NonEmpty<StrategyConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<StrategyConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one strategy is required"))
}
