use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyType {
    MaximizeConversions,
    MaximizeConversionValue,
    TargetSpend,
    ManualCpc,
    TargetImpressionShare,
    ManualCpm,
    ManualCpv,
    PercentCpc,
    Commission,
    TargetCpa,
    TargetRoas,
}

impl StrategyType {
    pub const ALL: [StrategyType; 11] = [
        StrategyType::MaximizeConversions,
        StrategyType::MaximizeConversionValue,
        StrategyType::TargetSpend,
        StrategyType::ManualCpc,
        StrategyType::TargetImpressionShare,
        StrategyType::ManualCpm,
        StrategyType::ManualCpv,
        StrategyType::PercentCpc,
        StrategyType::Commission,
        StrategyType::TargetCpa,
        StrategyType::TargetRoas,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaximizeConversions => "MAXIMIZE_CONVERSIONS",
            Self::MaximizeConversionValue => "MAXIMIZE_CONVERSION_VALUE",
            Self::TargetSpend => "TARGET_SPEND",
            Self::ManualCpc => "MANUAL_CPC",
            Self::TargetImpressionShare => "TARGET_IMPRESSION_SHARE",
            Self::ManualCpm => "MANUAL_CPM",
            Self::ManualCpv => "MANUAL_CPV",
            Self::PercentCpc => "PERCENT_CPC",
            Self::Commission => "COMMISSION",
            Self::TargetCpa => "TARGET_CPA",
            Self::TargetRoas => "TARGET_ROAS",
        }
    }

    /// Name of the union member on the campaign / bidding strategy resource.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::MaximizeConversions => "maximize_conversions",
            Self::MaximizeConversionValue => "maximize_conversion_value",
            Self::TargetSpend => "target_spend",
            Self::ManualCpc => "manual_cpc",
            Self::TargetImpressionShare => "target_impression_share",
            Self::ManualCpm => "manual_cpm",
            Self::ManualCpv => "manual_cpv",
            Self::PercentCpc => "percent_cpc",
            Self::Commission => "commission",
            Self::TargetCpa => "target_cpa",
            Self::TargetRoas => "target_roas",
        }
    }

    pub fn is_portfolio_only(self) -> bool {
        matches!(self, Self::TargetCpa | Self::TargetRoas)
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownStrategy(value.trim().to_owned()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpressionShareLocation {
    AnywhereOnPage,
    TopOfPage,
    AbsoluteTopOfPage,
}

impl ImpressionShareLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnywhereOnPage => "ANYWHERE_ON_PAGE",
            Self::TopOfPage => "TOP_OF_PAGE",
            Self::AbsoluteTopOfPage => "ABSOLUTE_TOP_OF_PAGE",
        }
    }
}

impl FromStr for ImpressionShareLocation {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ANYWHERE_ON_PAGE" => Ok(Self::AnywhereOnPage),
            "TOP_OF_PAGE" => Ok(Self::TopOfPage),
            "ABSOLUTE_TOP_OF_PAGE" => Ok(Self::AbsoluteTopOfPage),
            _ => Err(ValidationError::InvalidImpressionShareLocation(value.to_owned())),
        }
    }
}

/// Loosely-typed strategy parameters as they arrive from a tool call.
///
/// Unrecognized keys are carried but never read. Typed accessors return
/// `Ok(None)` for absent or `null` keys and a [`ValidationError`] naming the
/// key when the value has the wrong shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyDetails(Map<String, Value>);

impl StrategyDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn integer(
        &self,
        strategy: StrategyType,
        key: &'static str,
    ) -> Result<Option<i64>, ValidationError> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };
        let invalid = || ValidationError::InvalidDetail { strategy, key, expected: "an integer" };

        match value {
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    return Ok(Some(int));
                }
                match number.as_f64() {
                    Some(float)
                        if float.fract() == 0.0
                            && float >= i64::MIN as f64
                            && float <= i64::MAX as f64 =>
                    {
                        Ok(Some(float as i64))
                    }
                    _ => Err(invalid()),
                }
            }
            Value::String(text) => text.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    pub fn float(
        &self,
        strategy: StrategyType,
        key: &'static str,
    ) -> Result<Option<f64>, ValidationError> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };
        let invalid = || ValidationError::InvalidDetail { strategy, key, expected: "a number" };

        let parsed = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(float) if float.is_finite() => Ok(Some(float)),
            _ => Err(invalid()),
        }
    }

    pub fn boolean(
        &self,
        strategy: StrategyType,
        key: &'static str,
    ) -> Result<Option<bool>, ValidationError> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };

        match value {
            Value::Bool(flag) => Ok(Some(*flag)),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(ValidationError::InvalidDetail { strategy, key, expected: "a boolean" }),
            },
            _ => Err(ValidationError::InvalidDetail { strategy, key, expected: "a boolean" }),
        }
    }

    pub fn text(
        &self,
        strategy: StrategyType,
        key: &'static str,
    ) -> Result<Option<&str>, ValidationError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.as_str())),
            Some(_) => Err(ValidationError::InvalidDetail { strategy, key, expected: "a string" }),
        }
    }
}

impl From<Map<String, Value>> for StrategyDetails {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The single active member of a bidding-strategy union, carrying only the
/// sub-fields that member owns.
#[derive(Clone, Debug, PartialEq)]
pub enum StrategyMutation {
    MaximizeConversions { target_cpa_micros: Option<i64> },
    MaximizeConversionValue { target_roas: Option<f64> },
    TargetSpend { cpc_bid_ceiling_micros: Option<i64> },
    ManualCpc { enhanced_cpc_enabled: Option<bool> },
    TargetImpressionShare {
        location: ImpressionShareLocation,
        location_fraction_micros: i64,
        cpc_bid_ceiling_micros: Option<i64>,
    },
    ManualCpm,
    ManualCpv,
    PercentCpc { cpc_bid_ceiling_micros: Option<i64>, enhanced_cpc_enabled: Option<bool> },
    Commission { commission_rate_micros: Option<i64> },
    TargetCpa { target_cpa_micros: i64 },
    TargetRoas { target_roas: f64 },
}

impl StrategyMutation {
    pub fn strategy_type(&self) -> StrategyType {
        match self {
            Self::MaximizeConversions { .. } => StrategyType::MaximizeConversions,
            Self::MaximizeConversionValue { .. } => StrategyType::MaximizeConversionValue,
            Self::TargetSpend { .. } => StrategyType::TargetSpend,
            Self::ManualCpc { .. } => StrategyType::ManualCpc,
            Self::TargetImpressionShare { .. } => StrategyType::TargetImpressionShare,
            Self::ManualCpm => StrategyType::ManualCpm,
            Self::ManualCpv => StrategyType::ManualCpv,
            Self::PercentCpc { .. } => StrategyType::PercentCpc,
            Self::Commission { .. } => StrategyType::Commission,
            Self::TargetCpa { .. } => StrategyType::TargetCpa,
            Self::TargetRoas { .. } => StrategyType::TargetRoas,
        }
    }

    /// Names of the sub-fields that carry a value, in declaration order.
    pub fn set_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let mut mark = |present: bool, name: &'static str| {
            if present {
                fields.push(name);
            }
        };

        match self {
            Self::MaximizeConversions { target_cpa_micros } => {
                mark(target_cpa_micros.is_some(), "target_cpa_micros")
            }
            Self::MaximizeConversionValue { target_roas } => {
                mark(target_roas.is_some(), "target_roas")
            }
            Self::TargetSpend { cpc_bid_ceiling_micros } => {
                mark(cpc_bid_ceiling_micros.is_some(), "cpc_bid_ceiling_micros")
            }
            Self::ManualCpc { enhanced_cpc_enabled } => {
                mark(enhanced_cpc_enabled.is_some(), "enhanced_cpc_enabled")
            }
            Self::TargetImpressionShare { cpc_bid_ceiling_micros, .. } => {
                mark(true, "location");
                mark(true, "location_fraction_micros");
                mark(cpc_bid_ceiling_micros.is_some(), "cpc_bid_ceiling_micros");
            }
            Self::ManualCpm | Self::ManualCpv => {}
            Self::PercentCpc { cpc_bid_ceiling_micros, enhanced_cpc_enabled } => {
                mark(cpc_bid_ceiling_micros.is_some(), "cpc_bid_ceiling_micros");
                mark(enhanced_cpc_enabled.is_some(), "enhanced_cpc_enabled");
            }
            Self::Commission { commission_rate_micros } => {
                mark(commission_rate_micros.is_some(), "commission_rate_micros")
            }
            Self::TargetCpa { .. } => mark(true, "target_cpa_micros"),
            Self::TargetRoas { .. } => mark(true, "target_roas"),
        }

        fields
    }

    /// Field-mask paths covering exactly what this mutation sets. A member
    /// activated without sub-fields is declared by its bare name.
    pub fn field_paths(&self) -> Vec<String> {
        let member = self.strategy_type().field_name();
        let fields = self.set_fields();
        if fields.is_empty() {
            return vec![member.to_owned()];
        }
        fields.into_iter().map(|field| format!("{member}.{field}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ImpressionShareLocation, StrategyDetails, StrategyMutation, StrategyType};
    use crate::errors::ValidationError;

    #[test]
    fn strategy_type_parses_case_insensitively() {
        assert_eq!("target_spend".parse::<StrategyType>(), Ok(StrategyType::TargetSpend));
        assert_eq!(
            " Maximize_Conversion_Value ".parse::<StrategyType>(),
            Ok(StrategyType::MaximizeConversionValue)
        );
        assert_eq!(
            "TARGET_CPM".parse::<StrategyType>(),
            Err(ValidationError::UnknownStrategy("TARGET_CPM".to_owned()))
        );
    }

    #[test]
    fn every_strategy_round_trips_through_its_name() {
        for strategy in StrategyType::ALL {
            assert_eq!(strategy.as_str().parse::<StrategyType>(), Ok(strategy));
            assert_eq!(strategy.field_name(), strategy.as_str().to_ascii_lowercase());
        }
    }

    #[test]
    fn location_rejects_unknown_values() {
        assert_eq!("top_of_page".parse(), Ok(ImpressionShareLocation::TopOfPage));
        assert!(matches!(
            "INVALID".parse::<ImpressionShareLocation>(),
            Err(ValidationError::InvalidImpressionShareLocation(ref raw)) if raw == "INVALID"
        ));
    }

    #[test]
    fn integer_accessor_accepts_integral_numbers_and_numeric_strings() {
        let details = StrategyDetails::new()
            .with("a", 5_000_000)
            .with("b", 300000.0)
            .with("c", "250000")
            .with("d", 1.5)
            .with("e", serde_json::Value::Null);

        let strategy = StrategyType::TargetSpend;
        assert_eq!(details.integer(strategy, "a"), Ok(Some(5_000_000)));
        assert_eq!(details.integer(strategy, "b"), Ok(Some(300_000)));
        assert_eq!(details.integer(strategy, "c"), Ok(Some(250_000)));
        assert!(details.integer(strategy, "d").is_err());
        assert_eq!(details.integer(strategy, "e"), Ok(None));
        assert_eq!(details.integer(strategy, "missing"), Ok(None));
    }

    #[test]
    fn details_deserialize_from_json_object() {
        let details: StrategyDetails =
            serde_json::from_value(json!({"target_roas": 3.5, "ignored": "x"}))
                .expect("details should deserialize");

        assert_eq!(details.float(StrategyType::TargetRoas, "target_roas"), Ok(Some(3.5)));
        assert_eq!(details.as_map().len(), 2);
    }

    #[test]
    fn field_paths_only_cover_set_fields() {
        let mutation = StrategyMutation::PercentCpc {
            cpc_bid_ceiling_micros: None,
            enhanced_cpc_enabled: Some(true),
        };
        assert_eq!(mutation.field_paths(), vec!["percent_cpc.enhanced_cpc_enabled".to_owned()]);

        assert_eq!(StrategyMutation::ManualCpv.field_paths(), vec!["manual_cpv".to_owned()]);
        assert_eq!(
            StrategyMutation::MaximizeConversions { target_cpa_micros: None }.field_paths(),
            vec!["maximize_conversions".to_owned()]
        );
    }
}
