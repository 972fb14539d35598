use crate::domain::campaign::is_portfolio_reference;
use crate::domain::mutation::{BiddingTarget, FieldMask, PORTFOLIO_LINK_PATH};
use crate::domain::strategy::{
    ImpressionShareLocation, StrategyDetails, StrategyMutation, StrategyType,
};
use crate::errors::ValidationError;

pub type StrategyBuilder = fn(&StrategyDetails) -> Result<StrategyMutation, ValidationError>;

pub fn builder_for(strategy: StrategyType) -> StrategyBuilder {
    match strategy {
        StrategyType::MaximizeConversions => maximize_conversions,
        StrategyType::MaximizeConversionValue => maximize_conversion_value,
        StrategyType::TargetSpend => target_spend,
        StrategyType::ManualCpc => manual_cpc,
        StrategyType::TargetImpressionShare => target_impression_share,
        StrategyType::ManualCpm => manual_cpm,
        StrategyType::ManualCpv => manual_cpv,
        StrategyType::PercentCpc => percent_cpc,
        StrategyType::Commission => commission,
        StrategyType::TargetCpa => target_cpa,
        StrategyType::TargetRoas => target_roas,
    }
}

pub fn build_strategy(
    strategy: StrategyType,
    details: &StrategyDetails,
) -> Result<StrategyMutation, ValidationError> {
    builder_for(strategy)(details)
}

/// Applies `strategy` to `target` and records the touched paths in `mask`.
///
/// `strategy` is either a strategy type name or a portfolio strategy
/// resource name. On error neither `target` nor `mask` is modified.
pub fn try_apply_strategy<T>(
    target: &mut T,
    strategy: &str,
    mask: &mut FieldMask,
    details: Option<&StrategyDetails>,
) -> Result<(), ValidationError>
where
    T: BiddingTarget + ?Sized,
{
    if is_portfolio_reference(strategy) {
        target.link_portfolio(strategy)?;
        mask.push(PORTFOLIO_LINK_PATH);
        return Ok(());
    }

    let strategy_type = strategy.parse::<StrategyType>()?;
    let empty = StrategyDetails::default();
    let mutation = build_strategy(strategy_type, details.unwrap_or(&empty))?;

    mask.extend(mutation.field_paths());
    target.set_strategy(mutation);
    Ok(())
}

pub fn apply_strategy<T>(
    target: &mut T,
    strategy: &str,
    mask: &mut FieldMask,
    details: Option<&StrategyDetails>,
) -> bool
where
    T: BiddingTarget + ?Sized,
{
    match try_apply_strategy(target, strategy, mask, details) {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(
                event_name = "bidding.strategy.rejected",
                strategy,
                error = %error,
                "failed to apply bidding strategy"
            );
            false
        }
    }
}

fn required<V>(
    value: Option<V>,
    strategy: StrategyType,
    key: &'static str,
) -> Result<V, ValidationError> {
    value.ok_or(ValidationError::MissingDetail { strategy, key })
}

fn maximize_conversions(details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::MaximizeConversions;
    Ok(StrategyMutation::MaximizeConversions {
        target_cpa_micros: details.integer(strategy, "target_cpa_micros")?,
    })
}

fn maximize_conversion_value(
    details: &StrategyDetails,
) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::MaximizeConversionValue;
    Ok(StrategyMutation::MaximizeConversionValue {
        target_roas: details.float(strategy, "target_roas")?,
    })
}

fn target_spend(details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::TargetSpend;
    Ok(StrategyMutation::TargetSpend {
        cpc_bid_ceiling_micros: details.integer(strategy, "cpc_bid_ceiling_micros")?,
    })
}

fn manual_cpc(details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::ManualCpc;
    Ok(StrategyMutation::ManualCpc {
        enhanced_cpc_enabled: details.boolean(strategy, "enhanced_cpc_enabled")?,
    })
}

fn target_impression_share(
    details: &StrategyDetails,
) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::TargetImpressionShare;
    let location = required(details.text(strategy, "location")?, strategy, "location")?
        .parse::<ImpressionShareLocation>()?;
    let location_fraction_micros = required(
        details.integer(strategy, "location_fraction_micros")?,
        strategy,
        "location_fraction_micros",
    )?;

    Ok(StrategyMutation::TargetImpressionShare {
        location,
        location_fraction_micros,
        cpc_bid_ceiling_micros: details.integer(strategy, "cpc_bid_ceiling_micros")?,
    })
}

fn manual_cpm(_details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    Ok(StrategyMutation::ManualCpm)
}

fn manual_cpv(_details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    Ok(StrategyMutation::ManualCpv)
}

fn percent_cpc(details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::PercentCpc;
    Ok(StrategyMutation::PercentCpc {
        cpc_bid_ceiling_micros: details.integer(strategy, "cpc_bid_ceiling_micros")?,
        enhanced_cpc_enabled: details.boolean(strategy, "enhanced_cpc_enabled")?,
    })
}

fn commission(details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::Commission;
    Ok(StrategyMutation::Commission {
        commission_rate_micros: details.integer(strategy, "commission_rate_micros")?,
    })
}

fn target_cpa(details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::TargetCpa;
    Ok(StrategyMutation::TargetCpa {
        target_cpa_micros: required(
            details.integer(strategy, "target_cpa_micros")?,
            strategy,
            "target_cpa_micros",
        )?,
    })
}

fn target_roas(details: &StrategyDetails) -> Result<StrategyMutation, ValidationError> {
    let strategy = StrategyType::TargetRoas;
    Ok(StrategyMutation::TargetRoas {
        target_roas: required(details.float(strategy, "target_roas")?, strategy, "target_roas")?,
    })
}
