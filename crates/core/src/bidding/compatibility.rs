use crate::domain::channel::ChannelType;
use crate::domain::strategy::StrategyType;

pub fn allowed_strategies(channel: ChannelType) -> &'static [StrategyType] {
    match channel {
        ChannelType::PerformanceMax => {
            &[StrategyType::MaximizeConversions, StrategyType::MaximizeConversionValue]
        }
        ChannelType::Search => &[
            StrategyType::ManualCpc,
            StrategyType::TargetSpend,
            StrategyType::MaximizeConversions,
            StrategyType::MaximizeConversionValue,
            StrategyType::TargetImpressionShare,
        ],
        ChannelType::Display => &[
            StrategyType::ManualCpc,
            StrategyType::ManualCpm,
            StrategyType::MaximizeConversions,
            StrategyType::MaximizeConversionValue,
        ],
        ChannelType::Video => &[StrategyType::ManualCpv, StrategyType::MaximizeConversions],
        ChannelType::Hotel => {
            &[StrategyType::ManualCpc, StrategyType::PercentCpc, StrategyType::Commission]
        }
    }
}

/// Explicit prohibitions. Kept consistent with [`allowed_strategies`]: no
/// strategy is ever both allowed and prohibited for a channel.
pub fn prohibited_strategies(channel: ChannelType) -> &'static [StrategyType] {
    match channel {
        ChannelType::PerformanceMax => &[
            StrategyType::ManualCpc,
            StrategyType::TargetImpressionShare,
            StrategyType::TargetSpend,
            StrategyType::ManualCpm,
            StrategyType::ManualCpv,
            StrategyType::PercentCpc,
            StrategyType::Commission,
        ],
        ChannelType::Search => &[
            StrategyType::ManualCpm,
            StrategyType::Commission,
            StrategyType::ManualCpv,
            StrategyType::PercentCpc,
        ],
        ChannelType::Display => &[
            StrategyType::TargetImpressionShare,
            StrategyType::Commission,
            StrategyType::ManualCpv,
            StrategyType::PercentCpc,
        ],
        ChannelType::Video => &[
            StrategyType::ManualCpc,
            StrategyType::TargetImpressionShare,
            StrategyType::MaximizeConversionValue,
            StrategyType::TargetRoas,
            StrategyType::TargetSpend,
            StrategyType::PercentCpc,
            StrategyType::Commission,
        ],
        ChannelType::Hotel => &[
            StrategyType::TargetImpressionShare,
            StrategyType::ManualCpm,
            StrategyType::MaximizeConversions,
            StrategyType::MaximizeConversionValue,
            StrategyType::TargetCpa,
            StrategyType::TargetRoas,
            StrategyType::TargetSpend,
            StrategyType::ManualCpv,
        ],
    }
}

/// Portfolio-only strategies can never be set on a campaign directly.
pub fn allows(channel: ChannelType, strategy: StrategyType) -> bool {
    !strategy.is_portfolio_only()
        && allowed_strategies(channel).contains(&strategy)
        && !prohibited_strategies(channel).contains(&strategy)
}

/// String-keyed lookup used at the tool boundary. Unknown channels and
/// unknown strategies are denied.
pub fn is_allowed(channel_type: &str, strategy_type: &str) -> bool {
    let Some(channel) = ChannelType::parse(channel_type) else {
        tracing::warn!(
            event_name = "bidding.compatibility.unknown_channel",
            channel_type,
            strategy_type,
            "no compatibility entry for channel type; denying"
        );
        return false;
    };

    match strategy_type.parse::<StrategyType>() {
        Ok(strategy) => allows(channel, strategy),
        Err(_) => false,
    }
}
