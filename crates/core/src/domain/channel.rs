use std::fmt;

use serde::{Deserialize, Serialize};

/// Serving surface of a campaign. Fixed at campaign creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    PerformanceMax,
    Search,
    Display,
    Video,
    Hotel,
}

impl ChannelType {
    pub const ALL: [ChannelType; 5] = [
        ChannelType::PerformanceMax,
        ChannelType::Search,
        ChannelType::Display,
        ChannelType::Video,
        ChannelType::Hotel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerformanceMax => "PERFORMANCE_MAX",
            Self::Search => "SEARCH",
            Self::Display => "DISPLAY",
            Self::Video => "VIDEO",
            Self::Hotel => "HOTEL",
        }
    }

    /// Channels the backend reports that are not modelled here (SHOPPING,
    /// DEMAND_GEN, ...) yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|channel| channel.as_str() == normalized)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelType;

    #[test]
    fn parse_normalizes_case_and_rejects_unmodelled_channels() {
        assert_eq!(ChannelType::parse("performance_max"), Some(ChannelType::PerformanceMax));
        assert_eq!(ChannelType::parse(" Search "), Some(ChannelType::Search));
        assert_eq!(ChannelType::parse("SHOPPING"), None);
        assert_eq!(ChannelType::parse(""), None);
    }
}
