//! Static level → presentation table.

use crate::health::{components, ProtectionLevel};

pub(crate) struct LevelDescriptor {
    pub title: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
}

const FULL: LevelDescriptor = LevelDescriptor {
    title: "Full protection",
    icon: "🛡️",
    description: "All protection methods are active.",
    recommendations: &[],
};

const DEGRADED: LevelDescriptor = LevelDescriptor {
    title: "Degraded protection",
    icon: "⚠️",
    description: "Some protection methods are unavailable. Pages are still checked with the remaining methods.",
    recommendations: &[
        "Check your internet connection to restore cloud analysis.",
        "Be cautious with unfamiliar links until full protection returns.",
    ],
};

const MINIMAL: LevelDescriptor = LevelDescriptor {
    title: "Minimal protection",
    icon: "🔶",
    description: "Only basic URL checks are available. Page content is not being analyzed.",
    recommendations: &[
        "Avoid entering passwords or payment details on unfamiliar sites.",
        "Reconnect to the internet to restore content analysis.",
        "Restart the application if the on-device model fails to load.",
    ],
};

const OFFLINE: LevelDescriptor = LevelDescriptor {
    title: "Protection offline",
    icon: "⛔",
    description: "Protection is offline. Pages are not being checked.",
    recommendations: &[
        "Do not enter sensitive information until protection is restored.",
        "Restart the application if the problem persists.",
    ],
};

pub(crate) fn descriptor(level: ProtectionLevel) -> &'static LevelDescriptor {
    match level {
        ProtectionLevel::Full => &FULL,
        ProtectionLevel::Degraded => &DEGRADED,
        ProtectionLevel::Minimal => &MINIMAL,
        ProtectionLevel::Offline => &OFFLINE,
    }
}

/// Human label for a health component.
pub fn method_label(component: &str) -> String {
    match component {
        components::API => "Cloud threat analysis".to_string(),
        components::LOCAL_ML => "On-device ML model".to_string(),
        components::URL_REPUTATION => "URL reputation".to_string(),
        components::BLOCKLIST => "Blocklist".to_string(),
        components::STORAGE => "Local storage".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_has_no_recommendations() {
        assert!(descriptor(ProtectionLevel::Full).recommendations.is_empty());
        assert!(!descriptor(ProtectionLevel::Offline).recommendations.is_empty());
    }

    #[test]
    fn test_unknown_component_keeps_its_name() {
        assert_eq!(method_label("local_ml"), "On-device ML model");
        assert_eq!(method_label("sandbox"), "sandbox");
    }
}
