//! Resource categories exposed by the bridge.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use strum_macros::EnumString;

/// A category of bridge resource.
///
/// Resource types scope cache entries and pick their default time-to-live.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hue_bridge_rs::ResourceType;
///
/// let rt = ResourceType::from_path("lights/3/state");
/// assert_eq!(rt, ResourceType::Lights);
/// assert_eq!(rt.default_ttl(), Duration::from_secs(10));
/// assert_eq!(ResourceType::from_path("rules").default_ttl(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ResourceType {
    Lights,
    Groups,
    Scenes,
    Schedules,
    Sensors,
    Config,
    #[strum(default)]
    Other(String),
}

impl ResourceType {
    const DEFAULT_TTL_SECS: u64 = 60;

    /// Resource type addressed by a bridge path such as `groups/1/action`.
    pub fn from_path(path: &str) -> Self {
        let segment = path
            .trim_start_matches('/')
            .split(['/', '?'])
            .next()
            .unwrap_or_default();
        match ResourceType::from_str(segment) {
            Ok(ResourceType::Other(_)) | Err(_) => ResourceType::Other(segment.to_lowercase()),
            Ok(known) => known,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Lights => "lights",
            ResourceType::Groups => "groups",
            ResourceType::Scenes => "scenes",
            ResourceType::Schedules => "schedules",
            ResourceType::Sensors => "sensors",
            ResourceType::Config => "config",
            ResourceType::Other(name) => name,
        }
    }

    /// Time-to-live used when a cache write carries no explicit one.
    pub fn default_ttl(&self) -> Duration {
        let secs = match self {
            ResourceType::Lights => 10,
            ResourceType::Groups => 30,
            ResourceType::Scenes => 60,
            ResourceType::Schedules => 60,
            ResourceType::Sensors => 5,
            ResourceType::Config => 300,
            ResourceType::Other(_) => Self::DEFAULT_TTL_SECS,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(ResourceType::from_path("/groups/0/action"), ResourceType::Groups);
        assert_eq!(ResourceType::from_path("Sensors"), ResourceType::Sensors);
        assert_eq!(ResourceType::from_path("config"), ResourceType::Config);
        assert_eq!(
            ResourceType::from_path("rules/2"),
            ResourceType::Other("rules".into())
        );
        assert_eq!(ResourceType::from_path(""), ResourceType::Other(String::new()));
    }

    #[test]
    fn test_default_ttls() {
        let table = [
            ("lights", 10),
            ("groups", 30),
            ("scenes", 60),
            ("schedules", 60),
            ("sensors", 5),
            ("config", 300),
            ("resourcelinks", 60),
        ];
        for (name, secs) in table {
            assert_eq!(
                ResourceType::from_path(name).default_ttl(),
                Duration::from_secs(secs),
                "{name}"
            );
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ResourceType::try_from("LIGHTS").unwrap(), ResourceType::Lights);
        assert_eq!(
            ResourceType::from_str("resourcelinks").unwrap(),
            ResourceType::Other("resourcelinks".into())
        );
    }

    #[test]
    fn test_display_round_trips_name() {
        assert_eq!(ResourceType::Schedules.to_string(), "schedules");
        assert_eq!(ResourceType::Other("rules".into()).to_string(), "rules");
    }
}
