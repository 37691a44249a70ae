//! Axle layouts and tire positions.
//!
//! Vehicles are registered with a free-form axle string such as `"3 Axles"`
//! or `"2 Axles w/Dually"`. The layout determines how many tires the vehicle
//! has and which position keys its tire data uses.

/// Axle layout of a vehicle or towable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxleType {
    /// Single axle, two tires.
    OneAxle,
    /// Two axles, four tires.
    #[default]
    TwoAxles,
    /// Two axles with dual rear wheels, six tires.
    TwoAxlesDually,
    /// Three axles, six tires.
    ThreeAxles,
    /// Four axles, eight tires.
    FourAxles,
    /// Five axles, ten tires.
    FiveAxles,
    /// Six axles, twelve tires.
    SixAxles,
}

impl AxleType {
    /// Parse an axle string as entered during registration.
    ///
    /// Returns `None` for strings that do not name a known layout.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "1 Axle" => Some(Self::OneAxle),
            "2 Axles" => Some(Self::TwoAxles),
            "2 Axles w/Dually" | "2 Axles w/Dually Tires" => Some(Self::TwoAxlesDually),
            "3 Axles" => Some(Self::ThreeAxles),
            "4 Axles" => Some(Self::FourAxles),
            "5 Axles" => Some(Self::FiveAxles),
            "6 Axles" => Some(Self::SixAxles),
            _ => None,
        }
    }

    /// Parse an axle string, falling back to the two-axle layout.
    pub fn from_label_or_default(label: &str) -> Self {
        Self::from_label(label).unwrap_or_default()
    }

    /// Canonical label for this layout.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OneAxle => "1 Axle",
            Self::TwoAxles => "2 Axles",
            Self::TwoAxlesDually => "2 Axles w/Dually",
            Self::ThreeAxles => "3 Axles",
            Self::FourAxles => "4 Axles",
            Self::FiveAxles => "5 Axles",
            Self::SixAxles => "6 Axles",
        }
    }

    /// Number of axles.
    pub fn axle_count(&self) -> usize {
        match self {
            Self::OneAxle => 1,
            Self::TwoAxles | Self::TwoAxlesDually => 2,
            Self::ThreeAxles => 3,
            Self::FourAxles => 4,
            Self::FiveAxles => 5,
            Self::SixAxles => 6,
        }
    }

    /// Number of tires on this layout.
    pub fn tire_count(&self) -> usize {
        match self {
            Self::TwoAxlesDually => 6,
            other => other.axle_count() * 2,
        }
    }

    /// Ordered tire position keys, front to rear, left before right.
    pub fn tire_positions(&self) -> Vec<String> {
        let sides = |prefix: &str| [format!("{prefix}-left"), format!("{prefix}-right")];

        match self {
            Self::OneAxle => vec!["left".to_string(), "right".to_string()],
            Self::TwoAxles => [sides("front"), sides("rear")].concat(),
            Self::TwoAxlesDually => {
                let mut positions = sides("front").to_vec();
                positions.extend(
                    ["rear-left-inner", "rear-left-outer", "rear-right-inner", "rear-right-outer"]
                        .map(String::from),
                );
                positions
            }
            Self::ThreeAxles => [sides("front"), sides("middle"), sides("rear")].concat(),
            Self::FourAxles | Self::FiveAxles | Self::SixAxles => {
                let count = self.axle_count();
                let mut positions = sides("front").to_vec();
                for axle in 2..count {
                    positions.extend(sides(format!("axle-{axle}").as_str()));
                }
                positions.extend(sides("rear"));
                positions
            }
        }
    }

    /// Check whether a tire position belongs to this layout.
    pub fn has_position(&self, tire_id: &str) -> bool {
        self.tire_positions().iter().any(|p| p == tire_id)
    }
}

impl std::fmt::Display for AxleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of tires expected for an axle string. Unknown strings count as 4.
pub fn expected_tire_count(axle_type: &str) -> usize {
    AxleType::from_label_or_default(axle_type).tire_count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_tire_count() {
        assert_eq!(expected_tire_count("1 Axle"), 2);
        assert_eq!(expected_tire_count("2 Axles"), 4);
        assert_eq!(expected_tire_count("2 Axles w/Dually"), 6);
        assert_eq!(expected_tire_count("2 Axles w/Dually Tires"), 6);
        assert_eq!(expected_tire_count("3 Axles"), 6);
        assert_eq!(expected_tire_count("4 Axles"), 8);
        assert_eq!(expected_tire_count("5 Axles"), 10);
        assert_eq!(expected_tire_count("6 Axles"), 12);
        assert_eq!(expected_tire_count("Hovercraft"), 4);
        assert_eq!(expected_tire_count(""), 4);
    }

    #[test]
    fn test_positions_match_tire_count() {
        for axle in [
            AxleType::OneAxle,
            AxleType::TwoAxles,
            AxleType::TwoAxlesDually,
            AxleType::ThreeAxles,
            AxleType::FourAxles,
            AxleType::FiveAxles,
            AxleType::SixAxles,
        ] {
            let positions = axle.tire_positions();
            assert_eq!(positions.len(), axle.tire_count(), "{axle}");

            let mut unique = positions.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), positions.len(), "{axle} has duplicate positions");
        }
    }

    #[test]
    fn test_position_names() {
        assert_eq!(
            AxleType::TwoAxles.tire_positions(),
            vec!["front-left", "front-right", "rear-left", "rear-right"]
        );
        assert_eq!(
            AxleType::ThreeAxles.tire_positions()[2..4],
            ["middle-left".to_string(), "middle-right".to_string()]
        );
        assert_eq!(
            AxleType::FiveAxles.tire_positions(),
            vec![
                "front-left",
                "front-right",
                "axle-2-left",
                "axle-2-right",
                "axle-3-left",
                "axle-3-right",
                "axle-4-left",
                "axle-4-right",
                "rear-left",
                "rear-right",
            ]
        );
        assert!(AxleType::TwoAxlesDually.has_position("rear-right-outer"));
        assert!(!AxleType::TwoAxles.has_position("rear-right-outer"));
    }

    #[test]
    fn test_label_roundtrip() {
        assert_eq!(AxleType::from_label(" 3 Axles "), Some(AxleType::ThreeAxles));
        assert_eq!(AxleType::from_label("7 Axles"), None);
        assert_eq!(AxleType::from_label_or_default("7 Axles"), AxleType::TwoAxles);
        assert_eq!(AxleType::SixAxles.to_string(), "6 Axles");
    }
}
