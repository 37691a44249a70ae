//! Unit conversion and display formatting.
//!
//! Tire data is stored in PSI and degrees Celsius. These helpers convert it
//! into the unit system the user picked.

/// Kilopascals per PSI.
pub const KPA_PER_PSI: f64 = 6.89476;

/// Unit system used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UnitSystem {
    /// PSI and degrees Fahrenheit.
    #[default]
    Imperial,
    /// kPa and degrees Celsius.
    Metric,
}

impl std::fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imperial => write!(f, "imperial"),
            Self::Metric => write!(f, "metric"),
        }
    }
}

/// Convert Celsius to Fahrenheit.
///
/// # Example
///
/// ```
/// use smarttire_ble::celsius_to_fahrenheit;
///
/// let fahrenheit = celsius_to_fahrenheit(100.0);
/// assert!((fahrenheit - 212.0).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius.
///
/// # Example
///
/// ```
/// use smarttire_ble::fahrenheit_to_celsius;
///
/// let celsius = fahrenheit_to_celsius(212.0);
/// assert!((celsius - 100.0).abs() < 0.001);
/// ```
#[inline]
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Convert a pressure in PSI into the given unit system.
pub fn convert_pressure(psi: f64, units: UnitSystem) -> f64 {
    match units {
        UnitSystem::Imperial => psi,
        UnitSystem::Metric => psi * KPA_PER_PSI,
    }
}

/// Convert a temperature in Celsius into the given unit system.
pub fn convert_temperature(celsius: f64, units: UnitSystem) -> f64 {
    match units {
        UnitSystem::Imperial => celsius_to_fahrenheit(celsius),
        UnitSystem::Metric => celsius,
    }
}

/// Pressure unit label.
pub fn pressure_unit(units: UnitSystem) -> &'static str {
    match units {
        UnitSystem::Imperial => "PSI",
        UnitSystem::Metric => "kPa",
    }
}

/// Temperature unit label.
pub fn temperature_unit(units: UnitSystem) -> &'static str {
    match units {
        UnitSystem::Imperial => "°F",
        UnitSystem::Metric => "°C",
    }
}

/// Format a PSI value for display, e.g. `"32.0 PSI"` or `"220.6 kPa"`.
pub fn format_pressure(psi: f64, units: UnitSystem) -> String {
    format!("{:.1} {}", convert_pressure(psi, units), pressure_unit(units))
}

/// Format a Celsius value for display, e.g. `"77.0°F"` or `"25.0°C"`.
pub fn format_temperature(celsius: f64, units: UnitSystem) -> String {
    format!(
        "{:.1}{}",
        convert_temperature(celsius, units),
        temperature_unit(units)
    )
}
