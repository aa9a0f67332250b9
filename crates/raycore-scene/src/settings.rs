//! Kernel configuration.

use serde::{Deserialize, Serialize};

use crate::SettingsError;

/// Intersection algorithm used for curve segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurvePrimitive {
    /// Analytic tapered cylinder between consecutive keys.
    LineSegments,
    /// Recursive subdivision of the cardinal spline through the keys.
    #[default]
    CardinalCurves,
}

/// Cross-section of cardinal curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    /// Flat strip always facing the ray.
    #[default]
    Ribbon,
    /// Round tube.
    Thick,
}

/// Curve intersection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveSettings {
    /// Intersection algorithm.
    pub primitive: CurvePrimitive,
    /// Cross-section for cardinal curves.
    pub shape: CurveShape,
    /// Subdivision depth for cardinal curves (`2^n` leaf intervals).
    pub subdivisions: u32,
    /// Accept hits on the far side of a curve when the near side misses.
    pub backface: bool,
    /// Reject line-segment hits from rays starting inside the curve.
    pub encasing: bool,
    /// Minimum curve width relative to the ray footprint. Zero disables
    /// widening.
    pub minimum_width: f32,
    /// Upper bound on the widening, in world units.
    pub maximum_width: f32,
}

impl Default for CurveSettings {
    fn default() -> Self {
        Self {
            primitive: CurvePrimitive::default(),
            shape: CurveShape::default(),
            subdivisions: 3,
            backface: false,
            encasing: true,
            minimum_width: 0.0,
            maximum_width: 0.1,
        }
    }
}

impl CurveSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=24).contains(&self.subdivisions) {
            return Err(SettingsError::Invalid(format!(
                "subdivisions must be between 1 and 24, got {}",
                self.subdivisions
            )));
        }
        if !self.minimum_width.is_finite() || self.minimum_width < 0.0 {
            return Err(SettingsError::Invalid(
                "minimum_width must be finite and non-negative".into(),
            ));
        }
        if !self.maximum_width.is_finite() || self.maximum_width < 0.0 {
            return Err(SettingsError::Invalid(
                "maximum_width must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Relative widening for a ray with footprint `spread`.
    #[inline]
    pub fn difl(&self, spread: f32) -> f32 {
        self.minimum_width * spread
    }
}

/// Settings consumed by the intersection kernel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSettings {
    /// Curve intersection parameters.
    pub curves: CurveSettings,
}

impl KernelSettings {
    /// Parse settings from a TOML document and validate them.
    ///
    /// ```
    /// use raycore_scene::{CurvePrimitive, KernelSettings};
    ///
    /// let settings = KernelSettings::from_toml_str(
    ///     r#"
    ///     [curves]
    ///     primitive = "line_segments"
    ///     minimum_width = 1.0
    ///     "#,
    /// )
    /// .unwrap();
    /// assert_eq!(settings.curves.primitive, CurvePrimitive::LineSegments);
    /// assert_eq!(settings.curves.subdivisions, 3);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        let settings: KernelSettings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.curves.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = KernelSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.curves.primitive, CurvePrimitive::CardinalCurves);
        assert_eq!(settings.curves.shape, CurveShape::Ribbon);
        assert!(settings.curves.encasing);
    }

    #[test]
    fn test_parse_full_document() {
        let settings = KernelSettings::from_toml_str(
            r#"
            [curves]
            primitive = "cardinal_curves"
            shape = "thick"
            subdivisions = 5
            backface = true
            encasing = false
            minimum_width = 2.0
            maximum_width = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(settings.curves.shape, CurveShape::Thick);
        assert_eq!(settings.curves.subdivisions, 5);
        assert!(settings.curves.backface);
        assert!(!settings.curves.encasing);
        assert_eq!(settings.curves.difl(0.25), 0.5);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = KernelSettings::from_toml_str("").unwrap();
        assert_eq!(settings, KernelSettings::default());
    }

    #[test]
    fn test_invalid_values() {
        let err = KernelSettings::from_toml_str("[curves]\nsubdivisions = 0\n");
        assert!(matches!(err, Err(SettingsError::Invalid(_))));

        let mut settings = KernelSettings::default();
        settings.curves.minimum_width = -1.0;
        assert!(settings.validate().is_err());

        settings.curves.minimum_width = 0.0;
        settings.curves.maximum_width = f32::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unknown_primitive_is_parse_error() {
        let err = KernelSettings::from_toml_str("[curves]\nprimitive = \"bezier\"\n");
        assert!(matches!(err, Err(SettingsError::Parse(_))));
    }
}
