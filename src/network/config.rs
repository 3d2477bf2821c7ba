use crate::error::{NetworkError, Result};
use crate::math::CoordinateSystem;

/// Tolerances for cleaning a raw road network. Lengths are in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig {
    pub coordinates: CoordinateSystem,
    /// Vertices closer than this are merged into their centroid.
    pub cluster_tolerance_m: f64,
    /// Dangling edges shorter than this are removed.
    pub finger_length_m: f64,
    /// A dangling tip this close to a neighbouring edge is an overshoot.
    pub finger_projection_m: f64,
    /// Reach of the casts used to reconnect dangling edges.
    pub extend_distance_m: f64,
    /// Upper bound on clustering rounds.
    pub max_cluster_rounds: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            coordinates: CoordinateSystem::default(),
            cluster_tolerance_m: 0.25,
            finger_length_m: 0.10,
            finger_projection_m: 0.10,
            extend_distance_m: 5.0,
            max_cluster_rounds: 8,
        }
    }
}

impl NetworkConfig {
    /// Default tolerances over planar metre coordinates.
    #[must_use]
    pub fn projected() -> Self {
        Self {
            coordinates: CoordinateSystem::Projected,
            ..Self::default()
        }
    }

    /// Checks that every tolerance is finite and positive.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::InvalidConfig` naming the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        for (parameter, value) in [
            ("cluster_tolerance_m", self.cluster_tolerance_m),
            ("finger_length_m", self.finger_length_m),
            ("finger_projection_m", self.finger_projection_m),
            ("extend_distance_m", self.extend_distance_m),
        ] {
            positive(parameter, value)?;
        }
        if self.max_cluster_rounds == 0 {
            return Err(NetworkError::InvalidConfig {
                parameter: "max_cluster_rounds",
                value: 0.0,
            }
            .into());
        }
        Ok(())
    }
}

/// Fails unless `value` is finite and strictly positive.
pub(crate) fn positive(parameter: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(NetworkError::InvalidConfig { parameter, value }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(NetworkConfig::default().validate().is_ok());
        assert_eq!(NetworkConfig::projected().coordinates, CoordinateSystem::Projected);
    }

    #[test]
    fn bad_tolerances_are_rejected() {
        let cfg = NetworkConfig {
            finger_length_m: -1.0,
            ..NetworkConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = NetworkConfig {
            cluster_tolerance_m: f64::NAN,
            ..NetworkConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = NetworkConfig {
            max_cluster_rounds: 0,
            ..NetworkConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
