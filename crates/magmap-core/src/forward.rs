//! Forward modelling of prism anomalies
//!
//! Computes the magnetic field a magnetized prism produces at observation
//! locations. Coordinates are east, north, up; angles are degrees, with
//! inclination positive downward and declination clockwise from north.
//! Fields are reported in nT.

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{validation, GridError, GridResult};
use crate::types::ScatterSample;

/// μ0 / 4π in T·m/A
const MU0_OVER_4PI: f64 = 1e-7;
/// μ0 in T·m/A
const MU0: f64 = 4.0 * std::f64::consts::PI * MU0_OVER_4PI;
const NT_PER_T: f64 = 1e9;

/// Unit vector (east, north, up) for an inclination/declination pair
pub fn direction(inclination: f64, declination: f64) -> Vector3<f64> {
    let (inc, dec) = (inclination.to_radians(), declination.to_radians());
    Vector3::new(inc.cos() * dec.sin(), inc.cos() * dec.cos(), -inc.sin())
}

/// Rectangular prism
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prism {
    /// Width (east-west)
    pub dx: f64,
    /// Length (north-south)
    pub dy: f64,
    /// Height
    pub dz: f64,
    /// Centre easting
    pub x0: f64,
    /// Centre northing
    pub y0: f64,
    /// Elevation of the top face
    pub z0: f64,
    /// Plunge of the prism axis
    pub inclination: f64,
    /// Strike of the prism axis
    pub declination: f64,
}

impl Default for Prism {
    fn default() -> Self {
        Self {
            dx: 1.0,
            dy: 1.0,
            dz: 1.0,
            x0: 0.0,
            y0: 0.0,
            z0: 0.0,
            inclination: 0.0,
            declination: 0.0,
        }
    }
}

impl Prism {
    pub fn validate(&self) -> GridResult<()> {
        validation::positive("prism dx", self.dx)?;
        validation::positive("prism dy", self.dy)?;
        validation::positive("prism dz", self.dz)?;
        if ![self.x0, self.y0, self.z0, self.inclination, self.declination]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(GridError::parameter("prism", "position and angles must be finite"));
        }
        Ok(())
    }

    pub fn volume(&self) -> f64 {
        self.dx * self.dy * self.dz
    }

    /// Centre of mass; rotation about it leaves it in place
    pub fn centroid(&self) -> Vector3<f64> {
        Vector3::new(self.x0, self.y0, self.z0 - self.dz / 2.0)
    }

    /// Eight corners, rotated by the prism inclination and declination
    pub fn corners(&self) -> Vec<Vector3<f64>> {
        let c = self.centroid();
        let (inc, dec) = (self.inclination.to_radians(), self.declination.to_radians());
        let mut corners = Vec::with_capacity(8);
        for sx in [-0.5, 0.5] {
            for sy in [-0.5, 0.5] {
                for sz in [-0.5, 0.5] {
                    let (x, y, z) = (sx * self.dx, sy * self.dy, sz * self.dz);
                    // Tilt about the east axis, then rotate about vertical
                    let (y, z) = (y * inc.cos() - z * inc.sin(), y * inc.sin() + z * inc.cos());
                    let (x, y) = (x * dec.cos() + y * dec.sin(), -x * dec.sin() + y * dec.cos());
                    corners.push(c + Vector3::new(x, y, z));
                }
            }
        }
        corners
    }
}

/// Ambient (inducing) field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InducingField {
    /// Intensity in nT
    pub intensity: f64,
    pub inclination: f64,
    pub declination: f64,
}

impl Default for InducingField {
    fn default() -> Self {
        Self {
            intensity: 54_500.0,
            inclination: 90.0,
            declination: 0.0,
        }
    }
}

impl InducingField {
    pub fn direction(&self) -> Vector3<f64> {
        direction(self.inclination, self.declination)
    }
}

/// Which magnetization sources contribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetizationKind {
    #[default]
    Induced,
    Remanent,
    Total,
}

impl FromStr for MagnetizationKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "induced" => Ok(MagnetizationKind::Induced),
            "remanent" => Ok(MagnetizationKind::Remanent),
            "total" => Ok(MagnetizationKind::Total),
            _ => Err(GridError::unsupported(s)),
        }
    }
}

/// Magnetic properties of the prism and the field it sits in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagneticParameters {
    /// Volume susceptibility (SI)
    pub susceptibility: f64,
    pub kind: MagnetizationKind,
    /// Koenigsberger ratio: remanent over induced magnetization
    pub q_ratio: f64,
    pub remanence_inclination: f64,
    pub remanence_declination: f64,
    pub field: InducingField,
}

impl Default for MagneticParameters {
    fn default() -> Self {
        Self {
            susceptibility: 0.1,
            kind: MagnetizationKind::Induced,
            q_ratio: 0.0,
            remanence_inclination: 0.0,
            remanence_declination: 0.0,
            field: InducingField::default(),
        }
    }
}

impl MagneticParameters {
    pub fn validate(&self) -> GridResult<()> {
        if !(self.susceptibility.is_finite() && self.susceptibility >= 0.0) {
            return Err(GridError::parameter(
                "susceptibility",
                format!("must be finite and non-negative, got {}", self.susceptibility),
            ));
        }
        if !(self.q_ratio.is_finite() && self.q_ratio >= 0.0) {
            return Err(GridError::parameter(
                "q_ratio",
                format!("must be finite and non-negative, got {}", self.q_ratio),
            ));
        }
        let angles = [
            self.remanence_inclination,
            self.remanence_declination,
            self.field.inclination,
            self.field.declination,
            self.field.intensity,
        ];
        if !angles.iter().all(|v| v.is_finite()) {
            return Err(GridError::parameter("field", "angles and intensity must be finite"));
        }
        Ok(())
    }

    /// Magnetization vector in A/m
    pub fn magnetization(&self) -> Vector3<f64> {
        let induced_magnitude = self.susceptibility * self.field.intensity / NT_PER_T / MU0;
        let induced = self.field.direction() * induced_magnitude;
        let remanent = direction(self.remanence_inclination, self.remanence_declination)
            * (self.q_ratio * induced_magnitude);

        match self.kind {
            MagnetizationKind::Induced => induced,
            MagnetizationKind::Remanent => remanent,
            MagnetizationKind::Total => induced + remanent,
        }
    }
}

/// Field component to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldComponent {
    /// Total-field anomaly: projection on the inducing field direction
    Tmi,
    Bx,
    By,
    Bz,
}

impl FieldComponent {
    pub fn name(&self) -> &'static str {
        match self {
            FieldComponent::Tmi => "tf",
            FieldComponent::Bx => "bx",
            FieldComponent::By => "by",
            FieldComponent::Bz => "bz",
        }
    }

    fn project(&self, b: &Vector3<f64>, field_dir: &Vector3<f64>) -> f64 {
        match self {
            FieldComponent::Tmi => b.dot(field_dir),
            FieldComponent::Bx => b.x,
            FieldComponent::By => b.y,
            FieldComponent::Bz => b.z,
        }
    }
}

impl fmt::Display for FieldComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldComponent {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tf" | "tmi" => Ok(FieldComponent::Tmi),
            "bx" => Ok(FieldComponent::Bx),
            "by" => Ok(FieldComponent::By),
            "bz" => Ok(FieldComponent::Bz),
            _ => Err(GridError::unsupported(s)),
        }
    }
}

/// Observation locations as `(x, y, z)`; fails with `ShapeMismatch` when
/// the columns disagree in length
pub fn locations_from_columns(x: &[f64], y: &[f64], z: &[f64]) -> GridResult<Vec<[f64; 3]>> {
    validation::same_len("y locations", x.len(), y.len())?;
    validation::same_len("z locations", x.len(), z.len())?;
    Ok(x.iter()
        .zip(y)
        .zip(z)
        .map(|((&x, &y), &z)| [x, y, z])
        .collect())
}

/// Computed fields, one series per requested component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub locations: Vec<[f64; 3]>,
    pub components: Vec<(FieldComponent, Vec<f64>)>,
}

impl FieldResult {
    pub fn get(&self, component: FieldComponent) -> Option<&[f64]> {
        self.components
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, values)| values.as_slice())
    }

    /// Map-view samples of one component
    pub fn to_samples(&self, component: FieldComponent) -> GridResult<Vec<ScatterSample>> {
        let values = self.get(component).ok_or_else(|| {
            GridError::parameter("component", format!("{} was not computed", component))
        })?;
        validation::same_len("field values", self.locations.len(), values.len())?;
        Ok(self
            .locations
            .iter()
            .zip(values)
            .map(|(loc, &v)| ScatterSample::new(loc[0], loc[1], v))
            .collect())
    }
}

/// Trait for forward-modelling backends
pub trait ForwardModel {
    fn fields(
        &self,
        prism: &Prism,
        params: &MagneticParameters,
        locations: &[[f64; 3]],
        components: &[FieldComponent],
    ) -> GridResult<FieldResult>;
}

/// Prism approximated by a point dipole at its centroid
///
/// Accurate once observations are a few prism widths away. The prism
/// orientation does not enter: centroid and volume are rotation invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct DipoleForwardModel;

impl DipoleForwardModel {
    /// Field in nT at offset `r` from a dipole of moment `m` (A·m²)
    fn dipole_field(m: &Vector3<f64>, r: &Vector3<f64>) -> Vector3<f64> {
        let dist = r.norm();
        let r_hat = r / dist;
        (r_hat * (3.0 * m.dot(&r_hat)) - m) * (MU0_OVER_4PI * NT_PER_T / dist.powi(3))
    }
}

impl ForwardModel for DipoleForwardModel {
    fn fields(
        &self,
        prism: &Prism,
        params: &MagneticParameters,
        locations: &[[f64; 3]],
        components: &[FieldComponent],
    ) -> GridResult<FieldResult> {
        prism.validate()?;
        params.validate()?;

        let moment = params.magnetization() * prism.volume();
        let source = prism.centroid();
        let field_dir = params.field.direction();

        let mut fields = Vec::with_capacity(locations.len());
        for loc in locations {
            let r = Vector3::new(loc[0], loc[1], loc[2]) - source;
            if !(r.norm() > 0.0) {
                return Err(GridError::parameter(
                    "locations",
                    format!("observation {:?} coincides with the dipole", loc),
                ));
            }
            fields.push(Self::dipole_field(&moment, &r));
        }

        let components = components
            .iter()
            .map(|c| (*c, fields.iter().map(|b| c.project(b, &field_dir)).collect()))
            .collect();

        tracing::debug!(
            "Computed dipole fields at {} locations ({:?} magnetization)",
            locations.len(),
            params.kind
        );
        Ok(FieldResult {
            locations: locations.to_vec(),
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buried_cube() -> Prism {
        Prism {
            dx: 10.0,
            dy: 10.0,
            dz: 10.0,
            z0: -10.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_direction() {
        let down = direction(90.0, 0.0);
        assert!((down.z + 1.0).abs() < 1e-12);
        let east = direction(0.0, 90.0);
        assert!((east.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pole_anomaly_positive_above_source() {
        let locations = [[0.0, 0.0, 0.0], [200.0, 0.0, 0.0]];
        let result = DipoleForwardModel
            .fields(
                &buried_cube(),
                &MagneticParameters::default(),
                &locations,
                &[FieldComponent::Tmi, FieldComponent::Bz],
            )
            .unwrap();

        let tmi = result.get(FieldComponent::Tmi).unwrap();
        assert!(tmi[0] > 0.0);
        assert!(tmi[0].abs() > tmi[1].abs());

        // At the pole TMI is minus the vertical (up) component
        let bz = result.get(FieldComponent::Bz).unwrap();
        assert!((tmi[0] + bz[0]).abs() < 1e-9);
    }

    #[test]
    fn test_pole_anomaly_magnitude() {
        let params = MagneticParameters::default();
        let prism = buried_cube();
        let result = DipoleForwardModel
            .fields(&prism, &params, &[[0.0, 0.0, 0.0]], &[FieldComponent::Tmi])
            .unwrap();

        // B = 2 m μ0/4π / h³ directly above a vertical dipole
        let m = params.magnetization().norm() * prism.volume();
        let h: f64 = 15.0;
        let expected = 2.0 * m * MU0_OVER_4PI * NT_PER_T / h.powi(3);
        let tmi = result.get(FieldComponent::Tmi).unwrap();
        assert!((tmi[0] - expected).abs() < 1e-9 * expected);
    }

    #[test]
    fn test_remanent_only_without_q_is_zero() {
        let params = MagneticParameters {
            kind: MagnetizationKind::Remanent,
            ..Default::default()
        };
        let result = DipoleForwardModel
            .fields(&buried_cube(), &params, &[[5.0, 5.0, 0.0]], &[FieldComponent::Bx])
            .unwrap();
        assert_eq!(result.get(FieldComponent::Bx).unwrap()[0], 0.0);
    }

    #[test]
    fn test_total_is_sum() {
        let base = MagneticParameters {
            q_ratio: 2.0,
            remanence_inclination: 30.0,
            remanence_declination: 45.0,
            ..Default::default()
        };
        let locs = [[20.0, -5.0, 1.0]];
        let comp = [FieldComponent::Tmi];
        let run = |kind| {
            let params = MagneticParameters { kind, ..base };
            DipoleForwardModel
                .fields(&buried_cube(), &params, &locs, &comp)
                .unwrap()
                .get(FieldComponent::Tmi)
                .unwrap()[0]
        };
        let total = run(MagnetizationKind::Total);
        let parts = run(MagnetizationKind::Induced) + run(MagnetizationKind::Remanent);
        assert!((total - parts).abs() < 1e-9 * total.abs().max(1.0));
    }

    #[test]
    fn test_to_samples() {
        let locations = locations_from_columns(&[0.0, 10.0], &[0.0, 5.0], &[1.0, 1.0]).unwrap();
        let result = DipoleForwardModel
            .fields(
                &buried_cube(),
                &MagneticParameters::default(),
                &locations,
                &[FieldComponent::Tmi],
            )
            .unwrap();
        let samples = result.to_samples(FieldComponent::Tmi).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].x, 10.0);
        assert_eq!(samples[1].y, 5.0);
        assert!(result.to_samples(FieldComponent::By).is_err());
    }

    #[test]
    fn test_mismatched_columns() {
        assert!(matches!(
            locations_from_columns(&[0.0, 1.0], &[0.0], &[0.0, 1.0]),
            Err(GridError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let prism = Prism {
            dz: 0.0,
            ..Default::default()
        };
        assert!(DipoleForwardModel
            .fields(
                &prism,
                &MagneticParameters::default(),
                &[[0.0, 0.0, 1.0]],
                &[FieldComponent::Tmi]
            )
            .is_err());

        // Observation at the centroid
        assert!(DipoleForwardModel
            .fields(
                &Prism::default(),
                &MagneticParameters::default(),
                &[[0.0, 0.0, -0.5]],
                &[FieldComponent::Tmi]
            )
            .is_err());
    }

    #[test]
    fn test_corners_unrotated() {
        let corners = Prism::default().corners();
        assert_eq!(corners.len(), 8);
        assert!(corners.iter().all(|c| c.z <= 0.0 && c.z >= -1.0));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("tf".parse::<FieldComponent>().unwrap(), FieldComponent::Tmi);
        assert_eq!(
            "Total".parse::<MagnetizationKind>().unwrap(),
            MagnetizationKind::Total
        );
        assert!("bq".parse::<FieldComponent>().is_err());
    }
}
