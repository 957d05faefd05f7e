//! Apertures, screens, and detectors.
//!
//! Detectors accumulate between `reset_accumulators` calls; accumulated
//! readings never serialize into scene files.

use core_geom::Vec2;
use core_ray::{Polarization, Ray, TerminationReason};
use serde::{Deserialize, Serialize};

use crate::geometry::ElementFrame;
use crate::mirrors::planar_intersect;
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, number_arg,
};
use crate::{Hit, HitExtra, InteractionError};

fn radial_of(frame: &ElementFrame, hit: &Hit) -> f64 {
    match hit.extra {
        HitExtra::Radial(r) => r,
        _ => frame.signed_offset(hit.point),
    }
}

fn bin_index(radial: f64, length: f64, bin_count: usize) -> usize {
    let t = (radial / length + 0.5).clamp(0.0, 1.0);
    ((t * bin_count as f64) as usize).min(bin_count.saturating_sub(1))
}

/// Opaque plate with one or more transmitting slits, center-symmetric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Aperture {
    pub length: f64,
    pub slit_count: u32,
    pub slit_width: f64,
    /// Center-to-center spacing when more than one slit.
    pub slit_spacing: f64,
}

impl Default for Aperture {
    fn default() -> Self {
        Self {
            length: 100.0,
            slit_count: 1,
            slit_width: 20.0,
            slit_spacing: 40.0,
        }
    }
}

impl Aperture {
    /// Whether the signed surface offset falls inside any slit.
    pub fn in_slit(&self, radial: f64) -> bool {
        let n = self.slit_count.max(1) as i64;
        let half_width = self.slit_width / 2.0;
        (0..n).any(|i| {
            let center = (i as f64 - (n - 1) as f64 / 2.0) * self.slit_spacing;
            (radial - center).abs() <= half_width
        })
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        if self.in_slit(radial_of(frame, hit)) {
            Ok(vec![ray.successor(hit.point, ray.direction)])
        } else {
            ray.terminate(TerminationReason::Blocked);
            Ok(Vec::new())
        }
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "slitCount",
                PropertyDescriptor::range(self.slit_count as f64, 1.0, 16.0, 1.0)
                    .label("Slit count"),
            )
            .push(
                "slitWidth",
                PropertyDescriptor::number(self.slit_width).label("Slit width"),
            )
            .push(
                "slitSpacing",
                PropertyDescriptor::number(self.slit_spacing).label("Slit spacing"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "slitCount" => self.slit_count = number_arg(name, value)?.max(1.0) as u32,
            "slitWidth" => self.slit_width = number_arg(name, value)?.max(0.0),
            "slitSpacing" => self.slit_spacing = number_arg(name, value)?.max(0.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Absorbing screen with a binned intensity pattern along its surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Screen {
    pub length: f64,
    pub bin_count: u32,
    #[serde(skip)]
    pub bins: Vec<f64>,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            length: 200.0,
            bin_count: 100,
            bins: Vec::new(),
        }
    }
}

impl Screen {
    pub fn reset(&mut self) {
        self.bins = vec![0.0; self.bin_count.max(1) as usize];
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        if self.bins.len() != self.bin_count.max(1) as usize {
            self.reset();
        }
        let idx = bin_index(radial_of(frame, hit), self.length, self.bins.len());
        self.bins[idx] += ray.intensity;
        ray.terminate(TerminationReason::AbsorbedScreen);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "binCount",
                PropertyDescriptor::range(self.bin_count as f64, 4.0, 1024.0, 1.0)
                    .label("Bins"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "binCount" => {
                self.bin_count = number_arg(name, value)?.clamp(1.0, 65536.0) as u32;
                self.bins.clear();
            }
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Photodiode {
    pub length: f64,
    #[serde(skip)]
    pub measured_power: f64,
    #[serde(skip)]
    pub hit_count: u64,
}

impl Default for Photodiode {
    fn default() -> Self {
        Self {
            length: 30.0,
            measured_power: 0.0,
            hit_count: 0,
        }
    }
}

impl Photodiode {
    pub fn reset(&mut self) {
        self.measured_power = 0.0;
        self.hit_count = 0;
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        _hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        self.measured_power += ray.intensity;
        self.hit_count += 1;
        ray.terminate(TerminationReason::AbsorbedDetector);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Active width"),
            )
            .push(
                "measuredPower",
                PropertyDescriptor::number(self.measured_power)
                    .label("Measured power")
                    .readonly(),
            )
            .push(
                "hitCount",
                PropertyDescriptor::number(self.hit_count as f64)
                    .label("Hits")
                    .readonly(),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "measuredPower" | "hitCount" => Err(PropertyError::Invalid {
                name: name.to_string(),
                reason: "read-only".to_string(),
            })?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Binned sensor like a screen, plus an integrated exposure total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CcdCamera {
    pub length: f64,
    pub bin_count: u32,
    #[serde(skip)]
    pub bins: Vec<f64>,
    #[serde(skip)]
    pub total_exposure: f64,
}

impl Default for CcdCamera {
    fn default() -> Self {
        Self {
            length: 100.0,
            bin_count: 64,
            bins: Vec::new(),
            total_exposure: 0.0,
        }
    }
}

impl CcdCamera {
    pub fn reset(&mut self) {
        self.bins = vec![0.0; self.bin_count.max(1) as usize];
        self.total_exposure = 0.0;
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        if self.bins.len() != self.bin_count.max(1) as usize {
            self.reset();
        }
        let idx = bin_index(radial_of(frame, hit), self.length, self.bins.len());
        self.bins[idx] += ray.intensity;
        self.total_exposure += ray.intensity;
        ray.terminate(TerminationReason::AbsorbedDetector);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Sensor width"),
            )
            .push(
                "binCount",
                PropertyDescriptor::range(self.bin_count as f64, 4.0, 4096.0, 1.0)
                    .label("Pixels"),
            )
            .push(
                "totalExposure",
                PropertyDescriptor::number(self.total_exposure)
                    .label("Total exposure")
                    .readonly(),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "binCount" => {
                self.bin_count = number_arg(name, value)?.clamp(1.0, 65536.0) as u32;
                self.bins.clear();
            }
            "totalExposure" => Err(PropertyError::Invalid {
                name: name.to_string(),
                reason: "read-only".to_string(),
            })?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Wavelength-resolving detector. The grating internals are not modeled;
/// incident rays stop with `unimplemented_component`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Spectrometer {
    pub length: f64,
}

impl Default for Spectrometer {
    fn default() -> Self {
        Self { length: 60.0 }
    }
}

impl Spectrometer {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(&mut self, ray: &mut Ray) -> Result<Vec<Ray>, InteractionError> {
        ray.terminate(TerminationReason::UnimplementedComponent);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new().push(
            "length",
            PropertyDescriptor::number(self.length).label("Entrance width"),
        )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PowerMeter {
    pub length: f64,
    #[serde(skip)]
    pub measured_power: f64,
}

impl Default for PowerMeter {
    fn default() -> Self {
        Self {
            length: 50.0,
            measured_power: 0.0,
        }
    }
}

impl PowerMeter {
    pub fn reset(&mut self) {
        self.measured_power = 0.0;
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        _hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        self.measured_power += ray.intensity;
        ray.terminate(TerminationReason::AbsorbedDetector);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Sensor width"),
            )
            .push(
                "measuredPower",
                PropertyDescriptor::number(self.measured_power)
                    .label("Measured power")
                    .readonly(),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "measuredPower" => Err(PropertyError::Invalid {
                name: name.to_string(),
                reason: "read-only".to_string(),
            })?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Histogram of incident linear-polarization angles, 10° bins over 180°.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolarizationAnalyzer {
    pub length: f64,
    #[serde(skip)]
    pub angle_bins: Vec<f64>,
    #[serde(skip)]
    pub total_power: f64,
}

pub const POLARIZATION_BIN_COUNT: usize = 18;

impl Default for PolarizationAnalyzer {
    fn default() -> Self {
        Self {
            length: 30.0,
            angle_bins: Vec::new(),
            total_power: 0.0,
        }
    }
}

impl PolarizationAnalyzer {
    pub fn reset(&mut self) {
        self.angle_bins = vec![0.0; POLARIZATION_BIN_COUNT];
        self.total_power = 0.0;
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        _hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        if self.angle_bins.len() != POLARIZATION_BIN_COUNT {
            self.reset();
        }
        self.total_power += ray.intensity;
        match ray.polarization {
            Polarization::Linear { angle_rad } => {
                let normalized = angle_rad.rem_euclid(std::f64::consts::PI);
                let idx = ((normalized / std::f64::consts::PI * POLARIZATION_BIN_COUNT as f64)
                    as usize)
                    .min(POLARIZATION_BIN_COUNT - 1);
                self.angle_bins[idx] += ray.intensity;
            }
            Polarization::Unpolarized | Polarization::Circular => {
                // Uniform response across analyzer angles.
                let share = ray.intensity / POLARIZATION_BIN_COUNT as f64;
                for bin in &mut self.angle_bins {
                    *bin += share;
                }
            }
        }
        ray.terminate(TerminationReason::AbsorbedDetector);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Sensor width"),
            )
            .push(
                "totalPower",
                PropertyDescriptor::number(self.total_power)
                    .label("Total power")
                    .readonly(),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "totalPower" => Err(PropertyError::Invalid {
                name: name.to_string(),
                reason: "read-only".to_string(),
            })?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}
