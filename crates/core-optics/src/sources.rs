//! Light sources.
//!
//! Every source emits along `angle_rad` from `pos` with `animate_arrow` set
//! and `source_id` stamped. Sources have no optical surface of their own (a
//! reflected beam passes straight through its emitter); the housing length
//! below only sizes the selection footprint. Multi-ray sources divide the
//! base intensity across their rays unless the source opts out of decay.

use core_geom::Vec2;
use core_ray::{Polarization, Ray, RaySpec, TraceConfig};
use serde::{Deserialize, Serialize};

use crate::geometry::ElementFrame;
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, bool_arg, number_arg, text_arg,
};

/// Selection/draw footprint of a source body.
pub const HOUSING_LENGTH: f64 = 20.0;

/// Representative sample used by white-light fast mode.
const FAST_WHITE_WAVELENGTHS: [f64; 7] = [410.0, 460.0, 510.0, 550.0, 590.0, 630.0, 680.0];

fn emit(rays: &mut Vec<Ray>, spec: RaySpec, cfg: &TraceConfig) {
    match Ray::new(spec, cfg) {
        Ok(mut ray) => {
            ray.animate_arrow = true;
            rays.push(ray);
        }
        Err(err) => {
            tracing::warn!(target: "optics.source", %err, "dropping invalid emitted ray");
        }
    }
}

fn clamp_count(requested: u32, cfg: &TraceConfig) -> u32 {
    requested.clamp(1, cfg.max_rays_per_source.max(1))
}

fn polarization_entries(table: PropertyTable, pol: &Polarization) -> PropertyTable {
    let (mode, angle_deg) = match pol {
        Polarization::Unpolarized => ("unpolarized", 0.0),
        Polarization::Linear { angle_rad } => ("linear", angle_rad.to_degrees()),
        Polarization::Circular => ("circular", 0.0),
    };
    let mut angle = PropertyDescriptor::range(angle_deg, -90.0, 90.0, 1.0)
        .label("Polarization angle (deg)");
    angle.disabled = !matches!(pol, Polarization::Linear { .. });
    table
        .push(
            "polarization",
            PropertyDescriptor::select(mode, &["unpolarized", "linear", "circular"])
                .label("Polarization"),
        )
        .push("polarizationAngleDeg", angle)
}

/// Shared setter for the two polarization entries. Returns `None` when the
/// name belongs to neither.
fn set_polarization_entry(
    pol: &mut Polarization,
    name: &str,
    value: &PropValue,
) -> Option<Result<(), PropertyError>> {
    match name {
        "polarization" => Some(match text_arg(name, value) {
            Ok("unpolarized") => {
                *pol = Polarization::Unpolarized;
                Ok(())
            }
            Ok("linear") => {
                let angle_rad = match *pol {
                    Polarization::Linear { angle_rad } => angle_rad,
                    _ => 0.0,
                };
                *pol = Polarization::Linear { angle_rad };
                Ok(())
            }
            Ok("circular") => {
                *pol = Polarization::Circular;
                Ok(())
            }
            Ok(other) => Err(PropertyError::Invalid {
                name: name.to_string(),
                reason: format!("unknown polarization `{other}`"),
            }),
            Err(e) => Err(e),
        }),
        "polarizationAngleDeg" => Some(match number_arg(name, value) {
            Ok(deg) => {
                *pol = Polarization::Linear {
                    angle_rad: deg.to_radians(),
                };
                Ok(())
            }
            Err(e) => Err(e),
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LaserSource {
    pub wavelength_nm: f64,
    pub intensity: f64,
    pub polarization: Polarization,
    pub beam_width: f64,
    pub ignore_decay: bool,
}

impl Default for LaserSource {
    fn default() -> Self {
        Self {
            wavelength_nm: 632.8,
            intensity: 1.0,
            polarization: Polarization::Unpolarized,
            beam_width: 0.0,
            ignore_decay: false,
        }
    }
}

impl LaserSource {
    pub fn generate_rays(&self, id: &str, frame: &ElementFrame, cfg: &TraceConfig) -> Vec<Ray> {
        let mut rays = Vec::with_capacity(1);
        let mut spec = RaySpec::emitted(
            frame.pos,
            Vec2::from_angle(frame.angle_rad),
            self.wavelength_nm,
            self.intensity,
            id,
        );
        spec.polarization = self.polarization;
        spec.beam_width = self.beam_width;
        spec.ignore_decay = self.ignore_decay;
        emit(&mut rays, spec, cfg);
        rays
    }

    pub fn properties(&self) -> PropertyTable {
        let table = PropertyTable::new()
            .push(
                "wavelengthNm",
                PropertyDescriptor::range(self.wavelength_nm, 380.0, 780.0, 0.1)
                    .label("Wavelength (nm)"),
            )
            .push(
                "intensity",
                PropertyDescriptor::range(self.intensity, 0.0, 10.0, 0.01).label("Intensity"),
            )
            .push(
                "beamWidth",
                PropertyDescriptor::number(self.beam_width)
                    .label("Beam width (mm)")
                    .title("Gaussian rendering hint; zero draws a plain line"),
            )
            .push(
                "ignoreDecay",
                PropertyDescriptor::checkbox(self.ignore_decay).label("Ignore decay"),
            );
        polarization_entries(table, &self.polarization)
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        if let Some(result) = set_polarization_entry(&mut self.polarization, name, value) {
            return result;
        }
        match name {
            "wavelengthNm" => self.wavelength_nm = number_arg(name, value)?,
            "intensity" => self.intensity = number_arg(name, value)?.max(0.0),
            "beamWidth" => self.beam_width = number_arg(name, value)?.max(0.0),
            "ignoreDecay" => self.ignore_decay = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FanSource {
    pub wavelength_nm: f64,
    pub intensity: f64,
    pub ray_count: u32,
    pub fan_angle_deg: f64,
    pub ignore_decay: bool,
}

impl Default for FanSource {
    fn default() -> Self {
        Self {
            wavelength_nm: 632.8,
            intensity: 1.0,
            ray_count: 9,
            fan_angle_deg: 30.0,
            ignore_decay: false,
        }
    }
}

impl FanSource {
    pub fn generate_rays(&self, id: &str, frame: &ElementFrame, cfg: &TraceConfig) -> Vec<Ray> {
        let n = clamp_count(self.ray_count, cfg);
        let per_ray = if self.ignore_decay {
            self.intensity
        } else {
            self.intensity / n as f64
        };
        let fan = self.fan_angle_deg.to_radians();
        let mut rays = Vec::with_capacity(n as usize);
        for i in 0..n {
            let offset = if n == 1 {
                0.0
            } else {
                -fan / 2.0 + fan * i as f64 / (n - 1) as f64
            };
            let mut spec = RaySpec::emitted(
                frame.pos,
                Vec2::from_angle(frame.angle_rad + offset),
                self.wavelength_nm,
                per_ray,
                id,
            );
            spec.ignore_decay = self.ignore_decay;
            emit(&mut rays, spec, cfg);
        }
        rays
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "wavelengthNm",
                PropertyDescriptor::range(self.wavelength_nm, 380.0, 780.0, 0.1)
                    .label("Wavelength (nm)"),
            )
            .push(
                "intensity",
                PropertyDescriptor::range(self.intensity, 0.0, 10.0, 0.01).label("Intensity"),
            )
            .push(
                "rayCount",
                PropertyDescriptor::range(self.ray_count as f64, 1.0, 100.0, 1.0)
                    .label("Ray count"),
            )
            .push(
                "fanAngleDeg",
                PropertyDescriptor::range(self.fan_angle_deg, 1.0, 180.0, 1.0)
                    .label("Fan angle (deg)"),
            )
            .push(
                "ignoreDecay",
                PropertyDescriptor::checkbox(self.ignore_decay).label("Ignore decay"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "wavelengthNm" => self.wavelength_nm = number_arg(name, value)?,
            "intensity" => self.intensity = number_arg(name, value)?.max(0.0),
            "rayCount" => self.ray_count = number_arg(name, value)?.max(1.0) as u32,
            "fanAngleDeg" => self.fan_angle_deg = number_arg(name, value)?.clamp(0.0, 360.0),
            "ignoreDecay" => self.ignore_decay = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineSource {
    pub wavelength_nm: f64,
    pub intensity: f64,
    pub ray_count: u32,
    pub length: f64,
    pub ignore_decay: bool,
}

impl Default for LineSource {
    fn default() -> Self {
        Self {
            wavelength_nm: 632.8,
            intensity: 1.0,
            ray_count: 9,
            length: 100.0,
            ignore_decay: false,
        }
    }
}

impl LineSource {
    pub fn generate_rays(&self, id: &str, frame: &ElementFrame, cfg: &TraceConfig) -> Vec<Ray> {
        let n = clamp_count(self.ray_count, cfg);
        let per_ray = if self.ignore_decay {
            self.intensity
        } else {
            self.intensity / n as f64
        };
        let dir = Vec2::from_angle(frame.angle_rad);
        // Emission points spread perpendicular to the beam, forming a
        // parallel sheet.
        let across = frame.normal();
        let mut rays = Vec::with_capacity(n as usize);
        for i in 0..n {
            let t = if n == 1 {
                0.0
            } else {
                (i as f64 / (n - 1) as f64 - 0.5) * self.length
            };
            let mut spec = RaySpec::emitted(
                frame.pos.add(across.scale(t)),
                dir,
                self.wavelength_nm,
                per_ray,
                id,
            );
            spec.ignore_decay = self.ignore_decay;
            emit(&mut rays, spec, cfg);
        }
        rays
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "wavelengthNm",
                PropertyDescriptor::range(self.wavelength_nm, 380.0, 780.0, 0.1)
                    .label("Wavelength (nm)"),
            )
            .push(
                "intensity",
                PropertyDescriptor::range(self.intensity, 0.0, 10.0, 0.01).label("Intensity"),
            )
            .push(
                "rayCount",
                PropertyDescriptor::range(self.ray_count as f64, 1.0, 100.0, 1.0)
                    .label("Ray count"),
            )
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "ignoreDecay",
                PropertyDescriptor::checkbox(self.ignore_decay).label("Ignore decay"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "wavelengthNm" => self.wavelength_nm = number_arg(name, value)?,
            "intensity" => self.intensity = number_arg(name, value)?.max(0.0),
            "rayCount" => self.ray_count = number_arg(name, value)?.max(1.0) as u32,
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "ignoreDecay" => self.ignore_decay = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WhiteLightSource {
    pub intensity: f64,
    pub ray_count: u32,
    pub ignore_decay: bool,
}

impl Default for WhiteLightSource {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            ray_count: 12,
            ignore_decay: false,
        }
    }
}

impl WhiteLightSource {
    pub fn generate_rays(&self, id: &str, frame: &ElementFrame, cfg: &TraceConfig) -> Vec<Ray> {
        let dir = Vec2::from_angle(frame.angle_rad);
        let wavelengths: Vec<f64> = if cfg.fast_white_light {
            FAST_WHITE_WAVELENGTHS.to_vec()
        } else {
            let n = clamp_count(self.ray_count.max(2), cfg).max(2);
            (0..n)
                .map(|i| 380.0 + 400.0 * i as f64 / (n - 1) as f64)
                .collect()
        };
        let per_ray = if self.ignore_decay {
            self.intensity
        } else {
            self.intensity / wavelengths.len() as f64
        };
        let mut rays = Vec::with_capacity(wavelengths.len());
        for wavelength_nm in wavelengths {
            let mut spec = RaySpec::emitted(frame.pos, dir, wavelength_nm, per_ray, id);
            spec.ignore_decay = self.ignore_decay;
            emit(&mut rays, spec, cfg);
        }
        rays
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "intensity",
                PropertyDescriptor::range(self.intensity, 0.0, 10.0, 0.01).label("Intensity"),
            )
            .push(
                "rayCount",
                PropertyDescriptor::range(self.ray_count as f64, 2.0, 100.0, 1.0)
                    .label("Spectral samples")
                    .title("Ignored in fast white-light mode"),
            )
            .push(
                "ignoreDecay",
                PropertyDescriptor::checkbox(self.ignore_decay).label("Ignore decay"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "intensity" => self.intensity = number_arg(name, value)?.max(0.0),
            "rayCount" => self.ray_count = number_arg(name, value)?.max(2.0) as u32,
            "ignoreDecay" => self.ignore_decay = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointSource {
    pub wavelength_nm: f64,
    pub intensity: f64,
    pub ray_count: u32,
    pub ignore_decay: bool,
}

impl Default for PointSource {
    fn default() -> Self {
        Self {
            wavelength_nm: 589.0,
            intensity: 1.0,
            ray_count: 16,
            ignore_decay: false,
        }
    }
}

impl PointSource {
    pub fn generate_rays(&self, id: &str, frame: &ElementFrame, cfg: &TraceConfig) -> Vec<Ray> {
        let n = clamp_count(self.ray_count, cfg);
        let per_ray = if self.ignore_decay {
            self.intensity
        } else {
            self.intensity / n as f64
        };
        let mut rays = Vec::with_capacity(n as usize);
        for i in 0..n {
            let theta = frame.angle_rad + std::f64::consts::TAU * i as f64 / n as f64;
            let mut spec = RaySpec::emitted(
                frame.pos,
                Vec2::from_angle(theta),
                self.wavelength_nm,
                per_ray,
                id,
            );
            spec.ignore_decay = self.ignore_decay;
            emit(&mut rays, spec, cfg);
        }
        rays
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "wavelengthNm",
                PropertyDescriptor::range(self.wavelength_nm, 380.0, 780.0, 0.1)
                    .label("Wavelength (nm)"),
            )
            .push(
                "intensity",
                PropertyDescriptor::range(self.intensity, 0.0, 10.0, 0.01).label("Intensity"),
            )
            .push(
                "rayCount",
                PropertyDescriptor::range(self.ray_count as f64, 4.0, 360.0, 1.0)
                    .label("Ray count"),
            )
            .push(
                "ignoreDecay",
                PropertyDescriptor::checkbox(self.ignore_decay).label("Ignore decay"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "wavelengthNm" => self.wavelength_nm = number_arg(name, value)?,
            "intensity" => self.intensity = number_arg(name, value)?.max(0.0),
            "rayCount" => self.ray_count = number_arg(name, value)?.max(1.0) as u32,
            "ignoreDecay" => self.ignore_decay = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedSource {
    pub center_wavelength_nm: f64,
    pub bandwidth_nm: f64,
    pub intensity: f64,
    pub ray_count: u32,
    pub spread_deg: f64,
    pub ignore_decay: bool,
}

impl Default for LedSource {
    fn default() -> Self {
        Self {
            center_wavelength_nm: 520.0,
            bandwidth_nm: 40.0,
            intensity: 1.0,
            ray_count: 9,
            spread_deg: 60.0,
            ignore_decay: false,
        }
    }
}

impl LedSource {
    pub fn generate_rays(&self, id: &str, frame: &ElementFrame, cfg: &TraceConfig) -> Vec<Ray> {
        let n = clamp_count(self.ray_count, cfg);
        let per_ray = if self.ignore_decay {
            self.intensity
        } else {
            self.intensity / n as f64
        };
        let spread = self.spread_deg.to_radians();
        let mut rays = Vec::with_capacity(n as usize);
        for i in 0..n {
            let frac = if n == 1 {
                0.5
            } else {
                i as f64 / (n - 1) as f64
            };
            let offset = (frac - 0.5) * spread;
            let wavelength = self.center_wavelength_nm + (frac - 0.5) * self.bandwidth_nm;
            let mut spec = RaySpec::emitted(
                frame.pos,
                Vec2::from_angle(frame.angle_rad + offset),
                wavelength,
                per_ray,
                id,
            );
            spec.ignore_decay = self.ignore_decay;
            emit(&mut rays, spec, cfg);
        }
        rays
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "centerWavelengthNm",
                PropertyDescriptor::range(self.center_wavelength_nm, 380.0, 780.0, 0.1)
                    .label("Center wavelength (nm)"),
            )
            .push(
                "bandwidthNm",
                PropertyDescriptor::range(self.bandwidth_nm, 0.0, 200.0, 1.0)
                    .label("Bandwidth (nm)"),
            )
            .push(
                "intensity",
                PropertyDescriptor::range(self.intensity, 0.0, 10.0, 0.01).label("Intensity"),
            )
            .push(
                "rayCount",
                PropertyDescriptor::range(self.ray_count as f64, 1.0, 100.0, 1.0)
                    .label("Ray count"),
            )
            .push(
                "spreadDeg",
                PropertyDescriptor::range(self.spread_deg, 0.0, 180.0, 1.0)
                    .label("Spread (deg)"),
            )
            .push(
                "ignoreDecay",
                PropertyDescriptor::checkbox(self.ignore_decay).label("Ignore decay"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "centerWavelengthNm" => self.center_wavelength_nm = number_arg(name, value)?,
            "bandwidthNm" => self.bandwidth_nm = number_arg(name, value)?.max(0.0),
            "intensity" => self.intensity = number_arg(name, value)?.max(0.0),
            "rayCount" => self.ray_count = number_arg(name, value)?.max(1.0) as u32,
            "spreadDeg" => self.spread_deg = number_arg(name, value)?.clamp(0.0, 360.0),
            "ignoreDecay" => self.ignore_decay = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PulsedLaserSource {
    pub wavelength_nm: f64,
    pub peak_intensity: f64,
    /// Fraction of a repetition period the pulse is on; scales the
    /// time-averaged emitted intensity.
    pub duty_factor: f64,
    pub polarization: Polarization,
    pub beam_width: f64,
    pub ignore_decay: bool,
}

impl Default for PulsedLaserSource {
    fn default() -> Self {
        Self {
            wavelength_nm: 1064.0,
            peak_intensity: 1.0,
            duty_factor: 0.1,
            polarization: Polarization::Unpolarized,
            beam_width: 0.0,
            ignore_decay: false,
        }
    }
}

impl PulsedLaserSource {
    pub fn generate_rays(&self, id: &str, frame: &ElementFrame, cfg: &TraceConfig) -> Vec<Ray> {
        let mut rays = Vec::with_capacity(1);
        let mut spec = RaySpec::emitted(
            frame.pos,
            Vec2::from_angle(frame.angle_rad),
            self.wavelength_nm,
            self.peak_intensity * self.duty_factor.clamp(0.0, 1.0),
            id,
        );
        spec.polarization = self.polarization;
        spec.beam_width = self.beam_width;
        spec.ignore_decay = self.ignore_decay;
        emit(&mut rays, spec, cfg);
        rays
    }

    pub fn properties(&self) -> PropertyTable {
        let table = PropertyTable::new()
            .push(
                "wavelengthNm",
                PropertyDescriptor::range(self.wavelength_nm, 380.0, 780.0, 0.1)
                    .label("Wavelength (nm)"),
            )
            .push(
                "peakIntensity",
                PropertyDescriptor::range(self.peak_intensity, 0.0, 100.0, 0.1)
                    .label("Peak intensity"),
            )
            .push(
                "dutyFactor",
                PropertyDescriptor::range(self.duty_factor, 0.0, 1.0, 0.01).label("Duty factor"),
            )
            .push(
                "beamWidth",
                PropertyDescriptor::number(self.beam_width).label("Beam width (mm)"),
            )
            .push(
                "ignoreDecay",
                PropertyDescriptor::checkbox(self.ignore_decay).label("Ignore decay"),
            );
        polarization_entries(table, &self.polarization)
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        if let Some(result) = set_polarization_entry(&mut self.polarization, name, value) {
            return result;
        }
        match name {
            "wavelengthNm" => self.wavelength_nm = number_arg(name, value)?,
            "peakIntensity" => self.peak_intensity = number_arg(name, value)?.max(0.0),
            "dutyFactor" => self.duty_factor = number_arg(name, value)?.clamp(0.0, 1.0),
            "beamWidth" => self.beam_width = number_arg(name, value)?.max(0.0),
            "ignoreDecay" => self.ignore_decay = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}
