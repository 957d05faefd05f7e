//! Optical component hierarchy.
//!
//! A [`Component`] couples the fields every element shares (id, label,
//! position, orientation, selection state) with a [`ComponentKind`] carrying
//! the per-variant parameters. Capability dispatch is match-based: sources
//! implement `generate_rays`, interactors implement `intersect`/`interact`,
//! and the optical fiber exposes its own two-stage coupling hooks. The trace
//! engine never inspects variant names.
//!
//! Frame convention: for planar elements `angle_rad` is the direction the
//! surface extends along (a vertical mirror has `angle_rad = π/2`).
//! Polarization axes and fiber axes are separate properties.

pub mod detectors;
pub mod dispersive;
pub mod geometry;
pub mod lenses;
pub mod mirrors;
pub mod misc;
pub mod polarizing;
pub mod properties;
pub mod serde_util;
pub mod sources;
pub mod transport;

use core_geom::Vec2;
use core_ray::{Ray, RayError, TerminationReason, TraceConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use geometry::{ElementFrame, HIT_EPSILON};
pub use properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyKind, PropertyTable,
};

pub use detectors::{
    Aperture, CcdCamera, Photodiode, PolarizationAnalyzer, PowerMeter, Screen,
};
pub use dispersive::{DielectricBlock, DiffractionGrating, Prism};
pub use lenses::{AsphericLens, CylindricalLens, GrinLens, ThinLens};
pub use mirrors::{
    DichroicMirror, MetallicMirror, Mirror, ParabolicMirror, RingMirror, SphericalMirror,
};
pub use detectors::Spectrometer;
pub use misc::{AtomicCell, CustomComponent, FabryPerotCavity, MagneticCoil};
pub use polarizing::{
    BeamSplitter, FaradayIsolator, FaradayRotator, HalfWavePlate, Polarizer, QuarterWavePlate,
    WollastonPrism,
};
pub use sources::{
    FanSource, LaserSource, LedSource, LineSource, PointSource, PulsedLaserSource,
    WhiteLightSource,
};
pub use transport::{
    AcoustoOpticModulator, ElectroOpticModulator, OpticalChopper, OpticalFiber,
    VariableAttenuator,
};

/// One candidate intersection between a ray and a component surface.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    /// Distance from the ray origin, always `> HIT_EPSILON`.
    pub distance: f64,
    pub point: Vec2,
    /// Unit normal oriented against the incoming ray.
    pub normal: Vec2,
    /// Opaque per-component surface tag (edge index, facet id).
    pub surface: u32,
    pub extra: HitExtra,
}

/// Component-specific payload attached to a hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitExtra {
    None,
    /// Which way a dielectric face was crossed.
    Face { entering: bool },
    /// Signed offset from the element center along the surface.
    Radial(f64),
}

/// Failure inside a component's `interact`; the engine absorbs it and
/// terminates the ray with `interaction_error`.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("non-finite result in {context}")]
    NonFinite { context: &'static str },
    #[error(transparent)]
    Ray(#[from] RayError),
}

/// How the animation arbitration treats this component's successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowClass {
    BeamSplitter,
    Dielectric,
    Default,
}

/// Renderer hint for the component footprint.
#[derive(Debug, Clone)]
pub enum DrawHint {
    Segment(Vec2, Vec2),
    Polygon(Vec<Vec2>),
    Circle { center: Vec2, radius: f64 },
    Marker(Vec2),
}

/// Loss factor applied to a successor, honoring the source's decay opt-out.
pub(crate) fn loss(ray: &Ray, factor: f64) -> f64 {
    if ray.ignore_decay { 1.0 } else { factor }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComponentKind {
    LaserSource(LaserSource),
    FanSource(FanSource),
    LineSource(LineSource),
    WhiteLightSource(WhiteLightSource),
    PointSource(PointSource),
    #[serde(rename = "LEDSource")]
    LedSource(LedSource),
    PulsedLaserSource(PulsedLaserSource),
    Mirror(Mirror),
    SphericalMirror(SphericalMirror),
    ParabolicMirror(ParabolicMirror),
    DichroicMirror(DichroicMirror),
    MetallicMirror(MetallicMirror),
    RingMirror(RingMirror),
    ThinLens(ThinLens),
    CylindricalLens(CylindricalLens),
    AsphericLens(AsphericLens),
    #[serde(rename = "GRINLens")]
    GrinLens(GrinLens),
    Polarizer(Polarizer),
    HalfWavePlate(HalfWavePlate),
    QuarterWavePlate(QuarterWavePlate),
    BeamSplitter(BeamSplitter),
    WollastonPrism(WollastonPrism),
    FaradayRotator(FaradayRotator),
    FaradayIsolator(FaradayIsolator),
    DielectricBlock(DielectricBlock),
    Prism(Prism),
    DiffractionGrating(DiffractionGrating),
    Aperture(Aperture),
    Screen(Screen),
    Photodiode(Photodiode),
    #[serde(rename = "CCDCamera")]
    CcdCamera(CcdCamera),
    Spectrometer(Spectrometer),
    PowerMeter(PowerMeter),
    PolarizationAnalyzer(PolarizationAnalyzer),
    OpticalFiber(OpticalFiber),
    AcoustoOpticModulator(AcoustoOpticModulator),
    ElectroOpticModulator(ElectroOpticModulator),
    VariableAttenuator(VariableAttenuator),
    OpticalChopper(OpticalChopper),
    AtomicCell(AtomicCell),
    MagneticCoil(MagneticCoil),
    FabryPerotCavity(FabryPerotCavity),
    CustomComponent(CustomComponent),
}

/// A placed optical element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub pos: Vec2,
    pub angle_rad: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub kind: ComponentKind,
}

fn default_enabled() -> bool {
    true
}

impl Component {
    pub fn new(id: impl Into<String>, pos: Vec2, angle_rad: f64, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            pos,
            angle_rad,
            enabled: true,
            selected: false,
            notes: String::new(),
            kind,
        }
    }

    fn frame(&self) -> ElementFrame {
        ElementFrame::new(self.pos, self.angle_rad)
    }

    /// Canonical variant name, identical to the serialized `type` tag.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ComponentKind::LaserSource(_) => "LaserSource",
            ComponentKind::FanSource(_) => "FanSource",
            ComponentKind::LineSource(_) => "LineSource",
            ComponentKind::WhiteLightSource(_) => "WhiteLightSource",
            ComponentKind::PointSource(_) => "PointSource",
            ComponentKind::LedSource(_) => "LEDSource",
            ComponentKind::PulsedLaserSource(_) => "PulsedLaserSource",
            ComponentKind::Mirror(_) => "Mirror",
            ComponentKind::SphericalMirror(_) => "SphericalMirror",
            ComponentKind::ParabolicMirror(_) => "ParabolicMirror",
            ComponentKind::DichroicMirror(_) => "DichroicMirror",
            ComponentKind::MetallicMirror(_) => "MetallicMirror",
            ComponentKind::RingMirror(_) => "RingMirror",
            ComponentKind::ThinLens(_) => "ThinLens",
            ComponentKind::CylindricalLens(_) => "CylindricalLens",
            ComponentKind::AsphericLens(_) => "AsphericLens",
            ComponentKind::GrinLens(_) => "GRINLens",
            ComponentKind::Polarizer(_) => "Polarizer",
            ComponentKind::HalfWavePlate(_) => "HalfWavePlate",
            ComponentKind::QuarterWavePlate(_) => "QuarterWavePlate",
            ComponentKind::BeamSplitter(_) => "BeamSplitter",
            ComponentKind::WollastonPrism(_) => "WollastonPrism",
            ComponentKind::FaradayRotator(_) => "FaradayRotator",
            ComponentKind::FaradayIsolator(_) => "FaradayIsolator",
            ComponentKind::DielectricBlock(_) => "DielectricBlock",
            ComponentKind::Prism(_) => "Prism",
            ComponentKind::DiffractionGrating(_) => "DiffractionGrating",
            ComponentKind::Aperture(_) => "Aperture",
            ComponentKind::Screen(_) => "Screen",
            ComponentKind::Photodiode(_) => "Photodiode",
            ComponentKind::CcdCamera(_) => "CCDCamera",
            ComponentKind::Spectrometer(_) => "Spectrometer",
            ComponentKind::PowerMeter(_) => "PowerMeter",
            ComponentKind::PolarizationAnalyzer(_) => "PolarizationAnalyzer",
            ComponentKind::OpticalFiber(_) => "OpticalFiber",
            ComponentKind::AcoustoOpticModulator(_) => "AcoustoOpticModulator",
            ComponentKind::ElectroOpticModulator(_) => "ElectroOpticModulator",
            ComponentKind::VariableAttenuator(_) => "VariableAttenuator",
            ComponentKind::OpticalChopper(_) => "OpticalChopper",
            ComponentKind::AtomicCell(_) => "AtomicCell",
            ComponentKind::MagneticCoil(_) => "MagneticCoil",
            ComponentKind::FabryPerotCavity(_) => "FabryPerotCavity",
            ComponentKind::CustomComponent(_) => "CustomComponent",
        }
    }

    /// Short lowercase stem used for id allocation (`mirror-3`).
    pub fn kind_key(&self) -> &'static str {
        self.kind.key()
    }
}

impl ComponentKind {
    /// Default-constructed kind for a serialized `type` tag; `None` for
    /// unknown names (the deserializer skips those with a warning).
    pub fn from_type_name(type_name: &str) -> Option<ComponentKind> {
        Some(match type_name {
            "LaserSource" => ComponentKind::LaserSource(LaserSource::default()),
            "FanSource" => ComponentKind::FanSource(FanSource::default()),
            "LineSource" => ComponentKind::LineSource(LineSource::default()),
            "WhiteLightSource" => ComponentKind::WhiteLightSource(WhiteLightSource::default()),
            "PointSource" => ComponentKind::PointSource(PointSource::default()),
            "LEDSource" => ComponentKind::LedSource(LedSource::default()),
            "PulsedLaserSource" => ComponentKind::PulsedLaserSource(PulsedLaserSource::default()),
            "Mirror" => ComponentKind::Mirror(Mirror::default()),
            "SphericalMirror" => ComponentKind::SphericalMirror(SphericalMirror::default()),
            "ParabolicMirror" => ComponentKind::ParabolicMirror(ParabolicMirror::default()),
            "DichroicMirror" => ComponentKind::DichroicMirror(DichroicMirror::default()),
            "MetallicMirror" => ComponentKind::MetallicMirror(MetallicMirror::default()),
            "RingMirror" => ComponentKind::RingMirror(RingMirror::default()),
            "ThinLens" => ComponentKind::ThinLens(ThinLens::default()),
            "CylindricalLens" => ComponentKind::CylindricalLens(CylindricalLens::default()),
            "AsphericLens" => ComponentKind::AsphericLens(AsphericLens::default()),
            "GRINLens" => ComponentKind::GrinLens(GrinLens::default()),
            "Polarizer" => ComponentKind::Polarizer(Polarizer::default()),
            "HalfWavePlate" => ComponentKind::HalfWavePlate(HalfWavePlate::default()),
            "QuarterWavePlate" => ComponentKind::QuarterWavePlate(QuarterWavePlate::default()),
            "BeamSplitter" => ComponentKind::BeamSplitter(BeamSplitter::default()),
            "WollastonPrism" => ComponentKind::WollastonPrism(WollastonPrism::default()),
            "FaradayRotator" => ComponentKind::FaradayRotator(FaradayRotator::default()),
            "FaradayIsolator" => ComponentKind::FaradayIsolator(FaradayIsolator::default()),
            "DielectricBlock" => ComponentKind::DielectricBlock(DielectricBlock::default()),
            "Prism" => ComponentKind::Prism(Prism::default()),
            "DiffractionGrating" => {
                ComponentKind::DiffractionGrating(DiffractionGrating::default())
            }
            "Aperture" => ComponentKind::Aperture(Aperture::default()),
            "Screen" => ComponentKind::Screen(Screen::default()),
            "Photodiode" => ComponentKind::Photodiode(Photodiode::default()),
            "CCDCamera" => ComponentKind::CcdCamera(CcdCamera::default()),
            "Spectrometer" => ComponentKind::Spectrometer(Spectrometer::default()),
            "PowerMeter" => ComponentKind::PowerMeter(PowerMeter::default()),
            "PolarizationAnalyzer" => {
                ComponentKind::PolarizationAnalyzer(PolarizationAnalyzer::default())
            }
            "OpticalFiber" => ComponentKind::OpticalFiber(OpticalFiber::default()),
            "AcoustoOpticModulator" => {
                ComponentKind::AcoustoOpticModulator(AcoustoOpticModulator::default())
            }
            "ElectroOpticModulator" => {
                ComponentKind::ElectroOpticModulator(ElectroOpticModulator::default())
            }
            "VariableAttenuator" => {
                ComponentKind::VariableAttenuator(VariableAttenuator::default())
            }
            "OpticalChopper" => ComponentKind::OpticalChopper(OpticalChopper::default()),
            "AtomicCell" => ComponentKind::AtomicCell(AtomicCell::default()),
            "MagneticCoil" => ComponentKind::MagneticCoil(MagneticCoil::default()),
            "FabryPerotCavity" => ComponentKind::FabryPerotCavity(FabryPerotCavity::default()),
            "CustomComponent" => ComponentKind::CustomComponent(CustomComponent::default()),
            _ => return None,
        })
    }

    /// Short lowercase stem used for id allocation.
    pub fn key(&self) -> &'static str {
        match self {
            ComponentKind::LaserSource(_) => "laser",
            ComponentKind::FanSource(_) => "fan",
            ComponentKind::LineSource(_) => "line-source",
            ComponentKind::WhiteLightSource(_) => "white-light",
            ComponentKind::PointSource(_) => "point-source",
            ComponentKind::LedSource(_) => "led",
            ComponentKind::PulsedLaserSource(_) => "pulsed-laser",
            ComponentKind::Mirror(_) => "mirror",
            ComponentKind::SphericalMirror(_) => "spherical-mirror",
            ComponentKind::ParabolicMirror(_) => "parabolic-mirror",
            ComponentKind::DichroicMirror(_) => "dichroic",
            ComponentKind::MetallicMirror(_) => "metallic-mirror",
            ComponentKind::RingMirror(_) => "ring-mirror",
            ComponentKind::ThinLens(_) => "lens",
            ComponentKind::CylindricalLens(_) => "cylindrical-lens",
            ComponentKind::AsphericLens(_) => "aspheric-lens",
            ComponentKind::GrinLens(_) => "grin-lens",
            ComponentKind::Polarizer(_) => "polarizer",
            ComponentKind::HalfWavePlate(_) => "hwp",
            ComponentKind::QuarterWavePlate(_) => "qwp",
            ComponentKind::BeamSplitter(_) => "beam-splitter",
            ComponentKind::WollastonPrism(_) => "wollaston",
            ComponentKind::FaradayRotator(_) => "faraday-rotator",
            ComponentKind::FaradayIsolator(_) => "faraday-isolator",
            ComponentKind::DielectricBlock(_) => "dielectric",
            ComponentKind::Prism(_) => "prism",
            ComponentKind::DiffractionGrating(_) => "grating",
            ComponentKind::Aperture(_) => "aperture",
            ComponentKind::Screen(_) => "screen",
            ComponentKind::Photodiode(_) => "photodiode",
            ComponentKind::CcdCamera(_) => "ccd",
            ComponentKind::Spectrometer(_) => "spectrometer",
            ComponentKind::PowerMeter(_) => "power-meter",
            ComponentKind::PolarizationAnalyzer(_) => "pol-analyzer",
            ComponentKind::OpticalFiber(_) => "fiber",
            ComponentKind::AcoustoOpticModulator(_) => "aom",
            ComponentKind::ElectroOpticModulator(_) => "eom",
            ComponentKind::VariableAttenuator(_) => "attenuator",
            ComponentKind::OpticalChopper(_) => "chopper",
            ComponentKind::AtomicCell(_) => "atomic-cell",
            ComponentKind::MagneticCoil(_) => "coil",
            ComponentKind::FabryPerotCavity(_) => "etalon",
            ComponentKind::CustomComponent(_) => "custom",
        }
    }
}

impl Component {
    pub fn is_source(&self) -> bool {
        matches!(
            self.kind,
            ComponentKind::LaserSource(_)
                | ComponentKind::FanSource(_)
                | ComponentKind::LineSource(_)
                | ComponentKind::WhiteLightSource(_)
                | ComponentKind::PointSource(_)
                | ComponentKind::LedSource(_)
                | ComponentKind::PulsedLaserSource(_)
        )
    }

    pub fn is_fiber(&self) -> bool {
        matches!(self.kind, ComponentKind::OpticalFiber(_))
    }

    /// Successor-animation category for the trace engine's arbitration.
    pub fn arrow_class(&self) -> ArrowClass {
        match &self.kind {
            ComponentKind::BeamSplitter(_) | ComponentKind::WollastonPrism(_) => {
                ArrowClass::BeamSplitter
            }
            ComponentKind::DielectricBlock(_) | ComponentKind::Prism(_) => ArrowClass::Dielectric,
            _ => ArrowClass::Default,
        }
    }

    /// Initial rays for one frame. Disabled or non-source components emit
    /// nothing.
    pub fn generate_rays(&self, cfg: &TraceConfig) -> Vec<Ray> {
        if !self.enabled {
            return Vec::new();
        }
        let frame = self.frame();
        match &self.kind {
            ComponentKind::LaserSource(s) => s.generate_rays(&self.id, &frame, cfg),
            ComponentKind::FanSource(s) => s.generate_rays(&self.id, &frame, cfg),
            ComponentKind::LineSource(s) => s.generate_rays(&self.id, &frame, cfg),
            ComponentKind::WhiteLightSource(s) => s.generate_rays(&self.id, &frame, cfg),
            ComponentKind::PointSource(s) => s.generate_rays(&self.id, &frame, cfg),
            ComponentKind::LedSource(s) => s.generate_rays(&self.id, &frame, cfg),
            ComponentKind::PulsedLaserSource(s) => s.generate_rays(&self.id, &frame, cfg),
            _ => Vec::new(),
        }
    }

    /// All candidate hits beyond [`HIT_EPSILON`], unordered. Non-finite
    /// candidates are discarded here so a numeric failure in one surface can
    /// only cost that hit, never the trace.
    pub fn intersect(&self, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        let frame = self.frame();
        let hits = match &self.kind {
            // Sources have no optical surface; a beam folded back onto its
            // emitter passes straight through.
            ComponentKind::LaserSource(_)
            | ComponentKind::FanSource(_)
            | ComponentKind::LineSource(_)
            | ComponentKind::WhiteLightSource(_)
            | ComponentKind::PointSource(_)
            | ComponentKind::LedSource(_)
            | ComponentKind::PulsedLaserSource(_) => Vec::new(),
            ComponentKind::Mirror(m) => m.intersect(&frame, origin, dir),
            ComponentKind::SphericalMirror(m) => m.intersect(&frame, origin, dir),
            ComponentKind::ParabolicMirror(m) => m.intersect(&frame, origin, dir),
            ComponentKind::DichroicMirror(m) => m.intersect(&frame, origin, dir),
            ComponentKind::MetallicMirror(m) => m.intersect(&frame, origin, dir),
            ComponentKind::RingMirror(m) => m.intersect(&frame, origin, dir),
            ComponentKind::ThinLens(l) => l.intersect(&frame, origin, dir),
            ComponentKind::CylindricalLens(l) => l.intersect(&frame, origin, dir),
            ComponentKind::AsphericLens(l) => l.intersect(&frame, origin, dir),
            ComponentKind::GrinLens(l) => l.intersect(&frame, origin, dir),
            ComponentKind::Polarizer(p) => p.intersect(&frame, origin, dir),
            ComponentKind::HalfWavePlate(p) => p.intersect(&frame, origin, dir),
            ComponentKind::QuarterWavePlate(p) => p.intersect(&frame, origin, dir),
            ComponentKind::BeamSplitter(p) => p.intersect(&frame, origin, dir),
            ComponentKind::WollastonPrism(p) => p.intersect(&frame, origin, dir),
            ComponentKind::FaradayRotator(p) => p.intersect(&frame, origin, dir),
            ComponentKind::FaradayIsolator(p) => p.intersect(&frame, origin, dir),
            ComponentKind::DielectricBlock(d) => d.intersect(&frame, origin, dir),
            ComponentKind::Prism(d) => d.intersect(&frame, origin, dir),
            ComponentKind::DiffractionGrating(d) => d.intersect(&frame, origin, dir),
            ComponentKind::Aperture(d) => d.intersect(&frame, origin, dir),
            ComponentKind::Screen(d) => d.intersect(&frame, origin, dir),
            ComponentKind::Photodiode(d) => d.intersect(&frame, origin, dir),
            ComponentKind::CcdCamera(d) => d.intersect(&frame, origin, dir),
            ComponentKind::Spectrometer(d) => d.intersect(&frame, origin, dir),
            ComponentKind::PowerMeter(d) => d.intersect(&frame, origin, dir),
            ComponentKind::PolarizationAnalyzer(d) => d.intersect(&frame, origin, dir),
            // The fiber input facet is handled by the dedicated coupling
            // pre-check, not the general intersect sweep.
            ComponentKind::OpticalFiber(_) => Vec::new(),
            ComponentKind::AcoustoOpticModulator(t) => t.intersect(&frame, origin, dir),
            ComponentKind::ElectroOpticModulator(t) => t.intersect(&frame, origin, dir),
            ComponentKind::VariableAttenuator(t) => t.intersect(&frame, origin, dir),
            ComponentKind::OpticalChopper(t) => t.intersect(&frame, origin, dir),
            ComponentKind::AtomicCell(m) => m.intersect(&frame, origin, dir),
            ComponentKind::MagneticCoil(_) => Vec::new(),
            ComponentKind::FabryPerotCavity(m) => m.intersect(&frame, origin, dir),
            ComponentKind::CustomComponent(m) => m.intersect(&frame, origin, dir),
        };
        admissible(hits)
    }

    /// Produce successors for a hit and terminate the incoming ray where a
    /// specific reason applies; the engine force-terminates the parent with
    /// `segment_end_after_interaction` otherwise.
    pub fn interact(&mut self, ray: &mut Ray, hit: &Hit) -> Result<Vec<Ray>, InteractionError> {
        let frame = ElementFrame::new(self.pos, self.angle_rad);
        match &mut self.kind {
            ComponentKind::LaserSource(_)
            | ComponentKind::FanSource(_)
            | ComponentKind::LineSource(_)
            | ComponentKind::WhiteLightSource(_)
            | ComponentKind::PointSource(_)
            | ComponentKind::LedSource(_)
            | ComponentKind::PulsedLaserSource(_) => {
                ray.terminate(TerminationReason::Blocked);
                Ok(Vec::new())
            }
            ComponentKind::Mirror(m) => m.interact(&frame, ray, hit),
            ComponentKind::SphericalMirror(m) => m.interact(&frame, ray, hit),
            ComponentKind::ParabolicMirror(m) => m.interact(&frame, ray, hit),
            ComponentKind::DichroicMirror(m) => m.interact(&frame, ray, hit),
            ComponentKind::MetallicMirror(m) => m.interact(&frame, ray, hit),
            ComponentKind::RingMirror(m) => m.interact(&frame, ray, hit),
            ComponentKind::ThinLens(l) => l.interact(&frame, ray, hit),
            ComponentKind::CylindricalLens(l) => l.interact(&frame, ray, hit),
            ComponentKind::AsphericLens(l) => l.interact(&frame, ray, hit),
            ComponentKind::GrinLens(l) => l.interact(&frame, ray, hit),
            ComponentKind::Polarizer(p) => p.interact(&frame, ray, hit),
            ComponentKind::HalfWavePlate(p) => p.interact(&frame, ray, hit),
            ComponentKind::QuarterWavePlate(p) => p.interact(&frame, ray, hit),
            ComponentKind::BeamSplitter(p) => p.interact(&frame, ray, hit),
            ComponentKind::WollastonPrism(p) => p.interact(&frame, ray, hit),
            ComponentKind::FaradayRotator(p) => p.interact(&frame, ray, hit),
            ComponentKind::FaradayIsolator(p) => p.interact(&frame, ray, hit),
            ComponentKind::DielectricBlock(d) => d.interact(&frame, ray, hit),
            ComponentKind::Prism(d) => d.interact(&frame, ray, hit),
            ComponentKind::DiffractionGrating(d) => d.interact(&frame, ray, hit),
            ComponentKind::Aperture(d) => d.interact(&frame, ray, hit),
            ComponentKind::Screen(d) => d.interact(&frame, ray, hit),
            ComponentKind::Photodiode(d) => d.interact(&frame, ray, hit),
            ComponentKind::CcdCamera(d) => d.interact(&frame, ray, hit),
            ComponentKind::Spectrometer(d) => d.interact(ray),
            ComponentKind::PowerMeter(d) => d.interact(&frame, ray, hit),
            ComponentKind::PolarizationAnalyzer(d) => d.interact(&frame, ray, hit),
            ComponentKind::OpticalFiber(_) => {
                // Reached only through the coupling pre-check.
                ray.terminate(TerminationReason::CapturedByFiber);
                Ok(Vec::new())
            }
            ComponentKind::AcoustoOpticModulator(t) => t.interact(&frame, ray, hit),
            ComponentKind::ElectroOpticModulator(t) => t.interact(&frame, ray, hit),
            ComponentKind::VariableAttenuator(t) => t.interact(&frame, ray, hit),
            ComponentKind::OpticalChopper(t) => t.interact(&frame, ray, hit),
            ComponentKind::AtomicCell(m) => m.interact(ray),
            ComponentKind::MagneticCoil(_) => Ok(Vec::new()),
            ComponentKind::FabryPerotCavity(m) => m.interact(&frame, ray, hit),
            ComponentKind::CustomComponent(m) => m.interact(&frame, ray, hit),
        }
    }

    /// Fiber coupling pre-check; `None` for every other component.
    pub fn check_input_coupling(&self, origin: Vec2, dir: Vec2) -> Option<Hit> {
        match &self.kind {
            ComponentKind::OpticalFiber(f) => f.check_input_coupling(&self.frame(), origin, dir),
            _ => None,
        }
    }

    /// Record a captured ray at the fiber input facet. No-op on non-fibers.
    pub fn handle_input_interaction(&mut self, ray: &mut Ray, hit: &Hit) {
        let frame = ElementFrame::new(self.pos, self.angle_rad);
        if let ComponentKind::OpticalFiber(f) = &mut self.kind {
            f.handle_input_interaction(&frame, ray, hit);
        }
    }

    /// Deferred output rays for the next frame. Empty on non-fibers.
    pub fn generate_output_rays(&self, cfg: &TraceConfig) -> Vec<Ray> {
        match &self.kind {
            ComponentKind::OpticalFiber(f) => f.generate_output_rays(&self.id, cfg),
            _ => Vec::new(),
        }
    }

    /// Clear per-trace accumulators (screen bins, detector counts, fiber
    /// captures).
    pub fn reset_accumulators(&mut self) {
        match &mut self.kind {
            ComponentKind::Screen(d) => d.reset(),
            ComponentKind::Photodiode(d) => d.reset(),
            ComponentKind::CcdCamera(d) => d.reset(),
            ComponentKind::PowerMeter(d) => d.reset(),
            ComponentKind::PolarizationAnalyzer(d) => d.reset(),
            ComponentKind::OpticalFiber(f) => f.reset(),
            _ => {}
        }
    }

    /// Ordered inspector table: common entries first, then the variant's.
    pub fn get_properties(&self) -> PropertyTable {
        let mut table = PropertyTable::new()
            .push("label", PropertyDescriptor::text(&self.label).label("Label"));
        if self.is_source() {
            table = table.push(
                "enabled",
                PropertyDescriptor::checkbox(self.enabled).label("Enabled"),
            );
        }
        let kind_table = match &self.kind {
            ComponentKind::LaserSource(s) => s.properties(),
            ComponentKind::FanSource(s) => s.properties(),
            ComponentKind::LineSource(s) => s.properties(),
            ComponentKind::WhiteLightSource(s) => s.properties(),
            ComponentKind::PointSource(s) => s.properties(),
            ComponentKind::LedSource(s) => s.properties(),
            ComponentKind::PulsedLaserSource(s) => s.properties(),
            ComponentKind::Mirror(m) => m.properties(),
            ComponentKind::SphericalMirror(m) => m.properties(),
            ComponentKind::ParabolicMirror(m) => m.properties(),
            ComponentKind::DichroicMirror(m) => m.properties(),
            ComponentKind::MetallicMirror(m) => m.properties(),
            ComponentKind::RingMirror(m) => m.properties(),
            ComponentKind::ThinLens(l) => l.properties(),
            ComponentKind::CylindricalLens(l) => l.properties(),
            ComponentKind::AsphericLens(l) => l.properties(),
            ComponentKind::GrinLens(l) => l.properties(),
            ComponentKind::Polarizer(p) => p.properties(),
            ComponentKind::HalfWavePlate(p) => p.properties(),
            ComponentKind::QuarterWavePlate(p) => p.properties(),
            ComponentKind::BeamSplitter(p) => p.properties(),
            ComponentKind::WollastonPrism(p) => p.properties(),
            ComponentKind::FaradayRotator(p) => p.properties(),
            ComponentKind::FaradayIsolator(p) => p.properties(),
            ComponentKind::DielectricBlock(d) => d.properties(),
            ComponentKind::Prism(d) => d.properties(),
            ComponentKind::DiffractionGrating(d) => d.properties(),
            ComponentKind::Aperture(d) => d.properties(),
            ComponentKind::Screen(d) => d.properties(),
            ComponentKind::Photodiode(d) => d.properties(),
            ComponentKind::CcdCamera(d) => d.properties(),
            ComponentKind::Spectrometer(d) => d.properties(),
            ComponentKind::PowerMeter(d) => d.properties(),
            ComponentKind::PolarizationAnalyzer(d) => d.properties(),
            ComponentKind::OpticalFiber(f) => f.properties(),
            ComponentKind::AcoustoOpticModulator(t) => t.properties(),
            ComponentKind::ElectroOpticModulator(t) => t.properties(),
            ComponentKind::VariableAttenuator(t) => t.properties(),
            ComponentKind::OpticalChopper(t) => t.properties(),
            ComponentKind::AtomicCell(m) => m.properties(),
            ComponentKind::MagneticCoil(m) => m.properties(),
            ComponentKind::FabryPerotCavity(m) => m.properties(),
            ComponentKind::CustomComponent(m) => m.properties(),
        };
        for (name, descriptor) in kind_table.iter() {
            table = table.push(name, descriptor.clone());
        }
        table.push(
            "notes",
            PropertyDescriptor::text(&self.notes).label("Notes"),
        )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "label" => {
                self.label = properties::text_arg(name, value)?.to_string();
                return Ok(());
            }
            "notes" => {
                self.notes = properties::text_arg(name, value)?.to_string();
                return Ok(());
            }
            "enabled" if self.is_source() => {
                self.enabled = properties::bool_arg(name, value)?;
                return Ok(());
            }
            _ => {}
        }
        match &mut self.kind {
            ComponentKind::LaserSource(s) => s.set_property(name, value),
            ComponentKind::FanSource(s) => s.set_property(name, value),
            ComponentKind::LineSource(s) => s.set_property(name, value),
            ComponentKind::WhiteLightSource(s) => s.set_property(name, value),
            ComponentKind::PointSource(s) => s.set_property(name, value),
            ComponentKind::LedSource(s) => s.set_property(name, value),
            ComponentKind::PulsedLaserSource(s) => s.set_property(name, value),
            ComponentKind::Mirror(m) => m.set_property(name, value),
            ComponentKind::SphericalMirror(m) => m.set_property(name, value),
            ComponentKind::ParabolicMirror(m) => m.set_property(name, value),
            ComponentKind::DichroicMirror(m) => m.set_property(name, value),
            ComponentKind::MetallicMirror(m) => m.set_property(name, value),
            ComponentKind::RingMirror(m) => m.set_property(name, value),
            ComponentKind::ThinLens(l) => l.set_property(name, value),
            ComponentKind::CylindricalLens(l) => l.set_property(name, value),
            ComponentKind::AsphericLens(l) => l.set_property(name, value),
            ComponentKind::GrinLens(l) => l.set_property(name, value),
            ComponentKind::Polarizer(p) => p.set_property(name, value),
            ComponentKind::HalfWavePlate(p) => p.set_property(name, value),
            ComponentKind::QuarterWavePlate(p) => p.set_property(name, value),
            ComponentKind::BeamSplitter(p) => p.set_property(name, value),
            ComponentKind::WollastonPrism(p) => p.set_property(name, value),
            ComponentKind::FaradayRotator(p) => p.set_property(name, value),
            ComponentKind::FaradayIsolator(p) => p.set_property(name, value),
            ComponentKind::DielectricBlock(d) => d.set_property(name, value),
            ComponentKind::Prism(d) => d.set_property(name, value),
            ComponentKind::DiffractionGrating(d) => d.set_property(name, value),
            ComponentKind::Aperture(d) => d.set_property(name, value),
            ComponentKind::Screen(d) => d.set_property(name, value),
            ComponentKind::Photodiode(d) => d.set_property(name, value),
            ComponentKind::CcdCamera(d) => d.set_property(name, value),
            ComponentKind::Spectrometer(d) => d.set_property(name, value),
            ComponentKind::PowerMeter(d) => d.set_property(name, value),
            ComponentKind::PolarizationAnalyzer(d) => d.set_property(name, value),
            ComponentKind::OpticalFiber(f) => f.set_property(name, value),
            ComponentKind::AcoustoOpticModulator(t) => t.set_property(name, value),
            ComponentKind::ElectroOpticModulator(t) => t.set_property(name, value),
            ComponentKind::VariableAttenuator(t) => t.set_property(name, value),
            ComponentKind::OpticalChopper(t) => t.set_property(name, value),
            ComponentKind::AtomicCell(m) => m.set_property(name, value),
            ComponentKind::MagneticCoil(m) => m.set_property(name, value),
            ComponentKind::FabryPerotCavity(m) => m.set_property(name, value),
            ComponentKind::CustomComponent(m) => m.set_property(name, value),
        }
    }

    /// Renderer footprint hint.
    pub fn draw_hint(&self) -> DrawHint {
        let frame = self.frame();
        match &self.kind {
            ComponentKind::DielectricBlock(d) => {
                DrawHint::Polygon(geometry::rect_corners(&frame, d.width, d.height).to_vec())
            }
            ComponentKind::Prism(p) => {
                DrawHint::Polygon(geometry::prism_corners(&frame, p.side, p.apex_deg).to_vec())
            }
            ComponentKind::AtomicCell(c) => {
                DrawHint::Polygon(geometry::rect_corners(&frame, c.width, c.height).to_vec())
            }
            ComponentKind::MagneticCoil(c) => DrawHint::Circle {
                center: self.pos,
                radius: c.radius,
            },
            ComponentKind::PointSource(_) => DrawHint::Marker(self.pos),
            ComponentKind::OpticalFiber(f) => {
                let (a, b) = frame.endpoints(f.facet_width);
                DrawHint::Segment(a, b)
            }
            _ => {
                let (a, b) = frame.endpoints(self.footprint_length());
                DrawHint::Segment(a, b)
            }
        }
    }

    /// Axis-aligned bounding box `(min, max)`.
    pub fn bounding_box(&self) -> (Vec2, Vec2) {
        let points: Vec<Vec2> = match self.draw_hint() {
            DrawHint::Segment(a, b) => vec![a, b],
            DrawHint::Polygon(corners) => corners,
            DrawHint::Circle { center, radius } => vec![
                center.add(Vec2::new(-radius, -radius)),
                center.add(Vec2::new(radius, radius)),
            ],
            DrawHint::Marker(p) => vec![p],
        };
        let mut min = points[0];
        let mut max = points[0];
        for p in &points[1..] {
            min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
            max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
        }
        (min, max)
    }

    /// Hit-test for selection, with a small pick margin.
    pub fn contains_point(&self, p: Vec2) -> bool {
        const PICK_MARGIN: f64 = 5.0;
        let (min, max) = self.bounding_box();
        p.x >= min.x - PICK_MARGIN
            && p.x <= max.x + PICK_MARGIN
            && p.y >= min.y - PICK_MARGIN
            && p.y <= max.y + PICK_MARGIN
    }

    fn footprint_length(&self) -> f64 {
        match &self.kind {
            ComponentKind::Mirror(m) => m.length,
            ComponentKind::SphericalMirror(m) => m.aperture,
            ComponentKind::ParabolicMirror(m) => m.width,
            ComponentKind::DichroicMirror(m) => m.length,
            ComponentKind::MetallicMirror(m) => m.length,
            ComponentKind::RingMirror(m) => 2.0 * m.outer_radius,
            ComponentKind::ThinLens(l) => l.aperture,
            ComponentKind::CylindricalLens(l) => l.aperture,
            ComponentKind::AsphericLens(l) => l.aperture,
            ComponentKind::GrinLens(l) => l.aperture,
            ComponentKind::Polarizer(p) => p.length,
            ComponentKind::HalfWavePlate(p) => p.length,
            ComponentKind::QuarterWavePlate(p) => p.length,
            ComponentKind::BeamSplitter(p) => p.length,
            ComponentKind::WollastonPrism(p) => p.length,
            ComponentKind::FaradayRotator(p) => p.length,
            ComponentKind::FaradayIsolator(p) => p.length,
            ComponentKind::DiffractionGrating(d) => d.length,
            ComponentKind::Aperture(d) => d.length,
            ComponentKind::Screen(d) => d.length,
            ComponentKind::Photodiode(d) => d.length,
            ComponentKind::CcdCamera(d) => d.length,
            ComponentKind::Spectrometer(d) => d.length,
            ComponentKind::PowerMeter(d) => d.length,
            ComponentKind::PolarizationAnalyzer(d) => d.length,
            ComponentKind::AcoustoOpticModulator(t) => t.length,
            ComponentKind::ElectroOpticModulator(t) => t.length,
            ComponentKind::VariableAttenuator(t) => t.length,
            ComponentKind::OpticalChopper(t) => t.length,
            ComponentKind::FabryPerotCavity(m) => m.length,
            ComponentKind::CustomComponent(m) => m.length,
            _ => sources::HOUSING_LENGTH,
        }
    }
}

/// Keep only finite hits beyond the self-intersection epsilon.
pub(crate) fn admissible(hits: Vec<Hit>) -> Vec<Hit> {
    hits.into_iter()
        .filter(|h| {
            h.distance > HIT_EPSILON
                && h.distance.is_finite()
                && h.point.is_finite()
                && h.normal.is_finite()
        })
        .collect()
}
