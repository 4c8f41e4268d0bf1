//! Tunable stage parameters and the named parameter surface.
//!
//! The stages read [`PassParameters`] as-is. Range clamping belongs to the
//! UI side: [`ParamSpec::clamp`] is provided for that, and nothing in the
//! render path calls it.
//!
//! Writers on another thread send [`ParamCommand`]s through a [`ParamSender`];
//! the compositor drains them at the start of each frame so parameter state is
//! only ever touched from the frame thread.

use std::sync::mpsc;

/// Outline stage settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlineParams {
    pub enabled: bool,
    pub depth_deriv_min: f32,
    pub depth_deriv_max: f32,
    pub diffuse_deriv_min: f32,
    pub diffuse_deriv_max: f32,
    pub normal_deriv_min: f32,
    pub normal_deriv_max: f32,
    /// Neighbour offset in pixels; values below 1 also fade the outline out.
    pub border_width: f32,
    /// Linearise depth with a perspective rather than orthographic model.
    pub perspective: bool,
    pub color: [f32; 4],
}

impl Default for OutlineParams {
    fn default() -> Self {
        Self {
            enabled: true,
            depth_deriv_min: 5.0,
            depth_deriv_max: 10.0,
            diffuse_deriv_min: 0.0,
            diffuse_deriv_max: 0.23,
            normal_deriv_min: 0.02,
            normal_deriv_max: 0.09,
            border_width: 3.0,
            perspective: true,
            color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Hatching stage settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HatchingParams {
    pub enabled: bool,
    /// Fraction of each line period that is inked.
    pub line_width: f32,
    /// Lines per unit of UV.
    pub line_spacing: f32,
    pub double_line_threshold: f32,
    pub single_line_threshold: f32,
    pub light_threshold: f32,
    pub ink: [f32; 4],
}

impl Default for HatchingParams {
    fn default() -> Self {
        Self {
            enabled: true,
            line_width: 0.47,
            line_spacing: 400.0,
            double_line_threshold: -0.61,
            single_line_threshold: -0.17,
            light_threshold: 0.15,
            ink: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl HatchingParams {
    pub fn thresholds(&self) -> crate::shading::BandThresholds {
        crate::shading::BandThresholds {
            double_line: self.double_line_threshold,
            single_line: self.single_line_threshold,
            light: self.light_threshold,
        }
    }
}

/// All runtime-mutable stage state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PassParameters {
    pub outline: OutlineParams,
    pub hatching: HatchingParams,
}

/// A parameter value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Float(f32),
}

/// Errors from the named parameter surface.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("parameter '{name}' expects a {expected} value")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },
}

/// Name, kind and UI range of one parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub label: &'static str,
    /// `None` for booleans.
    pub range: Option<(f32, f32)>,
    pub step: f32,
}

impl ParamSpec {
    const fn toggle(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            range: None,
            step: 0.0,
        }
    }

    const fn float(name: &'static str, label: &'static str, min: f32, max: f32) -> Self {
        Self {
            name,
            label,
            range: Some((min, max)),
            step: 0.01,
        }
    }

    /// Clamps a UI write into this parameter's range.
    pub fn clamp(&self, value: ParamValue) -> ParamValue {
        match (value, self.range) {
            (ParamValue::Float(v), Some((min, max))) => ParamValue::Float(v.clamp(min, max)),
            (other, _) => other,
        }
    }
}

/// Every parameter exposed to the UI collaborator, in panel order.
pub const PARAM_SPECS: &[ParamSpec] = &[
    ParamSpec::toggle("outline.enabled", "enabled"),
    ParamSpec::float("outline.depth_deriv_min", "depth deriv min", 0.0, 50.0),
    ParamSpec::float("outline.depth_deriv_max", "depth deriv max", 0.0, 50.0),
    ParamSpec::float("outline.border_width", "border width", 0.0, 5.0),
    ParamSpec::float("outline.diffuse_deriv_min", "diff deriv min", 0.0, 3.0),
    ParamSpec::float("outline.diffuse_deriv_max", "diff deriv max", 0.0, 3.0),
    ParamSpec::float("outline.normal_deriv_min", "normal deriv min", -1.0, 1.0),
    ParamSpec::float("outline.normal_deriv_max", "normal deriv max", -1.0, 1.0),
    ParamSpec::toggle("outline.perspective", "perspective camera"),
    ParamSpec::toggle("hatching.enabled", "enabled"),
    ParamSpec::float("hatching.line_width", "line width", 0.0, 1.0),
    ParamSpec::float("hatching.line_spacing", "line spacing", 0.0, 400.0),
    ParamSpec::float("hatching.double_line_threshold", "double line", -1.0, 1.0),
    ParamSpec::float("hatching.single_line_threshold", "single line", -1.0, 1.0),
    ParamSpec::float("hatching.light_threshold", "light", -1.0, 1.0),
];

/// Looks up the spec for a parameter name.
pub fn spec(name: &str) -> Option<&'static ParamSpec> {
    PARAM_SPECS.iter().find(|s| s.name == name)
}

enum Slot<'a> {
    Bool(&'a mut bool),
    Float(&'a mut f32),
}

impl PassParameters {
    fn slot(&mut self, name: &str) -> Option<Slot<'_>> {
        let o = &mut self.outline;
        let h = &mut self.hatching;
        Some(match name {
            "outline.enabled" => Slot::Bool(&mut o.enabled),
            "outline.depth_deriv_min" => Slot::Float(&mut o.depth_deriv_min),
            "outline.depth_deriv_max" => Slot::Float(&mut o.depth_deriv_max),
            "outline.border_width" => Slot::Float(&mut o.border_width),
            "outline.diffuse_deriv_min" => Slot::Float(&mut o.diffuse_deriv_min),
            "outline.diffuse_deriv_max" => Slot::Float(&mut o.diffuse_deriv_max),
            "outline.normal_deriv_min" => Slot::Float(&mut o.normal_deriv_min),
            "outline.normal_deriv_max" => Slot::Float(&mut o.normal_deriv_max),
            "outline.perspective" => Slot::Bool(&mut o.perspective),
            "hatching.enabled" => Slot::Bool(&mut h.enabled),
            "hatching.line_width" => Slot::Float(&mut h.line_width),
            "hatching.line_spacing" => Slot::Float(&mut h.line_spacing),
            "hatching.double_line_threshold" => Slot::Float(&mut h.double_line_threshold),
            "hatching.single_line_threshold" => Slot::Float(&mut h.single_line_threshold),
            "hatching.light_threshold" => Slot::Float(&mut h.light_threshold),
            _ => return None,
        })
    }

    /// Reads a parameter by name.
    pub fn get(&self, name: &str) -> Result<ParamValue, ParamError> {
        // slot() needs &mut; reading through a copy keeps get() on &self
        let mut copy = *self;
        match copy.slot(name) {
            Some(Slot::Bool(v)) => Ok(ParamValue::Bool(*v)),
            Some(Slot::Float(v)) => Ok(ParamValue::Float(*v)),
            None => Err(ParamError::UnknownParameter(name.to_string())),
        }
    }

    /// Writes a parameter by name. The value is stored unclamped.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        match (self.slot(name), value) {
            (Some(Slot::Bool(slot)), ParamValue::Bool(v)) => *slot = v,
            (Some(Slot::Float(slot)), ParamValue::Float(v)) => *slot = v,
            (Some(Slot::Bool(_)), _) => {
                return Err(ParamError::TypeMismatch {
                    name: name.to_string(),
                    expected: "bool",
                });
            }
            (Some(Slot::Float(_)), _) => {
                return Err(ParamError::TypeMismatch {
                    name: name.to_string(),
                    expected: "float",
                });
            }
            (None, _) => return Err(ParamError::UnknownParameter(name.to_string())),
        }
        Ok(())
    }
}

/// A deferred parameter write.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamCommand {
    pub name: String,
    pub value: ParamValue,
}

/// Cloneable, `Send` handle for writing parameters from another thread.
#[derive(Clone)]
pub struct ParamSender {
    tx: mpsc::Sender<ParamCommand>,
}

impl ParamSender {
    /// Queues a write. Returns `false` once the frame loop has shut down.
    pub fn set(&self, name: impl Into<String>, value: ParamValue) -> bool {
        self.tx
            .send(ParamCommand {
                name: name.into(),
                value,
            })
            .is_ok()
    }
}

/// Frame-thread side of the parameter command queue.
pub struct ParamQueue {
    tx: mpsc::Sender<ParamCommand>,
    rx: mpsc::Receiver<ParamCommand>,
}

impl ParamQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> ParamSender {
        ParamSender {
            tx: self.tx.clone(),
        }
    }

    /// Applies every pending write in arrival order. Returns how many succeeded.
    pub fn apply_pending(&self, params: &mut PassParameters) -> usize {
        let mut applied = 0;
        for cmd in self.rx.try_iter() {
            match params.set(&cmd.name, cmd.value) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("dropping parameter write: {e}"),
            }
        }
        applied
    }
}

impl Default for ParamQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_spec_is_addressable() {
        let params = PassParameters::default();
        for spec in PARAM_SPECS {
            let value = params.get(spec.name).unwrap();
            match (value, spec.range) {
                (ParamValue::Bool(_), None) | (ParamValue::Float(_), Some(_)) => {}
                _ => panic!("kind mismatch for {}", spec.name),
            }
        }
    }

    #[test]
    fn defaults_sit_inside_their_ranges() {
        let params = PassParameters::default();
        for spec in PARAM_SPECS {
            let value = params.get(spec.name).unwrap();
            if let (ParamValue::Float(v), Some((min, max))) = (value, spec.range) {
                assert!(v >= min && v <= max, "{} = {v}", spec.name);
            }
        }
    }

    #[test]
    fn set_stores_out_of_range_values_unclamped() {
        let mut params = PassParameters::default();
        params
            .set("outline.border_width", ParamValue::Float(12.0))
            .unwrap();
        assert_eq!(params.outline.border_width, 12.0);
    }

    #[test]
    fn spec_clamp_is_the_ui_boundary() {
        let spec = spec("outline.border_width").unwrap();
        assert_eq!(spec.clamp(ParamValue::Float(12.0)), ParamValue::Float(5.0));
        assert_eq!(spec.clamp(ParamValue::Float(-1.0)), ParamValue::Float(0.0));
        let toggle = super::spec("hatching.enabled").unwrap();
        assert_eq!(toggle.clamp(ParamValue::Bool(false)), ParamValue::Bool(false));
    }

    #[test]
    fn unknown_and_mistyped_writes_are_rejected() {
        let mut params = PassParameters::default();
        assert_eq!(
            params.set("outline.glow", ParamValue::Float(1.0)),
            Err(ParamError::UnknownParameter("outline.glow".into()))
        );
        assert!(matches!(
            params.set("hatching.enabled", ParamValue::Float(1.0)),
            Err(ParamError::TypeMismatch { expected: "bool", .. })
        ));
        assert_eq!(params, PassParameters::default());
    }

    #[test]
    fn queued_writes_apply_in_order_from_other_threads() {
        let queue = ParamQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            sender.set("hatching.line_spacing", ParamValue::Float(100.0));
            sender.set("hatching.line_spacing", ParamValue::Float(200.0));
            sender.set("hatching.enabled", ParamValue::Bool(false));
            sender.set("nope", ParamValue::Bool(false));
        })
        .join()
        .unwrap();

        let mut params = PassParameters::default();
        assert_eq!(queue.apply_pending(&mut params), 3);
        assert_eq!(params.hatching.line_spacing, 200.0);
        assert!(!params.hatching.enabled);
        assert_eq!(queue.apply_pending(&mut params), 0);
    }
}
