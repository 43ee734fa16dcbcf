//! Effect parameter definitions.
//!
//! Each tweakable effect parameter is described once here. The UI binding
//! uses the labels and ranges, and settings loaded from job files are
//! clamped against the same ranges.

/// Types of parameters for effects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectParamKind {
    Float,
    Int,
}

/// Definition of an effect parameter.
#[derive(Clone, Debug)]
pub struct EffectParamDef {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: EffectParamKind,
    pub default: f32,
    pub min: Option<f32>,
    pub max: Option<f32>,
    /// Increment for integer widgets.
    pub step: Option<i32>,
}

impl EffectParamDef {
    pub const fn float(name: &'static str, label: &'static str, default: f32) -> Self {
        Self {
            name,
            label,
            kind: EffectParamKind::Float,
            default,
            min: None,
            max: None,
            step: None,
        }
    }

    pub const fn int(name: &'static str, label: &'static str, default: i32) -> Self {
        Self {
            name,
            label,
            kind: EffectParamKind::Int,
            default: default as f32,
            min: None,
            max: None,
            step: None,
        }
    }

    pub const fn with_min(mut self, min: f32) -> Self {
        self.min = Some(min);
        self
    }

    pub const fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub const fn with_step(mut self, step: i32) -> Self {
        self.step = Some(step);
        self
    }

    /// Clamps `value` into the declared range.
    pub fn clamp(&self, value: f32) -> f32 {
        let mut v = value;
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        v
    }

    pub fn min_i32(&self) -> i32 {
        self.min.map_or(i32::MIN, |m| m as i32)
    }

    pub fn max_i32(&self) -> i32 {
        self.max.map_or(i32::MAX, |m| m as i32)
    }
}

pub const BLOOM_THRESHOLD: EffectParamDef = EffectParamDef::float("threshold", "Threshold", 0.8)
    .with_min(0.0);

pub const BLOOM_KERNEL_WIDTH: EffectParamDef = EffectParamDef::int("kernelWidth", "Kernel Width", 5)
    .with_range(1.0, 15.0)
    .with_step(2);

pub const BLOOM_SIGMA: EffectParamDef = EffectParamDef::float("sigma", "Sigma", 2.0)
    .with_min(0.001);

/// Bloom parameters in UI order.
pub const BLOOM_PARAMS: [EffectParamDef; 3] = [BLOOM_THRESHOLD, BLOOM_KERNEL_WIDTH, BLOOM_SIGMA];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_params_in_ui_order() {
        let labels: Vec<&str> = BLOOM_PARAMS.iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["Threshold", "Kernel Width", "Sigma"]);
    }

    #[test]
    fn test_clamp_respects_bounds() {
        assert_eq!(BLOOM_THRESHOLD.clamp(-1.0), 0.0);
        assert_eq!(BLOOM_THRESHOLD.clamp(5.0), 5.0);
        assert_eq!(BLOOM_KERNEL_WIDTH.clamp(40.0), 15.0);
        assert_eq!(BLOOM_SIGMA.clamp(0.0), 0.001);
    }

    #[test]
    fn test_int_bounds() {
        assert_eq!(BLOOM_KERNEL_WIDTH.min_i32(), 1);
        assert_eq!(BLOOM_KERNEL_WIDTH.max_i32(), 15);
        assert_eq!(BLOOM_KERNEL_WIDTH.step, Some(2));
        assert_eq!(BLOOM_SIGMA.max_i32(), i32::MAX);
    }

    #[test]
    fn test_bloom_param_kinds() {
        let kinds: Vec<EffectParamKind> = BLOOM_PARAMS.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![EffectParamKind::Float, EffectParamKind::Int, EffectParamKind::Float]);
    }
}
