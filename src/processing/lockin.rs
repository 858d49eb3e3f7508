// src/processing/lockin.rs
//! Synchronous (lock-in) demodulation of conditioned traces
//!
//! Each trace is multiplied by sine and cosine references at the excitation
//! frequency and the products are integrated over the acquisition time base.
//! For a trace `A·sin(ωt + φ)` spanning whole periods the sine product
//! integrates to `A·cos(φ)·T/2` and the cosine product to `A·sin(φ)·T/2`,
//! so `atan2` of the pair recovers `φ` and its norm is proportional to `A`.

use crate::acquisition::AcquisitionWindow;
use crate::error::{LcrError, LcrResult};
use crate::processing::conditioner::ConditionedTrace;
use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Numerical integration rule applied to the reference products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationRule {
    /// `Σ Δt·(f_k + f_{k+1}) / 2`
    #[default]
    Trapezoidal,
    /// `Σ |Δt|·|f_k − f_{k+1}| / 2`, as computed by the legacy instrument firmware
    AbsoluteDifference,
}

impl IntegrationRule {
    /// Integrate `values` sampled at `times`; both must have the same length
    pub fn integrate(self, values: ArrayView1<f64>, times: ArrayView1<f64>) -> f64 {
        let steps = values.iter().zip(values.iter().skip(1));
        let dts = times.iter().zip(times.iter().skip(1)).map(|(t0, t1)| t1 - t0);

        match self {
            IntegrationRule::Trapezoidal => steps
                .zip(dts)
                .map(|((f0, f1), dt)| dt * (f0 + f1) / 2.0)
                .sum(),
            IntegrationRule::AbsoluteDifference => steps
                .zip(dts)
                .map(|((f0, f1), dt)| (dt * (f0 - f1)).abs() / 2.0)
                .sum(),
        }
    }
}

/// In-phase/quadrature integrals of one physical quantity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntegralPair {
    /// Integral of the trace times the sine reference
    pub in_phase: f64,
    /// Integral of the trace times the cosine reference
    pub quadrature: f64,
}

impl IntegralPair {
    pub fn amplitude(&self) -> f64 {
        self.in_phase.hypot(self.quadrature)
    }

    /// Phase in radians, `atan2(quadrature, in_phase)`
    pub fn phase(&self) -> f64 {
        self.quadrature.atan2(self.in_phase)
    }
}

/// Trace-times-reference products
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureProducts {
    pub voltage_sin: Array1<f64>,
    pub voltage_cos: Array1<f64>,
    pub current_sin: Array1<f64>,
    pub current_cos: Array1<f64>,
}

impl QuadratureProducts {
    pub fn len(&self) -> usize {
        self.voltage_sin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage_sin.is_empty()
    }
}

/// Demodulated voltage and current of one measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Demodulated {
    pub voltage: IntegralPair,
    pub current: IntegralPair,
}

/// Lock-in demodulator
#[derive(Debug, Clone, Copy, Default)]
pub struct LockInDemodulator {
    rule: IntegrationRule,
}

impl LockInDemodulator {
    pub fn new(rule: IntegrationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> IntegrationRule {
        self.rule
    }

    /// Samples usable for demodulation: bounded by both trace and time base
    pub fn usable_len(trace: &ConditionedTrace, window: &AcquisitionWindow) -> usize {
        trace.len().min(window.time_base.len())
    }

    /// Multiply the load traces by sine and cosine references at `omega`
    pub fn quadrature_products(
        &self,
        trace: &ConditionedTrace,
        window: &AcquisitionWindow,
        omega: f64,
    ) -> QuadratureProducts {
        let n = Self::usable_len(trace, window);
        let phase = window.time_base.slice(s![..n]).mapv(|t| t * omega);
        let sin_ref = phase.mapv(f64::sin);
        let cos_ref = phase.mapv(f64::cos);

        let voltage = trace.load_voltage.slice(s![..n]);
        let current = trace.load_current.slice(s![..n]);

        QuadratureProducts {
            voltage_sin: &voltage * &sin_ref,
            voltage_cos: &voltage * &cos_ref,
            current_sin: &current * &sin_ref,
            current_cos: &current * &cos_ref,
        }
    }

    /// Pair amplitude this rule yields for a unit sinusoid in phase with the
    /// sine reference, integrated over the first `len` time-base samples
    ///
    /// Scales amplitude thresholds into the units of [`IntegralPair::amplitude`].
    /// Close to `span / 2` for the trapezoidal rule.
    pub fn unit_response(&self, window: &AcquisitionWindow, len: usize, omega: f64) -> f64 {
        let n = len.min(window.time_base.len());
        let times = window.time_base.slice(s![..n]);
        let sin_ref = times.mapv(|t| (t * omega).sin());
        let cos_ref = times.mapv(|t| (t * omega).cos());

        let in_phase = self.rule.integrate((&sin_ref * &sin_ref).view(), times);
        let quadrature = self.rule.integrate((&sin_ref * &cos_ref).view(), times);
        in_phase.hypot(quadrature)
    }

    /// Integrate the quadrature products into voltage and current pairs
    pub fn demodulate(
        &self,
        trace: &ConditionedTrace,
        window: &AcquisitionWindow,
        omega: f64,
    ) -> LcrResult<Demodulated> {
        let products = self.quadrature_products(trace, window, omega);
        if products.len() < 2 {
            return Err(LcrError::DegenerateMeasurement {
                reason: format!(
                    "{} usable samples, at least two are needed to integrate",
                    products.len()
                ),
            });
        }

        let times = window.time_base.slice(s![..products.len()]);
        let integrate = |values: &Array1<f64>| self.rule.integrate(values.view(), times);

        Ok(Demodulated {
            voltage: IntegralPair {
                in_phase: integrate(&products.voltage_sin),
                quadrature: integrate(&products.voltage_cos),
            },
            current: IntegralPair {
                in_phase: integrate(&products.current_sin),
                quadrature: integrate(&products.current_cos),
            },
        })
    }
}
