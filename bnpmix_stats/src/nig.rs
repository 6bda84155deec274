//! Closed forms for the conjugate Normal/Inverse-Gamma (NNIG) model
//!
//! The model is
//!
//! > y | μ, σ² ~ N(μ, σ²)
//! > μ | σ² ~ N(μ₀, σ²/λ)
//! > σ² ~ InvGamma(a, b)
//!
//! with hyperparameters (μ₀, λ, a, b). These are the formulas the native
//! NNIG hierarchy dispatches to; plugin hierarchies provide their own.
use bnpmix_consts::rv::dist::{Gaussian, InvGamma};
use bnpmix_consts::rv::traits::Rv;
use rand::Rng;
use special::Gamma as _;
use std::f64::consts::PI;
use thiserror::Error;

/// The NNIG hyperparameter block: (mean, var_scaling, shape, scale).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NigParams {
    pub mean: f64,
    pub var_scaling: f64,
    pub shape: f64,
    pub scale: f64,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NigError {
    #[error("NNIG hyperparameters have 4 entries, found {found}")]
    HyperArity { found: usize },
}

impl NigParams {
    pub fn from_slice(hypers: &[f64]) -> Result<Self, NigError> {
        match hypers {
            &[mean, var_scaling, shape, scale] => Ok(Self {
                mean,
                var_scaling,
                shape,
                scale,
            }),
            _ => Err(NigError::HyperArity {
                found: hypers.len(),
            }),
        }
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![self.mean, self.var_scaling, self.shape, self.scale]
    }

    /// The posterior hyperparameters given `card` observations with the
    /// sufficient statistics (Σy, Σy²). Pure; returns the prior unchanged
    /// for an empty cluster.
    pub fn posterior(&self, card: usize, sum: f64, sum_sq: f64) -> Self {
        if card == 0 {
            return *self;
        }
        let n = card as f64;
        let y_bar = sum / n;
        let ss = sum_sq - n * y_bar * y_bar;
        let var_scaling = self.var_scaling + n;
        let mean = self.var_scaling.mul_add(self.mean, sum) / var_scaling;
        let shape = 0.5_f64.mul_add(n, self.shape);
        let scale = self.scale
            + 0.5 * ss
            + 0.5 * self.var_scaling * n * (y_bar - self.mean).powi(2)
                / var_scaling;
        Self {
            mean,
            var_scaling,
            shape,
            scale,
        }
    }

    /// Marginal (predictive) log density of a single observation: a
    /// location-scale Student-t with 2·shape degrees of freedom.
    pub fn marg_lpdf(&self, x: f64) -> f64 {
        let df = 2.0 * self.shape;
        let sigma = (self.scale * (self.var_scaling + 1.0)
            / (self.shape * self.var_scaling))
            .sqrt();
        lst_lpdf(x, df, self.mean, sigma)
    }

    /// Joint log density of the component parameters (mean, var) under this
    /// hyperparameter block.
    pub fn lpdf(&self, mean: f64, var: f64) -> f64 {
        let ln_ig = self.shape.mul_add(
            self.scale.ln(),
            -self.shape.ln_gamma().0,
        ) - (self.shape + 1.0) * var.ln()
            - self.scale / var;
        let ln_norm = Gaussian::new_unchecked(
            self.mean,
            (var / self.var_scaling).sqrt(),
        )
        .ln_f(&mean);
        ln_ig + ln_norm
    }

    /// Draw (mean, var) from this hyperparameter block.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        let var: f64 =
            InvGamma::new_unchecked(self.shape, self.scale).draw(rng);
        let mean: f64 = Gaussian::new_unchecked(
            self.mean,
            (var / self.var_scaling).sqrt(),
        )
        .draw(rng);
        (mean, var)
    }
}

/// Gaussian log likelihood of `x` under a (mean, var) component state.
pub fn like_lpdf(x: f64, mean: f64, var: f64) -> f64 {
    Gaussian::new_unchecked(mean, var.sqrt()).ln_f(&x)
}

/// Location-scale Student-t log density.
fn lst_lpdf(x: f64, df: f64, loc: f64, sigma: f64) -> f64 {
    let z = (x - loc) / sigma;
    (0.5 * (df + 1.0)).ln_gamma().0
        - (0.5 * df).ln_gamma().0
        - 0.5 * (df * PI).ln()
        - sigma.ln()
        - 0.5 * (df + 1.0) * (z * z / df).ln_1p()
}
