//! Chinese restaurant process partition scores

/// Log probability of a partition with cluster counts `cts` over `n` items
/// under a CRP with concentration `alpha`.
pub fn lcrp(n: usize, cts: &[usize], alpha: f64) -> f64 {
    let k: f64 = cts.len() as f64;
    let gsum = cts.iter().fold(0.0, |acc, ct| {
        acc + ::special::Gamma::ln_gamma(*ct as f64).0
    });
    let cpnt_2 = ::special::Gamma::ln_gamma(alpha).0
        - ::special::Gamma::ln_gamma(n as f64 + alpha).0;
    gsum + k.mul_add(alpha.ln(), cpnt_2)
}
