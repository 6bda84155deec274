/// Numerically stable `log(sum(exp(xs))`
#[inline]
pub fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        panic!("Empty container");
    } else if xs.len() == 1 {
        xs[0]
    } else {
        let maxval = xs
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, |acc, x| if x > acc { x } else { acc });
        if maxval.is_infinite() && maxval < 0.0 {
            return f64::NEG_INFINITY;
        }
        xs.iter()
            .fold(0.0_f64, |acc, x| acc + (x - maxval).exp())
            .ln()
            + maxval
    }
}
