use std::cmp::Ordering;

/// Area under the ROC curve for fraud scores.
///
/// Labels follow the crate convention: `1` is fraud, anything else is legitimate.
/// Tied scores contribute half a pair, i.e. the trapezoidal rule over the
/// ranked scores.
///
/// # Returns
///
/// AUC in [0, 1]. If only one class is present the AUC is undefined and 0.5
/// (random) is returned.
pub fn roc_auc(scores: &[f64], labels: &[i32]) -> f64 {
    let mut combined: Vec<(f64, bool)> = scores
        .iter()
        .copied()
        .zip(labels.iter().map(|&l| l == 1))
        .collect();
    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let total_pos = combined.iter().filter(|(_, pos)| *pos).count() as f64;
    let total_neg = combined.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return 0.5;
    }

    let mut auc = 0.0;
    let mut cum_pos = 0.0;
    let mut cum_neg = 0.0;
    let mut prev_score = f64::NEG_INFINITY;
    let mut prev_pos = 0.0;
    let mut prev_neg = 0.0;

    for &(score, positive) in combined.iter() {
        if score != prev_score {
            auc += (cum_pos - prev_pos) * (cum_neg + prev_neg) / 2.0;
            prev_score = score;
            prev_pos = cum_pos;
            prev_neg = cum_neg;
        }
        if positive {
            cum_pos += 1.0;
        } else {
            cum_neg += 1.0;
        }
    }

    // last tie group
    auc += (total_pos - prev_pos) * (total_neg + prev_neg) / 2.0;

    auc / (total_pos * total_neg)
}

/// Result of a two-sample Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsTest {
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sample Kolmogorov-Smirnov test with the asymptotic p-value.
///
/// Non-finite values are ignored. Returns `None` when either sample is empty
/// after filtering.
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> Option<KsTest> {
    let mut a: Vec<f64> = a.iter().copied().filter(|v| v.is_finite()).collect();
    let mut b: Vec<f64> = b.iter().copied().filter(|v| v.is_finite()).collect();
    if a.is_empty() || b.is_empty() {
        return None;
    }
    a.sort_by(|x, y| x.total_cmp(y));
    b.sort_by(|x, y| x.total_cmp(y));

    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut statistic: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        let gap = (i as f64 / n - j as f64 / m).abs();
        statistic = statistic.max(gap);
    }

    let en = (n * m / (n + m)).sqrt();
    let p_value = kolmogorov_survival((en + 0.12 + 0.11 / en) * statistic);
    Some(KsTest { statistic, p_value })
}

/// Survival function of the Kolmogorov distribution,
/// `Q(l) = 2 * sum_{k>=1} (-1)^(k-1) exp(-2 k^2 l^2)`.
fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut prev_term = 0.0;
    for k in 1..=100 {
        let k = k as f64;
        let term = sign * 2.0 * (a2 * k * k).exp();
        sum += term;
        if term.abs() <= 1e-10 * prev_term || term.abs() <= 1e-12 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term.abs();
    }
    // series did not converge, which only happens for tiny lambda
    1.0
}
