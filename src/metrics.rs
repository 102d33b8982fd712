use serde::{Deserialize, Serialize};

/// Holdout regression metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

pub fn evaluate(predictions: &[f64], targets: &[f64]) -> RegressionMetrics {
    let n = predictions.len().min(targets.len());
    if n == 0 {
        return RegressionMetrics {
            mae: 0.0,
            mse: 0.0,
            rmse: 0.0,
            r2: 0.0,
        };
    }

    let pairs = || predictions.iter().zip(targets.iter()).take(n);
    let count = n as f64;
    let mae = pairs().map(|(p, t)| (p - t).abs()).sum::<f64>() / count;
    let sse = pairs().map(|(p, t)| (p - t).powi(2)).sum::<f64>();
    let mse = sse / count;

    let mean = targets.iter().take(n).sum::<f64>() / count;
    let sst = targets.iter().take(n).map(|t| (t - mean).powi(2)).sum::<f64>();
    let r2 = if sst > 0.0 {
        1.0 - sse / sst
    } else if sse == 0.0 {
        1.0
    } else {
        0.0
    };

    RegressionMetrics {
        mae,
        mse,
        rmse: mse.sqrt(),
        r2,
    }
}
