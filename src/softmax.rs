use crate::error::PipelineError;
use crate::matrix::Matrix;

/// Per-column standardization parameters, fit on training rows only. The
/// same parameters transform both train and test matrices so that no
/// test-set statistic leaks into training.
#[derive(Debug, Clone)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardizer {
    pub fn fit(x: &Matrix) -> Standardizer {
        let r = x.rows();
        let d = x.cols();
        let mut mean = vec![0.0; d];
        let mut std = vec![0.0; d];

        for j in 0..d {
            let mut sum = 0.0;
            for i in 0..r {
                sum += x.at(i, j);
            }
            mean[j] = sum / r as f64;
        }

        for j in 0..d {
            let mut s = 0.0;
            for i in 0..r {
                let diff = x.at(i, j) - mean[j];
                s += diff * diff;
            }
            // population std; constant columns fall back to 1
            std[j] = (s / r as f64).sqrt();
            if std[j] == 0.0 {
                std[j] = 1.0;
            }
        }

        Standardizer { mean, std }
    }

    pub fn transform_in_place(&self, x: &mut Matrix) {
        for i in 0..x.rows() {
            for j in 0..x.cols() {
                x.set(i, j, (x.at(i, j) - self.mean[j]) / self.std[j]);
            }
        }
    }
}

/// Numerically stable softmax: subtracts the row max before exponentiating.
fn softmax_row(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().fold(scores[0], |a, &b| a.max(b));
    let mut out: Vec<f64> = scores.iter().map(|&v| (v - max).exp()).collect();
    let sum: f64 = out.iter().sum();
    for v in out.iter_mut() {
        *v /= sum;
    }
    out
}

/// Multinomial logistic regression. Weights are `K x (d + 1)` with the bias
/// as the last column, initialized to zero.
#[derive(Debug, Clone)]
pub struct SoftmaxLogReg {
    w: Matrix,
    num_classes: usize,
    num_features: usize,
}

impl SoftmaxLogReg {
    pub fn new(num_classes: usize, num_features: usize) -> SoftmaxLogReg {
        SoftmaxLogReg {
            w: Matrix::zeros(num_classes, num_features + 1),
            num_classes,
            num_features,
        }
    }

    fn check_width(&self, x: &Matrix) -> Result<(), PipelineError> {
        if x.cols() != self.num_features {
            return Err(PipelineError::DimensionMismatch {
                expected: self.num_features,
                got: x.cols(),
            });
        }
        Ok(())
    }

    /// Class scores for row `i` of the bias-augmented design.
    fn scores(&self, x: &Matrix, i: usize) -> Vec<f64> {
        let d = x.cols();
        let mut scores = vec![0.0; self.num_classes];
        for (k, score) in scores.iter_mut().enumerate() {
            let mut s = 0.0;
            for j in 0..d {
                s += self.w.at(k, j) * x.at(i, j);
            }
            s += self.w.at(k, d); // bias
            *score = s;
        }
        scores
    }

    /// Full-batch gradient descent over cross-entropy with uniform L2
    /// (bias column included).
    pub fn fit_gradient_descent(
        &mut self,
        x: &Matrix,
        y: &[usize],
        learning_rate: f64,
        l2_lambda: f64,
        epochs: usize,
    ) -> Result<(), PipelineError> {
        self.check_width(x)?;
        if y.len() != x.rows() {
            return Err(PipelineError::InvalidInput(format!(
                "y length {} does not match {} rows",
                y.len(),
                x.rows()
            )));
        }
        if learning_rate <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "learning rate must be > 0".to_string(),
            ));
        }
        if epochs == 0 {
            return Err(PipelineError::InvalidConfig("epochs must be > 0".to_string()));
        }
        if l2_lambda < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "l2 lambda must be >= 0".to_string(),
            ));
        }

        let r = x.rows();
        let d = x.cols();
        let mut grad = Matrix::zeros(self.num_classes, d + 1);

        for _epoch in 0..epochs {
            grad.zero();

            for i in 0..r {
                let prob = softmax_row(&self.scores(x, i));
                for k in 0..self.num_classes {
                    let indicator = if k == y[i] { 1.0 } else { 0.0 };
                    let diff = prob[k] - indicator;
                    for j in 0..d {
                        grad.set(k, j, grad.at(k, j) + diff * x.at(i, j));
                    }
                    grad.set(k, d, grad.at(k, d) + diff); // bias input is 1
                }
            }

            let scale = 1.0 / r as f64;
            for k in 0..self.num_classes {
                for j in 0..=d {
                    let g = grad.at(k, j) * scale + l2_lambda * self.w.at(k, j);
                    self.w.set(k, j, self.w.at(k, j) - learning_rate * g);
                }
            }
        }

        Ok(())
    }

    /// Per-row class probabilities, `rows x K`.
    pub fn predict_proba(&self, x: &Matrix) -> Result<Matrix, PipelineError> {
        self.check_width(x)?;
        let mut p = Matrix::zeros(x.rows(), self.num_classes);
        for i in 0..x.rows() {
            let prob = softmax_row(&self.scores(x, i));
            for (k, &v) in prob.iter().enumerate() {
                p.set(i, k, v);
            }
        }
        Ok(p)
    }

    /// Arg-max decisions; ties break toward the lowest class index.
    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>, PipelineError> {
        let p = self.predict_proba(x)?;
        let mut out = Vec::with_capacity(p.rows());
        for i in 0..p.rows() {
            let mut best_k = 0;
            let mut best_v = p.at(i, 0);
            for k in 1..self.num_classes {
                let v = p.at(i, k);
                if v > best_v {
                    best_v = v;
                    best_k = k;
                }
            }
            out.push(best_k);
        }
        Ok(out)
    }
}
