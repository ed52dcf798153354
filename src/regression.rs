//! Ordinary least-squares line fitting.

/// A read-only set of points, indexed from `0` to `len() - 1`.
pub trait Points {
    fn len(&self) -> usize;
    fn x(&self, i: usize) -> f64;
    fn y(&self, i: usize) -> f64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Points for [(f64, f64)] {
    fn len(&self) -> usize {
        <[(f64, f64)]>::len(self)
    }

    fn x(&self, i: usize) -> f64 {
        self[i].0
    }

    fn y(&self, i: usize) -> f64 {
        self[i].1
    }
}

/// The linear equation `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

impl Line {
    /// Evaluate the line at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a line through `points` by simple linear regression.
///
/// # Panics
///
/// Panics if fewer than two points are supplied, or if every x-value is
/// the same (the slope is undefined). Both indicate a caller bug.
pub fn fit<P: Points + ?Sized>(points: &P) -> Line {
    let n = points.len();
    assert!(n >= 2, "fit requires at least 2 points, got {}", n);

    let (mut x_sum, mut x_sq_sum, mut y_sum, mut xy_sum) = (0.0, 0.0, 0.0, 0.0);
    for i in 0..n {
        let x = points.x(i);
        let y = points.y(i);
        x_sum += x;
        x_sq_sum += x * x;
        y_sum += y;
        xy_sum += x * y;
    }

    let s = n as f64;
    let x_bar = x_sum / s;
    let y_bar = y_sum / s;
    let denominator = x_sq_sum - x_sum * x_bar;
    assert!(
        denominator != 0.0,
        "fit requires at least two distinct x-values"
    );

    let slope = (xy_sum - x_sum * y_bar) / denominator;
    let intercept = y_bar - slope * x_bar;
    Line { slope, intercept }
}
