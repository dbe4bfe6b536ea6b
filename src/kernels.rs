use std::f64::consts::PI;

use glam::DVec2;

/// Radially symmetric SPH smoothing kernel with compact support `h`.
pub trait Kernel {
    fn kernel(&self, displacement: DVec2, h: f64) -> f64;

    /// Gradient of the kernel with respect to `displacement`.
    ///
    /// Undefined for a zero displacement, callers must exclude self pairs.
    fn gradient(&self, displacement: DVec2, h: f64) -> DVec2;

    fn q(r: f64, h: f64) -> f64 {
        2. * r / h
    }
}

/// 2D cubic spline (M4) kernel, parametrized by the half support `h / 2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CubicSpline;

impl CubicSpline {
    /// 2D normalisation `10 / (7 pi (h/2)^2)`.
    fn norm(half_h: f64) -> f64 {
        10. / (7. * PI * half_h * half_h)
    }
}

impl Kernel for CubicSpline {
    fn kernel(&self, displacement: DVec2, h: f64) -> f64 {
        let half_h = 0.5 * h;
        let q = Self::q(displacement.length(), h);
        let k = Self::norm(half_h);
        if q < 1. {
            k * (1. - 1.5 * q * q + 0.75 * q * q * q)
        } else if q < 2. {
            k * 0.25 * (2. - q).powi(3)
        } else {
            0.
        }
    }

    fn gradient(&self, displacement: DVec2, h: f64) -> DVec2 {
        let r = displacement.length();
        debug_assert!(r > 0., "Kernel gradient evaluated at zero distance!");
        let half_h = 0.5 * h;
        let q = Self::q(r, h);
        let k = Self::norm(half_h);
        let unit = displacement / r;
        if q < 1. {
            k / half_h * (-3. * q + 2.25 * q * q) * unit
        } else if q < 2. {
            -0.75 * k / half_h * (2. - q) * (2. - q) * unit
        } else {
            DVec2::ZERO
        }
    }
}
