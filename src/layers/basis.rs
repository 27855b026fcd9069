//! Radial and angular basis functions.
//!
//! Radial functions expand a batch of distances `(T,)` into `(T, width)`
//! features; [`SphericalHarmonicsFunction`] does the same for bond angles.
//! All functions accept empty batches and return `(0, width)` tensors.
//!
//! Spherical Bessel functions `j_l` are evaluated with tensor operations:
//! upward recurrence from `j_0 = sin x / x` where `x >= max(l, 0.5)`, and
//! the power series below that, where the recurrence loses precision.

use std::f64::consts::{PI, SQRT_2};

use candle_core::{DType, Device, Tensor};

use crate::error::Error;

const SERIES_TERMS: usize = 30;
const BISECTION_STEPS: usize = 200;

fn series_limit(l: usize) -> f64 {
    (l as f64).max(0.5)
}

/// `(2l + 1)!!`
fn odd_double_factorial(l: usize) -> f64 {
    (1..=l).map(|k| (2 * k + 1) as f64).product()
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Spherical Bessel function of the first kind, `j_l(x)`.
pub fn spherical_jn(l: usize, x: f64) -> f64 {
    if x.abs() < series_limit(l) {
        let x2 = x * x;
        let mut term = x.powi(l as i32) / odd_double_factorial(l);
        let mut sum = term;
        for k in 0..SERIES_TERMS {
            term *= -x2 / (2.0 * (k + 1) as f64 * (2 * l + 2 * k + 3) as f64);
            sum += term;
        }
        return sum;
    }

    let (s, c) = x.sin_cos();
    let j0 = s / x;
    if l == 0 {
        return j0;
    }
    let mut prev = j0;
    let mut cur = s / (x * x) - c / x;
    for k in 1..l {
        let next = (2 * k + 1) as f64 / x * cur - prev;
        prev = cur;
        cur = next;
    }
    cur
}

/// Elementwise `j_l(x)` on a tensor.
fn spherical_jn_tensor(l: usize, x: &Tensor) -> candle_core::Result<Tensor> {
    let limit = series_limit(l);

    let x2 = x.sqr()?;
    let mut term = x.powf(l as f64)?.affine(1.0 / odd_double_factorial(l), 0.0)?;
    let mut series = term.clone();
    for k in 0..SERIES_TERMS {
        let scale = -1.0 / (2.0 * (k + 1) as f64 * (2 * l + 2 * k + 3) as f64);
        term = (term * &x2)?.affine(scale, 0.0)?;
        series = (series + &term)?;
    }

    // Entries below the limit take the series value; clamping keeps the
    // recurrence free of divisions by zero there.
    let xs = x.maximum(limit)?;
    let sin = xs.sin()?;
    let cos = xs.cos()?;
    let j0 = (&sin / &xs)?;
    let recurrence = if l == 0 {
        j0
    } else {
        let mut prev = j0;
        let mut cur = ((&sin / xs.sqr()?)? - (&cos / &xs)?)?;
        for k in 1..l {
            let next = ((cur.affine((2 * k + 1) as f64, 0.0)? / &xs)? - &prev)?;
            prev = cur;
            cur = next;
        }
        cur
    };

    x.lt(limit)?.where_cond(&series, &recurrence)
}

/// First `max_n` positive zeros of `j_l` for every `l < max_l`.
///
/// The zeros of `j_l` interlace those of `j_(l-1)`, so each is found by
/// bisection between two consecutive zeros of the previous order, starting
/// from the zeros `k pi` of `j_0`.
pub fn spherical_bessel_roots(max_l: usize, max_n: usize) -> Vec<Vec<f64>> {
    let total = max_n + max_l;
    let mut roots: Vec<Vec<f64>> = Vec::with_capacity(max_l);
    roots.push((1..=total).map(|k| k as f64 * PI).collect());
    for l in 1..max_l {
        let prev = &roots[l - 1];
        let level = prev
            .windows(2)
            .map(|w| bisect(|x| spherical_jn(l, x), w[0], w[1]))
            .collect();
        roots.push(level);
    }
    for level in &mut roots {
        level.truncate(max_n);
    }
    roots
}

fn bisect(f: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> f64 {
    let mut f_lo = f(lo);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return mid;
        }
        if (f_mid > 0.0) == (f_lo > 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-15 * hi {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Spherical Bessel radial basis.
///
/// The plain variant evaluates, for each order `l < max_l` and each of the
/// first `max_n` zeros `z_ln` of `j_l`,
/// `j_l(r z_ln / c) * sqrt(2 / c^3) / |j_(l+1)(z_ln)|`, giving
/// `max_l * max_n` columns ordered by `l` then `n`. The smooth variant uses
/// [`spherical_bessel_smooth`] with `max_n` columns.
#[derive(Debug, Clone)]
pub struct SphericalBesselFunction {
    max_l: usize,
    max_n: usize,
    cutoff: f64,
    smooth: bool,
    roots: Vec<Vec<f64>>,
    norms: Vec<Vec<f64>>,
}

impl SphericalBesselFunction {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_l` or `max_n` is zero, or
    /// [`Error::InvalidCutoff`] for a non-positive cutoff.
    pub fn new(max_l: usize, max_n: usize, cutoff: f64, smooth: bool) -> Result<Self, Error> {
        crate::error::check_cutoff(cutoff)?;
        if max_l == 0 || max_n == 0 {
            return Err(Error::InvalidConfig(format!(
                "spherical Bessel basis needs max_l > 0 and max_n > 0 (got {}, {})",
                max_l, max_n
            )));
        }

        let (roots, norms) = if smooth {
            (Vec::new(), Vec::new())
        } else {
            let roots = spherical_bessel_roots(max_l, max_n);
            let factor = (2.0 / cutoff.powi(3)).sqrt();
            let norms = roots
                .iter()
                .enumerate()
                .map(|(l, zs)| {
                    zs.iter()
                        .map(|&z| factor / spherical_jn(l + 1, z).abs())
                        .collect()
                })
                .collect();
            (roots, norms)
        };

        Ok(Self {
            max_l,
            max_n,
            cutoff,
            smooth,
            roots,
            norms,
        })
    }

    /// Number of output columns.
    pub fn width(&self) -> usize {
        if self.smooth {
            self.max_n
        } else {
            self.max_l * self.max_n
        }
    }

    /// The zeros used by the plain variant (empty for the smooth one).
    pub fn roots(&self) -> &[Vec<f64>] {
        &self.roots
    }

    /// Expands distances `(T,)` into `(T, width)` features.
    pub fn forward(&self, r: &Tensor) -> Result<Tensor, Error> {
        if self.smooth {
            return spherical_bessel_smooth(r, self.cutoff, self.max_n);
        }
        let rows = r.dim(0)?;
        if rows == 0 {
            return Ok(Tensor::zeros((0, self.width()), r.dtype(), r.device())?);
        }

        let r = r.unsqueeze(1)?;
        let mut blocks = Vec::with_capacity(self.max_l);
        for l in 0..self.max_l {
            let roots = row_tensor(&self.roots[l], r.dtype(), r.device())?;
            let norms = row_tensor(&self.norms[l], r.dtype(), r.device())?;
            let x = r.broadcast_mul(&roots)?.affine(1.0 / self.cutoff, 0.0)?;
            blocks.push(spherical_jn_tensor(l, &x)?.broadcast_mul(&norms)?);
        }
        Ok(Tensor::cat(&blocks, 1)?)
    }
}

fn row_tensor(values: &[f64], dtype: DType, device: &Device) -> candle_core::Result<Tensor> {
    Tensor::from_vec(values.to_vec(), (1, values.len()), device)?.to_dtype(dtype)
}

/// `sin(x) / x`, equal to 1 at the origin.
fn sinc(x: &Tensor) -> candle_core::Result<Tensor> {
    let ax = x.abs()?;
    let value = (ax.sin()? / ax.maximum(1e-12)?)?;
    ax.lt(1e-12)?.where_cond(&x.ones_like()?, &value)
}

/// Orthogonalized combination of sinc functions that vanishes smoothly at
/// the cutoff (Kocer et al., 2019), `(T,)` to `(T, max_n)`.
///
/// # Errors
///
/// Returns [`Error::Tensor`] if a tensor operation fails.
pub fn spherical_bessel_smooth(r: &Tensor, cutoff: f64, max_n: usize) -> Result<Tensor, Error> {
    let rows = r.dim(0)?;
    if rows == 0 {
        return Ok(Tensor::zeros((0, max_n), r.dtype(), r.device())?);
    }

    let mut fnr = Vec::with_capacity(max_n);
    for n in 0..max_n {
        let nf = n as f64;
        let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
        let coeff = sign * SQRT_2 * PI / cutoff.powf(1.5) * (nf + 1.0) * (nf + 2.0)
            / (2.0 * nf * nf + 6.0 * nf + 5.0).sqrt();
        let a = sinc(&r.affine((nf + 1.0) * PI / cutoff, 0.0)?)?;
        let b = sinc(&r.affine((nf + 2.0) * PI / cutoff, 0.0)?)?;
        fnr.push((a + b)?.affine(coeff, 0.0)?);
    }

    let en: Vec<f64> = (0..max_n)
        .map(|n| {
            let nf = n as f64;
            nf * nf * (nf + 2.0).powi(2) / (4.0 * (nf + 1.0).powi(4) + 1.0)
        })
        .collect();
    let mut dn = vec![1.0; max_n];
    for i in 1..max_n {
        dn[i] = 1.0 - en[i] / dn[i - 1];
    }

    let mut gn: Vec<Tensor> = Vec::with_capacity(max_n);
    gn.push(fnr[0].clone());
    for i in 1..max_n {
        let prev = gn[i - 1].affine((en[i] / dn[i - 1]).sqrt(), 0.0)?;
        gn.push((&fnr[i] + prev)?.affine(1.0 / dn[i].sqrt(), 0.0)?);
    }
    Ok(Tensor::stack(&gn, 1)?)
}

/// Plain sine radial basis `sqrt(2 / c) sin(n pi r / c) / r` for
/// `n = 1..=max_n`, taking its limit `sqrt(2 / c) n pi / c` at `r = 0`.
pub fn rbf_j0(r: &Tensor, cutoff: f64, max_n: usize) -> Result<Tensor, Error> {
    let rows = r.dim(0)?;
    if rows == 0 {
        return Ok(Tensor::zeros((0, max_n), r.dtype(), r.device())?);
    }
    let n: Vec<f64> = (1..=max_n).map(|k| k as f64 * PI / cutoff).collect();
    let n = row_tensor(&n, r.dtype(), r.device())?;
    let x = r.unsqueeze(1)?.broadcast_mul(&n)?;
    let norm = (2.0 / cutoff).sqrt();
    let scaled = sinc(&x)?.broadcast_mul(&n)?.affine(norm, 0.0)?;
    Ok(scaled)
}

/// Real spherical harmonics of the bond angle.
///
/// Without azimuth only the `m = 0` harmonics are used (`max_l` columns);
/// with azimuth every `m` in `-l..=l` is included (`max_l^2` columns),
/// ordered by `l` then `m`. Harmonics with `m > 0` use `cos(m phi)`, those
/// with `m < 0` use `sin(|m| phi)`, both scaled by `sqrt(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SphericalHarmonicsFunction {
    pub max_l: usize,
    pub use_phi: bool,
}

impl SphericalHarmonicsFunction {
    pub fn new(max_l: usize, use_phi: bool) -> Self {
        Self { max_l, use_phi }
    }

    pub fn width(&self) -> usize {
        if self.use_phi {
            self.max_l * self.max_l
        } else {
            self.max_l
        }
    }

    /// Evaluates the harmonics at `(T,)` bond-angle cosines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if azimuthal harmonics are enabled
    /// but `phi` is `None`.
    pub fn forward(&self, cos_theta: &Tensor, phi: Option<&Tensor>) -> Result<Tensor, Error> {
        let rows = cos_theta.dim(0)?;
        if rows == 0 {
            return Ok(Tensor::zeros(
                (0, self.width()),
                cos_theta.dtype(),
                cos_theta.device(),
            )?);
        }
        let phi = match (self.use_phi, phi) {
            (true, Some(phi)) => Some(phi),
            (true, None) => {
                return Err(Error::InvalidConfig(
                    "azimuthal harmonics require phi angles".to_string(),
                ));
            }
            (false, _) => None,
        };

        let legendre = associated_legendre(cos_theta, self.max_l)?;
        let mut columns = Vec::with_capacity(self.width());
        for (l, p_l) in legendre.iter().enumerate() {
            match phi {
                None => columns.push(p_l[0].affine(harmonic_norm(l, 0), 0.0)?),
                Some(phi) => {
                    for m in -(l as i64)..=(l as i64) {
                        let am = m.unsigned_abs() as usize;
                        let base = p_l[am].affine(harmonic_norm(l, am), 0.0)?;
                        let column = match m {
                            0 => base,
                            m if m > 0 => {
                                (base * phi.affine(m as f64, 0.0)?.cos()?)?.affine(SQRT_2, 0.0)?
                            }
                            _ => {
                                (base * phi.affine(am as f64, 0.0)?.sin()?)?.affine(SQRT_2, 0.0)?
                            }
                        };
                        columns.push(column);
                    }
                }
            }
        }
        Ok(Tensor::stack(&columns, 1)?)
    }
}

/// `sqrt((2l + 1) / (4 pi) * (l - m)! / (l + m)!)`
fn harmonic_norm(l: usize, m: usize) -> f64 {
    ((2 * l + 1) as f64 / (4.0 * PI) * factorial(l - m) / factorial(l + m)).sqrt()
}

/// `P_l^m(x)` with the Condon-Shortley phase, indexed `[l][m]` for
/// `l < max_l` and `m <= l`.
fn associated_legendre(x: &Tensor, max_l: usize) -> candle_core::Result<Vec<Vec<Tensor>>> {
    let sin_theta = x.sqr()?.affine(-1.0, 1.0)?.maximum(0.0)?.sqrt()?;

    // Diagonal P_m^m = (-1)^m (2m - 1)!! sin^m.
    let mut diagonal = Vec::with_capacity(max_l);
    diagonal.push(x.ones_like()?);
    for m in 1..max_l {
        let next = (&diagonal[m - 1] * &sin_theta)?.affine(-((2 * m - 1) as f64), 0.0)?;
        diagonal.push(next);
    }

    let mut p: Vec<Vec<Tensor>> = (0..max_l).map(|l| Vec::with_capacity(l + 1)).collect();
    for m in 0..max_l {
        for l in m..max_l {
            let value = if l == m {
                diagonal[m].clone()
            } else if l == m + 1 {
                (x * &diagonal[m])?.affine((2 * m + 1) as f64, 0.0)?
            } else {
                let a = (x * &p[l - 1][m])?.affine((2 * l - 1) as f64, 0.0)?;
                let b = p[l - 2][m].affine((l + m - 1) as f64, 0.0)?;
                (a - b)?.affine(1.0 / (l - m) as f64, 0.0)?
            };
            p[l].push(value);
        }
    }
    Ok(p)
}

/// Combines radial `(T, max_n * max_l)` and angular features into the
/// three-body basis.
///
/// Column `(l, n, m)` of the output is `sbf[:, l * max_n + n] *
/// shf[:, offset_l + m]`, where `m` ranges over the angular columns of
/// order `l`. The width is `max_n * max_l` without azimuth and
/// `max_n * max_l^2` with it.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the input widths or row counts
/// disagree with `max_n`, `max_l` and `use_phi`.
pub fn combine_sbf_shf(
    sbf: &Tensor,
    shf: &Tensor,
    max_n: usize,
    max_l: usize,
    use_phi: bool,
) -> Result<Tensor, Error> {
    let (rows, sbf_width) = sbf.dims2()?;
    let (shf_rows, shf_width) = shf.dims2()?;
    if sbf_width != max_n * max_l {
        return Err(Error::shape_mismatch("radial basis width", max_n * max_l, sbf_width));
    }
    let block = |l: usize| if use_phi { 2 * l + 1 } else { 1 };
    let expected_shf: usize = (0..max_l).map(block).sum();
    if shf_width != expected_shf {
        return Err(Error::shape_mismatch("angular basis width", expected_shf, shf_width));
    }
    if shf_rows != rows {
        return Err(Error::shape_mismatch("angular basis rows", rows, shf_rows));
    }

    let mut sbf_idx = Vec::new();
    let mut shf_idx = Vec::new();
    let mut offset = 0u32;
    for l in 0..max_l {
        for n in 0..max_n {
            for m in 0..block(l) {
                sbf_idx.push((l * max_n + n) as u32);
                shf_idx.push(offset + m as u32);
            }
        }
        offset += block(l) as u32;
    }
    if rows == 0 {
        return Ok(Tensor::zeros((0, sbf_idx.len()), sbf.dtype(), sbf.device())?);
    }

    let width = sbf_idx.len();
    let sbf_idx = Tensor::from_vec(sbf_idx, width, sbf.device())?;
    let shf_idx = Tensor::from_vec(shf_idx, width, sbf.device())?;
    Ok((sbf.index_select(&sbf_idx, 1)? * shf.index_select(&shf_idx, 1)?)?)
}

/// Gaussian radial basis `exp(-width (r - c_k)^2)` on evenly spaced centers.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianExpansion {
    centers: Vec<f64>,
    width: f64,
}

impl GaussianExpansion {
    /// Places `num_centers` centers evenly on `[initial, final_]`.
    ///
    /// Without an explicit `width`, the inverse of the mean center spacing
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if there are no centers, if `final_`
    /// does not exceed `initial`, or if the width is not positive (or
    /// cannot be derived from a single center).
    pub fn new(
        initial: f64,
        final_: f64,
        num_centers: usize,
        width: Option<f64>,
    ) -> Result<Self, Error> {
        if num_centers == 0 || !(final_ > initial) {
            return Err(Error::InvalidConfig(format!(
                "Gaussian expansion needs at least one center on an increasing range, got {} centers on [{}, {}]",
                num_centers, initial, final_
            )));
        }
        let step = if num_centers > 1 {
            (final_ - initial) / (num_centers - 1) as f64
        } else {
            0.0
        };
        let centers: Vec<f64> = (0..num_centers).map(|k| initial + k as f64 * step).collect();

        let width = match width {
            Some(w) => w,
            None if num_centers > 1 => 1.0 / step,
            None => {
                return Err(Error::InvalidConfig(
                    "Gaussian width must be given for a single center".to_string(),
                ));
            }
        };
        if !(width > 0.0) || !width.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "Gaussian width must be positive, got {}",
                width
            )));
        }
        Ok(Self { centers, width })
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn num_centers(&self) -> usize {
        self.centers.len()
    }

    /// Expands distances `(T,)` into `(T, num_centers)` features.
    pub fn forward(&self, r: &Tensor) -> Result<Tensor, Error> {
        let rows = r.dim(0)?;
        if rows == 0 {
            return Ok(Tensor::zeros((0, self.centers.len()), r.dtype(), r.device())?);
        }
        let centers = row_tensor(&self.centers, r.dtype(), r.device())?;
        Ok(r
            .unsqueeze(1)?
            .broadcast_sub(&centers)?
            .sqr()?
            .affine(-self.width, 0.0)?
            .exp()?)
    }
}
