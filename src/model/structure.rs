use crate::error::Error;

/// A 3x3 lattice whose rows are the cell vectors, in Ångströms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    pub fn new(matrix: [[f64; 3]; 3]) -> Self {
        Self { matrix }
    }

    /// A cubic cell with edge length `a`.
    pub fn cubic(a: f64) -> Self {
        Self::new([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    /// Signed cell volume, `a · (b × c)`.
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        dot(&a, &cross(&b, &c))
    }

    /// Converts fractional coordinates to Cartesian ones.
    pub fn to_cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        let mut out = [0.0; 3];
        for (k, o) in out.iter_mut().enumerate() {
            *o = frac[0] * m[0][k] + frac[1] * m[1][k] + frac[2] * m[2][k];
        }
        out
    }

    /// Inverse of the lattice matrix, or `None` for a singular cell.
    pub fn inverse(&self) -> Option<[[f64; 3]; 3]> {
        let m = &self.matrix;
        let det = self.volume();
        if !det.is_finite() || det.abs() < 1e-10 {
            return None;
        }
        let mut inv = [[0.0; 3]; 3];
        for (i, row) in inv.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                // Cofactor of m[j][i].
                let (r0, r1) = ((j + 1) % 3, (j + 2) % 3);
                let (c0, c1) = ((i + 1) % 3, (i + 2) % 3);
                *v = (m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]) / det;
            }
        }
        Some(inv)
    }

    /// Converts Cartesian coordinates to fractional ones.
    ///
    /// Returns `None` for a singular cell.
    pub fn to_fractional(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        let inv = self.inverse()?;
        let mut out = [0.0; 3];
        for (k, o) in out.iter_mut().enumerate() {
            *o = cart[0] * inv[0][k] + cart[1] * inv[1][k] + cart[2] * inv[2][k];
        }
        Some(out)
    }

    /// Translation vector of the periodic image `image` (integer multiples
    /// of the cell vectors).
    pub fn image_shift(&self, image: [i32; 3]) -> [f64; 3] {
        self.to_cartesian([image[0] as f64, image[1] as f64, image[2] as f64])
    }

    /// Distance between opposite faces of the cell along each cell vector.
    ///
    /// A sphere of radius `r` around any point is fully covered by
    /// `ceil(r / spacing)` images in each direction.
    pub fn plane_spacings(&self) -> [f64; 3] {
        let [a, b, c] = self.matrix;
        let volume = self.volume().abs();
        [
            volume / norm(&cross(&b, &c)),
            volume / norm(&cross(&c, &a)),
            volume / norm(&cross(&a, &b)),
        ]
    }

    fn check(&self) -> Result<(), Error> {
        let volume = self.volume();
        if !volume.is_finite() || volume.abs() < 1e-10 {
            return Err(Error::InvalidStructure(format!(
                "lattice is singular (volume = {})",
                volume
            )));
        }
        Ok(())
    }
}

/// A single atomic site: species symbol and Cartesian position in Ångströms.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub species: String,
    pub position: [f64; 3],
}

impl Site {
    pub fn new(species: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            species: species.into(),
            position,
        }
    }
}

/// An atomic structure: a crystal when `lattice` is set, a finite molecule
/// otherwise.
///
/// `state` carries optional global attributes (total charge, external field,
/// ...). Converters fall back to a zero vector when it is absent.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    pub sites: Vec<Site>,
    pub lattice: Option<Lattice>,
    pub state: Option<Vec<f32>>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a periodic structure from Cartesian coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if the species and coordinate
    /// counts differ or the lattice is singular.
    pub fn periodic<I, S, C>(lattice: Lattice, species: I, coords: C) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoIterator<Item = [f64; 3]>,
    {
        lattice.check()?;
        let sites = zip_sites(species, coords)?;
        Ok(Self {
            sites,
            lattice: Some(lattice),
            state: None,
        })
    }

    /// Builds a periodic structure from fractional coordinates.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Structure::periodic`].
    pub fn periodic_fractional<I, S, C>(
        lattice: Lattice,
        species: I,
        frac_coords: C,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoIterator<Item = [f64; 3]>,
    {
        let cart: Vec<[f64; 3]> = frac_coords
            .into_iter()
            .map(|f| lattice.to_cartesian(f))
            .collect();
        Self::periodic(lattice, species, cart)
    }

    /// Builds a finite (non-periodic) molecule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if the species and coordinate
    /// counts differ.
    pub fn molecule<I, S, C>(species: I, coords: C) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoIterator<Item = [f64; 3]>,
    {
        Ok(Self {
            sites: zip_sites(species, coords)?,
            lattice: None,
            state: None,
        })
    }

    /// Attaches global state attributes.
    pub fn with_state(mut self, state: Vec<f32>) -> Self {
        self.state = Some(state);
        self
    }

    #[inline]
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.lattice.is_some()
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.sites.iter().map(|s| s.position).collect()
    }
}

fn zip_sites<I, S, C>(species: I, coords: C) -> Result<Vec<Site>, Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    C: IntoIterator<Item = [f64; 3]>,
{
    let species: Vec<String> = species.into_iter().map(Into::into).collect();
    let coords: Vec<[f64; 3]> = coords.into_iter().collect();
    if species.len() != coords.len() {
        return Err(Error::InvalidStructure(format!(
            "{} species symbols but {} coordinates",
            species.len(),
            coords.len()
        )));
    }
    if let Some(bad) = coords.iter().position(|c| c.iter().any(|x| !x.is_finite())) {
        return Err(Error::InvalidStructure(format!(
            "site {} has a non-finite coordinate",
            bad
        )));
    }
    Ok(species
        .into_iter()
        .zip(coords)
        .map(|(s, p)| Site::new(s, p))
        .collect())
}

#[inline]
pub(crate) fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn norm(v: &[f64; 3]) -> f64 {
    dot(v, v).sqrt()
}
