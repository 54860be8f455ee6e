//! Group color palette.
//!
//! One palette is drawn when an engine is built and never changes afterwards.
//! Each group of a frame is colored by its position in the partition, so the
//! same group index maps to the same color for the whole session.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Number of precomputed group colors.
pub const PALETTE_SIZE: usize = 255;

/// RGB triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Immutable set of `PALETTE_SIZE` colors.
///
/// Colors are independent uniform draws over the full byte range per channel.
/// Collisions are possible and tolerated.
#[derive(Clone, Debug)]
pub struct Palette {
    colors: Box<[Rgb; PALETTE_SIZE]>,
}

impl Palette {
    /// Draw a fresh palette from the thread-local RNG.
    pub fn generate() -> Self {
        Self::from_rng(&mut rand::thread_rng())
    }

    /// Reproducible palette for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self::from_rng(&mut StdRng::seed_from_u64(seed))
    }

    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut colors = Box::new([Rgb::new(0, 0, 0); PALETTE_SIZE]);
        for color in colors.iter_mut() {
            *color = Rgb::new(rng.gen(), rng.gen(), rng.gen());
        }
        Self { colors }
    }

    /// Color for a group index. Indices past the end wrap around.
    pub fn color(&self, group_index: usize) -> Rgb {
        if group_index >= PALETTE_SIZE {
            log::warn!(
                "group index {} exceeds palette size {}, wrapping",
                group_index,
                PALETTE_SIZE
            );
        }
        self.colors[group_index % PALETTE_SIZE]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rgb> {
        self.colors.iter()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_fixed_size() {
        let palette = Palette::generate();
        assert_eq!(palette.len(), PALETTE_SIZE);
        assert_eq!(palette.iter().count(), 255);
    }

    #[test]
    fn seeded_palettes_are_reproducible() {
        let a = Palette::from_seed(42);
        let b = Palette::from_seed(42);
        let c = Palette::from_seed(43);

        assert!(a.iter().eq(b.iter()));
        assert!(!a.iter().eq(c.iter()));
    }

    #[test]
    fn palette_uses_full_byte_range() {
        let palette = Palette::from_seed(7);
        let distinct: std::collections::HashSet<_> = palette.iter().collect();
        // 255 uniform 24-bit draws colliding heavily would mean a broken generator.
        assert!(distinct.len() > 250);
        assert!(palette.iter().any(|c| c.r > 127));
        assert!(palette.iter().any(|c| c.g < 128));
    }

    #[test]
    fn color_wraps_past_palette_end() {
        let palette = Palette::from_seed(1);
        assert_eq!(palette.color(0), palette.color(PALETTE_SIZE));
        assert_eq!(palette.color(3), palette.color(PALETTE_SIZE + 3));
    }
}
