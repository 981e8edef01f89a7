//! Cell shapes for grid items

use crate::error::ShapeError;
use serde::{Deserialize, Serialize};

/// Clockwise rotation of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse an angle in degrees. Only multiples of 90 are valid; negative
    /// angles wrap.
    pub fn from_degrees(degrees: i32) -> Result<Self, ShapeError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(ShapeError::InvalidRotation(degrees)),
        }
    }

    /// Angle in degrees
    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Next rotation step clockwise
    pub fn clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }
}

/// Relative cells occupied by a multi-cell item, plus its rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemShape {
    cells: Vec<(i32, i32)>,
    rotation: Rotation,
}

impl ItemShape {
    /// Create a shape from relative cell coordinates
    pub fn new(cells: Vec<(i32, i32)>) -> Result<Self, ShapeError> {
        if cells.is_empty() {
            return Err(ShapeError::Empty);
        }
        Ok(Self {
            cells,
            rotation: Rotation::Deg0,
        })
    }

    /// Single-cell shape
    pub fn single() -> Self {
        Self {
            cells: vec![(0, 0)],
            rotation: Rotation::Deg0,
        }
    }

    /// Axis-aligned rectangle of `width` x `height` cells
    pub fn rect(width: u32, height: u32) -> Result<Self, ShapeError> {
        let cells = (0..height as i32)
            .flat_map(|y| (0..width as i32).map(move |x| (x, y)))
            .collect();
        Self::new(cells)
    }

    /// Set rotation
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Current rotation
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Set rotation
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// Rotate one step clockwise
    pub fn rotate_clockwise(&mut self) {
        self.rotation = self.rotation.clockwise();
    }

    /// Unrotated cells as given
    pub fn cells(&self) -> &[(i32, i32)] {
        &self.cells
    }

    /// Number of cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells after normalizing to the origin and applying the rotation
    pub fn occupied_cells(&self) -> Vec<(i32, i32)> {
        let min_x = self.cells.iter().map(|c| c.0).min().unwrap_or(0);
        let min_y = self.cells.iter().map(|c| c.1).min().unwrap_or(0);
        let normalized: Vec<(i32, i32)> = self
            .cells
            .iter()
            .map(|&(x, y)| (x - min_x, y - min_y))
            .collect();

        let width = normalized.iter().map(|c| c.0).max().unwrap_or(0) + 1;
        let height = normalized.iter().map(|c| c.1).max().unwrap_or(0) + 1;

        normalized
            .into_iter()
            .map(|(x, y)| match self.rotation {
                Rotation::Deg0 => (x, y),
                Rotation::Deg90 => (height - 1 - y, x),
                Rotation::Deg180 => (width - 1 - x, height - 1 - y),
                Rotation::Deg270 => (y, width - 1 - x),
            })
            .collect()
    }

    /// Bounding box (width, height) after rotation
    pub fn bounds(&self) -> (i32, i32) {
        let cells = self.occupied_cells();
        let width = cells.iter().map(|c| c.0).max().unwrap_or(0) + 1;
        let height = cells.iter().map(|c| c.1).max().unwrap_or(0) + 1;
        (width, height)
    }
}

impl Default for ItemShape {
    fn default() -> Self {
        Self::single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut cells: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
        cells.sort();
        cells
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(90).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(720).unwrap(), Rotation::Deg0);
        assert!(matches!(
            Rotation::from_degrees(45),
            Err(ShapeError::InvalidRotation(45))
        ));
    }

    #[test]
    fn test_normalizes_to_origin() {
        let shape = ItemShape::new(vec![(3, 5), (4, 5)]).unwrap();
        assert_eq!(shape.occupied_cells(), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn test_l_shape_rotations() {
        // X.
        // X.
        // XX
        let shape = ItemShape::new(vec![(0, 0), (0, 1), (0, 2), (1, 2)]).unwrap();
        assert_eq!(shape.bounds(), (2, 3));

        let r90 = shape.clone().with_rotation(Rotation::Deg90);
        assert_eq!(
            sorted(r90.occupied_cells()),
            vec![(0, 0), (0, 1), (1, 0), (2, 0)]
        );
        assert_eq!(r90.bounds(), (3, 2));

        let r180 = shape.clone().with_rotation(Rotation::Deg180);
        assert_eq!(
            sorted(r180.occupied_cells()),
            vec![(0, 0), (1, 0), (1, 1), (1, 2)]
        );

        let r270 = shape.with_rotation(Rotation::Deg270);
        assert_eq!(
            sorted(r270.occupied_cells()),
            vec![(0, 1), (1, 1), (2, 0), (2, 1)]
        );
    }

    #[test]
    fn test_full_turn_is_identity() {
        let mut shape = ItemShape::rect(2, 3).unwrap();
        let original = sorted(shape.occupied_cells());
        for _ in 0..4 {
            shape.rotate_clockwise();
        }
        assert_eq!(shape.rotation(), Rotation::Deg0);
        assert_eq!(sorted(shape.occupied_cells()), original);
    }

    #[test]
    fn test_empty_shape_rejected() {
        assert!(matches!(ItemShape::new(Vec::new()), Err(ShapeError::Empty)));
    }
}
