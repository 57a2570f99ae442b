use std::path::Path;

use float_ord::FloatOrd;
use geo::{point, Coord, EuclideanLength, Intersects, LineString, Polygon};

use crate::AnnotationError;

/// One annotated text instance: 4 corners in clockwise order, in
/// full-resolution image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [[f32; 2]; 4],
}

impl Quad {
    pub fn new(corners: [[f32; 2]; 4]) -> Self {
        Self { corners }
    }

    /// Parses one annotation line: `x1,y1,x2,y2,x3,y3,x4,y4`.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self, AnnotationError> {
        let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
        if fields.len() != 8 {
            return Err(AnnotationError::FieldCount {
                line: line_no,
                got: fields.len(),
            });
        }
        let mut values = [0.0f32; 8];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse()
                .map_err(|source| AnnotationError::InvalidCoordinate {
                    line: line_no,
                    source,
                })?;
        }
        Ok(Self::new([
            [values[0], values[1]],
            [values[2], values[3]],
            [values[4], values[5]],
            [values[6], values[7]],
        ]))
    }

    pub fn scaled(&self, sx: f32, sy: f32) -> Quad {
        let mut corners = self.corners;
        for corner in &mut corners {
            corner[0] *= sx;
            corner[1] *= sy;
        }
        Quad { corners }
    }

    pub fn to_polygon(&self) -> Polygon<f32> {
        let ring = self
            .corners
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect::<Vec<_>>();
        Polygon::new(LineString::new(ring), vec![])
    }

    /// Inclusive membership test: a point on the quad boundary counts as
    /// inside.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.to_polygon().intersects(&point![x: x, y: y])
    }

    pub fn shortest_side(&self) -> f32 {
        self.to_polygon()
            .exterior()
            .lines()
            .map(|it| it.euclidean_length())
            .min_by_key(|&it| FloatOrd(it))
            .unwrap()
    }
}

/// Reads every quad from one annotation file. Blank lines are skipped; a
/// malformed line fails the whole file.
pub fn read_annotations(path: &Path) -> Result<Vec<Quad>, AnnotationError> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| Quad::parse_line(line, idx + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn unit_square() -> Quad {
        Quad::new([[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]])
    }

    #[test]
    fn parse_line_roundtrip() {
        let quad = Quad::parse_line("1,2.5,3,4,5,6,7,8", 1).unwrap();
        assert_eq!(quad.corners[0], [1.0, 2.5]);
        assert_eq!(quad.corners[3], [7.0, 8.0]);
    }

    #[test]
    fn parse_line_rejects_wrong_field_count() {
        let err = Quad::parse_line("1,2,3", 4).unwrap_err();
        assert!(matches!(
            err,
            AnnotationError::FieldCount { line: 4, got: 3 }
        ));
    }

    #[test]
    fn parse_line_rejects_garbage() {
        let err = Quad::parse_line("1,2,3,4,5,6,7,abc", 2).unwrap_err();
        assert!(matches!(
            err,
            AnnotationError::InvalidCoordinate { line: 2, .. }
        ));
    }

    #[test]
    fn contains_is_inclusive_on_the_boundary() {
        let quad = unit_square();
        assert!(quad.contains(5.0, 5.0));
        assert!(quad.contains(0.0, 0.0));
        assert!(quad.contains(10.0, 5.0));
        assert!(!quad.contains(10.1, 5.0));
        assert!(!quad.contains(-0.1, 0.0));
    }

    #[test]
    fn scaled_divides_into_grid_space() {
        let quad = unit_square().scaled(1.0 / 2.0, 1.0 / 5.0);
        assert_relative_eq!(quad.corners[2][0], 5.0);
        assert_relative_eq!(quad.corners[2][1], 2.0);
    }

    #[test]
    fn shortest_side_of_a_rectangle() {
        let quad = Quad::new([[0.0, 0.0], [20.0, 0.0], [20.0, 4.0], [0.0, 4.0]]);
        assert_relative_eq!(quad.shortest_side(), 4.0);
    }
}
