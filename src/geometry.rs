//! Cell centroids from segmentation bounding boxes.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};

use crate::error::CellError;
use crate::table::Table;

/// Names of the four bounding-box columns
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox<'a> {
    /// Column with the minimum x value
    pub x_min: &'a str,
    /// Column with the maximum x value
    pub x_max: &'a str,
    /// Column with the minimum y value
    pub y_min: &'a str,
    /// Column with the maximum y value
    pub y_max: &'a str,
}

impl<'a> BoundingBox<'a> {
    /// Bounding box over the given columns.
    pub fn new(x_min: &'a str, x_max: &'a str, y_min: &'a str, y_max: &'a str) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
}

/// Append the centroid of each row's bounding box as `new_x` / `new_y`.
///
/// The table is modified in place and handed back for chaining. New column
/// names may only contain ASCII letters, digits and underscores.
pub fn calculate_centroid<'t>(
    table: &'t mut Table,
    bounds: BoundingBox<'_>,
    new_x: &str,
    new_y: &str,
) -> Result<&'t mut Table, CellError> {
    for name in [new_x, new_y] {
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CellError::invalid(format!(
                "Column name {name} contains invalid characters. \
                 Use only alphanumeric characters and underscores."
            )));
        }
    }

    for column in [bounds.x_min, bounds.x_max, bounds.y_min, bounds.y_max] {
        if !table.has_column(column) {
            return Err(CellError::ColumnNotFound(column.to_string()));
        }
    }

    let x = midpoints(table.numeric(bounds.x_min)?, table.numeric(bounds.x_max)?);
    let y = midpoints(table.numeric(bounds.y_min)?, table.numeric(bounds.y_max)?);

    table.set_column(new_x, x)?;
    table.set_column(new_y, y)?;
    Ok(table)
}

fn midpoints(low: Vec<f64>, high: Vec<f64>) -> ArrayRef {
    let values: Vec<f64> = low.iter().zip(&high).map(|(a, b)| (a + b) / 2.0).collect();
    Arc::new(Float64Array::from(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;

    fn boxes() -> Table {
        Table::from_columns(vec![
            ("x_min", Arc::new(Int64Array::from(vec![0, 2])) as ArrayRef),
            ("x_max", Arc::new(Int64Array::from(vec![10, 4])) as ArrayRef),
            ("y_min", Arc::new(Float64Array::from(vec![0.0, 1.0])) as ArrayRef),
            ("y_max", Arc::new(Float64Array::from(vec![20.0, 2.0])) as ArrayRef),
        ])
        .unwrap()
    }

    const BOUNDS: BoundingBox<'static> = BoundingBox {
        x_min: "x_min",
        x_max: "x_max",
        y_min: "y_min",
        y_max: "y_max",
    };

    #[test]
    fn test_centroid_midpoints() {
        let mut table = boxes();
        calculate_centroid(&mut table, BOUNDS, "new_x", "new_y").unwrap();

        assert_eq!(table.numeric("new_x").unwrap(), vec![5.0, 3.0]);
        assert_eq!(table.numeric("new_y").unwrap(), vec![10.0, 1.5]);
        assert_eq!(table.num_columns(), 6);
    }

    #[test]
    fn test_invalid_new_name() {
        let mut table = boxes();
        let err = calculate_centroid(&mut table, BOUNDS, "new x", "new_y").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        assert_eq!(table.num_columns(), 4);
    }

    #[test]
    fn test_missing_source_column() {
        let mut table = boxes();
        let bounds = BoundingBox::new("x_min", "x_max", "y_min", "y_top");
        let err = calculate_centroid(&mut table, bounds, "cx", "cy").unwrap_err();
        assert!(matches!(err, CellError::ColumnNotFound(ref c) if c == "y_top"));
    }
}
