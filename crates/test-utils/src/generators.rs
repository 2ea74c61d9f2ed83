//! Test data generators for creating synthetic survey data.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite.

/// Creates a depth grid with predictable values.
///
/// Each node is `-(row * 100 + col) / 10`, so every node in a small grid
/// has a distinct negative elevation.
///
/// # Example
///
/// ```
/// use test_utils::create_depth_grid;
///
/// let grid = create_depth_grid(2, 3);
/// assert_eq!(grid.len(), 6);
/// assert_eq!(grid[0], 0.0);
/// assert_eq!(grid[1], -0.1);   // row 0, col 1
/// assert_eq!(grid[3], -10.0);  // row 1, col 0
/// ```
pub fn create_depth_grid(rows: usize, columns: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * columns);
    for row in 0..rows {
        for col in 0..columns {
            data.push(-((row * 100 + col) as f32) / 10.0);
        }
    }
    data
}

/// Creates an uncertainty grid growing with depth: `0.5 + depth * 0.01`.
pub fn create_uncertainty_grid(rows: usize, columns: usize) -> Vec<f32> {
    create_depth_grid(rows, columns)
        .into_iter()
        .map(|depth| 0.5 + depth.abs() * 0.01)
        .collect()
}

/// Creates a grid sloping linearly from `shallow` at column 0 to `deep`
/// at the last column.
pub fn create_sloped_seafloor(rows: usize, columns: usize, shallow: f32, deep: f32) -> Vec<f32> {
    let step = if columns > 1 {
        (deep - shallow) / (columns - 1) as f32
    } else {
        0.0
    };
    let mut data = Vec::with_capacity(rows * columns);
    for _row in 0..rows {
        for col in 0..columns {
            data.push(shallow + step * col as f32);
        }
    }
    data
}

/// Creates a key grid cycling through `1..=max_key`, row-major.
pub fn create_key_grid(rows: usize, columns: usize, max_key: u32) -> Vec<u32> {
    let max_key = max_key.max(1);
    (0..rows * columns)
        .map(|i| (i as u32 % max_key) + 1)
        .collect()
}

/// Replaces every `every`-th value with `null`, starting at index 0.
pub fn with_null_cells(mut data: Vec<f32>, every: usize, null: f32) -> Vec<f32> {
    if every == 0 {
        return data;
    }
    for value in data.iter_mut().step_by(every) {
        *value = null;
    }
    data
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(rows: usize, columns: usize, value: f32) -> Vec<f32> {
    vec![value; rows * columns]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_grid_values() {
        let grid = create_depth_grid(3, 4);
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[4 + 2], -10.2);
        assert!(grid.iter().all(|v| *v <= 0.0));
    }

    #[test]
    fn test_sloped_seafloor_endpoints() {
        let grid = create_sloped_seafloor(2, 5, -10.0, -30.0);
        assert_eq!(grid[0], -10.0);
        assert_eq!(grid[4], -30.0);
        assert_eq!(grid[5], -10.0);
        assert_eq!(create_sloped_seafloor(1, 1, -3.0, -9.0), vec![-3.0]);
    }

    #[test]
    fn test_key_grid_cycles() {
        assert_eq!(create_key_grid(1, 5, 2), vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_with_null_cells() {
        let data = with_null_cells(vec![1.0; 5], 2, 9.0);
        assert_eq!(data, vec![9.0, 1.0, 9.0, 1.0, 9.0]);
        assert_eq!(with_null_cells(vec![1.0; 2], 0, 9.0), vec![1.0; 2]);
    }

    #[test]
    fn test_constant_grid() {
        assert_eq!(create_constant_grid(2, 2, -5.0), vec![-5.0; 4]);
    }
}
