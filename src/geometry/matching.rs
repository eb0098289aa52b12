//! Assignment utilities shared by detection deduplication and re-identification.

use ndarray::{Array1, Array2};

/// Cosine distance in `[0, 2]`; `1.0` when either vector is empty, mismatched or zero.
pub fn cosine_distance(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let na = a.dot(a).sqrt();
    let nb = b.dot(b).sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - a.dot(b) / (na * nb)).clamp(0.0, 2.0)
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Solve the rectangular assignment problem on `cost_matrix`, keeping only
/// pairs whose cost is at most `thresh`.
///
/// Rows are new detections and columns are existing candidates, with cosine
/// distance as the cost. Each candidate absorbs at most one detection, so a
/// second close detection ends up in `unmatched_rows` and is admitted as a
/// new candidate. If the solver fails, every row is reported unmatched.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: (0..num_cols).collect(),
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_rows = vec![];
    let mut col_unmatched = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_rows) {
                if col < num_cols && cost_matrix[[row, col]] <= thresh {
                    matches.push((row, col));
                    col_unmatched[col] = false;
                } else {
                    unmatched_rows.push(row);
                }
            }
        }
        Err(_) => {
            unmatched_rows = (0..num_rows).collect();
        }
    }

    let unmatched_cols = col_unmatched
        .iter()
        .enumerate()
        .filter_map(|(j, &u)| u.then_some(j))
        .collect();

    AssignmentResult {
        matches,
        unmatched_rows,
        unmatched_cols,
    }
}
