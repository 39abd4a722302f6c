use faer::Mat;

#[must_use]
pub fn select_rows(matrix: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(indices.len(), matrix.ncols(), |i, j| {
        matrix[(indices[i], j)]
    })
}

#[must_use]
pub fn select_columns(matrix: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(matrix.nrows(), indices.len(), |i, j| {
        matrix[(i, indices[j])]
    })
}

#[must_use]
pub fn select_values(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&idx| values[idx]).collect()
}

/// `(Mᵀ + M) / 2`.
#[must_use]
pub fn symmetrize_matrix(matrix: &Mat<f64>) -> Mat<f64> {
    Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| {
        0.5 * (matrix[(j, i)] + matrix[(i, j)])
    })
}

/// Symmetrize every matrix of a stack.
///
/// Repeated inversion and selection leaves small asymmetries behind; a
/// quadratic form built on an asymmetric precision can turn negative and
/// send the whole log-posterior to `-inf`.
#[must_use]
pub fn symmetrize(stack: &[Mat<f64>]) -> Vec<Mat<f64>> {
    stack.iter().map(symmetrize_matrix).collect()
}

/// Square submatrix at the cartesian product `indices x indices`.
///
/// The order of `indices` is kept, so a permuted index list permutes the
/// parameters.
#[must_use]
pub fn select_square(matrix: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(indices.len(), indices.len(), |i, j| {
        matrix[(indices[i], indices[j])]
    })
}

#[must_use]
pub fn select_submatrix(stack: &[Mat<f64>], indices: &[usize]) -> Vec<Mat<f64>> {
    stack
        .iter()
        .map(|matrix| select_square(matrix, indices))
        .collect()
}

/// Standard deviations and correlation matrix of a covariance matrix.
///
/// Zero or negative variances are not guarded: they surface as `NaN` or
/// `inf` entries.
#[must_use]
pub fn cov_to_std(cov: &Mat<f64>) -> (Vec<f64>, Mat<f64>) {
    let std: Vec<f64> = (0..cov.nrows()).map(|i| cov[(i, i)].sqrt()).collect();
    let corr = Mat::from_fn(cov.nrows(), cov.ncols(), |i, j| {
        cov[(i, j)] * (1.0 / std[i]) * (1.0 / std[j])
    });
    (std, corr)
}
