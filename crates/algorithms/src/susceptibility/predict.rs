//! Probability grid from a feature stack and a trained classifier

use super::artifact::TrainedClassifier;
use super::stack::FeatureStack;
use crate::maybe_rayon::*;
use georisk_core::{CancellationToken, Error, Raster, Result};
use ndarray::Array2;

/// Class-1 probability for every cell of `stack`.
///
/// The stack's band names must equal the model's feature names, in order.
/// Cells where any band is no-data are NaN. Cancellation is checked once
/// per row.
pub fn predict_susceptibility(
    stack: &FeatureStack,
    classifier: &TrainedClassifier,
    cancel: &CancellationToken,
) -> Result<Raster<f64>> {
    if stack.names() != classifier.feature_names.as_slice() {
        return Err(Error::GridMismatch(format!(
            "feature stack bands {:?} do not match model features {:?}",
            stack.names(),
            classifier.feature_names
        )));
    }

    let (rows, cols) = stack.shape();
    let row_values: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|row| -> Result<Vec<f64>> {
            cancel.check()?;
            let mut buf = Vec::with_capacity(stack.n_features());
            Ok((0..cols)
                .map(|col| {
                    if stack.fill_values(row, col, &mut buf) {
                        classifier.predict_proba(&buf)
                    } else {
                        f64::NAN
                    }
                })
                .collect())
        })
        .collect::<Result<Vec<_>>>()?;

    let data = Array2::from_shape_vec((rows, cols), row_values.into_iter().flatten().collect())
        .map_err(|e| Error::Other(e.to_string()))?;
    stack.reference().derive(data, Some(f64::NAN))
}
