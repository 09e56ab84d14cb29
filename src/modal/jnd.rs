//! Perceptual just-noticeable-difference step function and mode clustering.

/// Minimum frequency separation, in Hz, at which a listener can distinguish
/// two tones near `f`.
pub fn jnd(f: f64) -> f64 {
    if f < 250.0 {
        1.0
    } else if f < 500.0 {
        1.25
    } else if f < 1000.0 {
        2.5
    } else if f < 2000.0 {
        4.0
    } else if f < 4000.0 {
        20.0
    } else if f < 8000.0 {
        88.0
    } else {
        f / 100.0
    }
}

/// A representative mode produced by clustering perceptually indistinguishable
/// eigenpairs together.
pub struct ModeCluster {
    pub frequency: f64,
    pub eigenvector: nalgebra::DVector<f64>,
}

/// Scans frequency-sorted `(frequency, eigenvector)` pairs and merges runs of
/// consecutive modes a listener could not tell apart, per the JND step
/// function above. Each cluster's representative frequency is the mean of
/// its members'; its eigenvector is the energy-preserving merge (sum divided
/// by the square root of the cluster size).
pub fn compress(frequencies: &[f64], eigenvectors: &nalgebra::DMatrix<f64>) -> Vec<ModeCluster> {
    let mut clusters = Vec::new();
    let mut i = 0;
    while i < frequencies.len() {
        let cluster_start = frequencies[i];
        let mut j = i + 1;
        while j < frequencies.len() {
            let prev = frequencies[j - 1];
            let step = jnd(prev);
            if (frequencies[j] - prev).abs() < 2.0 * step
                && (frequencies[j] - cluster_start).abs() < 4.0 * step
            {
                j += 1;
            } else {
                break;
            }
        }

        let n = j - i;
        let mean_freq = frequencies[i..j].iter().sum::<f64>() / n as f64;
        let mut merged = nalgebra::DVector::zeros(eigenvectors.nrows());
        for col in i..j {
            merged += eigenvectors.column(col);
        }
        merged /= (n as f64).sqrt();

        clusters.push(ModeCluster {
            frequency: mean_freq,
            eigenvector: merged,
        });
        i = j;
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jnd_table_boundaries() {
        assert_eq!(jnd(100.0), 1.0);
        assert_eq!(jnd(400.0), 1.25);
        assert_eq!(jnd(900.0), 2.5);
        assert_eq!(jnd(1500.0), 4.0);
        assert_eq!(jnd(3000.0), 20.0);
        assert_eq!(jnd(6000.0), 88.0);
        assert_eq!(jnd(10000.0), 100.0);
    }

    #[test]
    fn collapses_two_nearby_modes_into_one() {
        let freqs = [100.0, 100.5, 1000.0];
        let eigvecs = nalgebra::DMatrix::from_columns(&[
            nalgebra::DVector::from_element(1, 1.0),
            nalgebra::DVector::from_element(1, 1.0),
            nalgebra::DVector::from_element(1, 1.0),
        ]);
        let clusters = compress(&freqs, &eigvecs);
        assert_eq!(clusters.len(), 2);
        assert!((clusters[0].frequency - 100.25).abs() < 1e-9);
        assert!((clusters[0].eigenvector[0] - 2f64.sqrt()).abs() < 1e-9);
        assert!((clusters[1].frequency - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn compression_is_idempotent() {
        let freqs = [100.0, 100.5, 1000.0];
        let eigvecs = nalgebra::DMatrix::from_columns(&[
            nalgebra::DVector::from_element(1, 1.0),
            nalgebra::DVector::from_element(1, 1.0),
            nalgebra::DVector::from_element(1, 1.0),
        ]);
        let once = compress(&freqs, &eigvecs);
        let once_freqs: Vec<f64> = once.iter().map(|c| c.frequency).collect();
        let once_mat =
            nalgebra::DMatrix::from_columns(&once.iter().map(|c| c.eigenvector.clone()).collect::<Vec<_>>());
        let twice = compress(&once_freqs, &once_mat);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a.frequency - b.frequency).abs() < 1e-9);
        }
    }
}
