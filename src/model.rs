//! K-Means persona segmentation

use std::collections::HashSet;

use linfa::prelude::*;
use linfa::{Dataset, DatasetBase};
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::data::NumericColumn;
use crate::error::AnalyticsError;
use crate::filter::FilteredView;

/// Features used for persona discovery: engagement and tenure
pub const PERSONA_FEATURES: [NumericColumn; 2] =
    [NumericColumn::TotalSessions, NumericColumn::DaysActive];

/// Seed for K-Means initialisation
pub const SEGMENTATION_SEED: u64 = 42;

/// Accepted cluster counts
pub const MIN_CLUSTERS: usize = 2;
pub const MAX_CLUSTERS: usize = 5;

const MAX_ITERATIONS: u64 = 300;
const TOLERANCE: f64 = 1e-4;

/// Display labels by cluster index.
///
/// K-Means cluster indices carry no meaning and can change between fits, so
/// the same label may name different populations after a filter change.
pub const PERSONA_LABELS: [&str; MAX_CLUSTERS] = [
    "Casual Explorers",
    "Power Users",
    "Loyal Fans",
    "Churn-Prone",
    "New Enthusiasts",
];

/// Persona of one user in the current view
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaAssignment {
    pub user_id: String,
    pub cluster_id: usize,
    pub persona: &'static str,
}

/// Result of one K-Means fit over a filtered view.
///
/// Holds its own assignment list; the table and view are left untouched.
#[derive(Debug, Clone)]
pub struct Segmentation {
    k: usize,
    assignments: Vec<PersonaAssignment>,
    centroids: Array2<f64>,
    scaler: LinearScaler<f64>,
    inertia: f64,
}

impl Segmentation {
    pub fn k(&self) -> usize {
        self.k
    }

    /// One assignment per view row, in view order
    pub fn assignments(&self) -> &[PersonaAssignment] {
        &self.assignments
    }

    pub fn get(&self, user_id: &str) -> Option<&PersonaAssignment> {
        self.assignments.iter().find(|a| a.user_id == user_id)
    }

    /// Cluster centroids in standardized feature space
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Standard scaler fitted on the view's raw features
    pub fn scaler(&self) -> &LinearScaler<f64> {
        &self.scaler
    }

    /// K-Means inertia reported by the fitted model
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for assignment in &self.assignments {
            sizes[assignment.cluster_id] += 1;
        }
        sizes
    }

    /// Persona labels with their user counts, largest first
    pub fn persona_counts(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = self
            .cluster_sizes()
            .into_iter()
            .enumerate()
            .filter(|(_, size)| *size > 0)
            .map(|(cluster, size)| (PERSONA_LABELS[cluster], size))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

/// Cluster the view into `k` personas
///
/// Features are standardized over the view itself, so persona meaning is
/// relative to the filtered population. The RNG is re-seeded on every call:
/// the same view and `k` always produce the same assignments.
///
/// # Arguments
/// * `view` - Rows to cluster; left untouched
/// * `features` - Numeric columns forming the feature space, usually [`PERSONA_FEATURES`]
/// * `k` - Number of clusters, within `[MIN_CLUSTERS, MAX_CLUSTERS]`
///
/// # Returns
/// * `Segmentation` with one assignment per view row, in view order
///
/// # Errors
/// * `InvalidParameter`: `k` outside `[2, 5]`, no features, or a feature
///   with missing values
/// * `InsufficientData`: fewer rows (or distinct points) than `k`
pub fn segment(
    view: &FilteredView<'_>,
    features: &[NumericColumn],
    k: usize,
) -> crate::Result<Segmentation> {
    if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&k) {
        return Err(AnalyticsError::InvalidParameter(format!(
            "number of clusters must be between {} and {}, got {}",
            MIN_CLUSTERS, MAX_CLUSTERS, k
        )));
    }
    if features.is_empty() {
        return Err(AnalyticsError::InvalidParameter(
            "at least one feature is required".to_string(),
        ));
    }
    if view.len() < k {
        return Err(AnalyticsError::InsufficientData(format!(
            "view has {} row(s), need at least {} for {} clusters",
            view.len(),
            k,
            k
        )));
    }

    let raw = feature_matrix(view, features)?;
    let distinct = distinct_points(&raw);
    if distinct < k {
        return Err(AnalyticsError::InsufficientData(format!(
            "view has {} distinct point(s), need at least {} for {} clusters",
            distinct, k, k
        )));
    }

    // Standardize over this view only
    let n_rows = raw.nrows();
    let scaler = LinearScaler::standard()
        .fit(&Dataset::new(raw.clone(), Array1::<f64>::zeros(n_rows)))
        .map_err(|e| AnalyticsError::Clustering(format!("feature scaling: {}", e)))?;
    let scaled = scaler.transform(raw);

    // Fit K-Means with a fixed seed
    let dataset = DatasetBase::from(scaled.clone());
    let rng = StdRng::seed_from_u64(SEGMENTATION_SEED);
    let model = KMeans::params_with(k, rng, L2Dist)
        .max_n_iterations(MAX_ITERATIONS)
        .tolerance(TOLERANCE)
        .fit(&dataset)
        .map_err(|e| AnalyticsError::Clustering(e.to_string()))?;

    let labels: Array1<usize> = model.predict(&scaled);
    let centroids = model.centroids().clone();
    let inertia = model.inertia();

    let assignments = view
        .iter()
        .zip(labels.iter())
        .map(|(record, &cluster_id)| PersonaAssignment {
            user_id: record.user_id.clone(),
            cluster_id,
            persona: PERSONA_LABELS[cluster_id],
        })
        .collect();

    debug!(rows = view.len(), k, inertia, "Fitted persona segmentation");

    Ok(Segmentation {
        k,
        assignments,
        centroids,
        scaler,
        inertia,
    })
}

fn feature_matrix(view: &FilteredView<'_>, features: &[NumericColumn]) -> crate::Result<Array2<f64>> {
    let mut data = Vec::with_capacity(view.len() * features.len());
    for record in view.iter() {
        for feature in features {
            let value = feature.value(record).ok_or_else(|| {
                AnalyticsError::InvalidParameter(format!(
                    "feature '{}' has missing values for user {}",
                    feature.name(),
                    record.user_id
                ))
            })?;
            data.push(value);
        }
    }
    Array2::from_shape_vec((view.len(), features.len()), data)
        .map_err(|e| AnalyticsError::InvalidParameter(e.to_string()))
}

fn distinct_points(features: &Array2<f64>) -> usize {
    features
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}
