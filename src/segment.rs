//! Customer segmentation with K-Means.
//!
//! Entities (customers) are reduced to one row of summed feature values each,
//! then partitioned into `k` groups. Cluster labels carry no meaning beyond
//! grouping; compare results with [`Segmentation::partition`] unless the seed
//! is pinned.

use crate::error::{AnalysisError, AnalysisResult};
use crate::loader::{CUSTOMER, CUSTOMER_EMAIL, REVENUE};
use crate::schema::validate;
use crate::types::{RecordTable, SegmentRow};
use crate::util::format_number;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// K-Means settings. The seed fixes initialization, so identical input
/// yields identical assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Column identifying a customer. When unset, `Customer` is used, or
    /// `Customer Email` if the file only has that.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_column: Option<String>,
    pub clusters: usize,
    pub seed: u64,
    pub max_iterations: u64,
    pub tolerance: f64,
    pub n_runs: usize,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            entity_column: None,
            clusters: 3,
            seed: 0,
            max_iterations: 300,
            tolerance: 1e-4,
            n_runs: 10,
        }
    }
}

/// Per-entity aggregated features, one row per entity in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFeatures {
    pub entities: Vec<String>,
    pub feature_names: Vec<String>,
    pub values: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAssignment {
    pub entity: String,
    pub segment: usize,
    /// Raw (unscaled) feature values the entity was clustered on.
    pub features: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub clusters: usize,
    pub feature_names: Vec<String>,
    pub assignments: Vec<SegmentAssignment>,
    /// Centroids in the space the model was fitted in (standardized when
    /// more than one feature was used).
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares.
    pub inertia: f64,
}

impl Segmentation {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.clusters];
        for a in &self.assignments {
            if a.segment < self.clusters {
                sizes[a.segment] += 1;
            }
        }
        sizes
    }

    /// Groups of entity names, independent of label values.
    pub fn partition(&self) -> BTreeSet<BTreeSet<String>> {
        let mut groups: HashMap<usize, BTreeSet<String>> = HashMap::new();
        for a in &self.assignments {
            groups.entry(a.segment).or_default().insert(a.entity.clone());
        }
        groups.into_values().collect()
    }

    pub fn labels(&self) -> Vec<usize> {
        self.assignments.iter().map(|a| a.segment).collect()
    }

    pub fn rows(&self) -> Vec<SegmentRow> {
        self.assignments
            .iter()
            .map(|a| SegmentRow {
                customer: a.entity.clone(),
                features: a
                    .features
                    .iter()
                    .map(|v| format_number(*v, 2))
                    .collect::<Vec<_>>()
                    .join(" / "),
                segment: a.segment,
            })
            .collect()
    }
}

/// Sum each feature column per entity. Rows without an entity key are
/// skipped; blank feature cells count as nothing.
pub fn customer_features(
    table: &RecordTable,
    entity: &str,
    features: &[&str],
) -> AnalysisResult<EntityFeatures> {
    let mut required = vec![entity];
    required.extend_from_slice(features);
    validate(table, &required)?;
    if table.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    let keys = table.keys(entity)?;
    let columns = features
        .iter()
        .map(|f| table.numbers(f))
        .collect::<AnalysisResult<Vec<_>>>()?;

    let mut entities: Vec<String> = Vec::new();
    let mut sums: Vec<Vec<f64>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (row, key) in keys.into_iter().enumerate() {
        let Some(key) = key else { continue };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            entities.push(key);
            sums.push(vec![0.0; features.len()]);
            entities.len() - 1
        });
        for (f, column) in columns.iter().enumerate() {
            sums[slot][f] += column[row].unwrap_or(0.0);
        }
    }

    let flat: Vec<f64> = sums.into_iter().flatten().collect();
    let values = Array2::from_shape_vec((entities.len(), features.len()), flat)
        .map_err(|e| AnalysisError::Clustering(e.to_string()))?;
    Ok(EntityFeatures {
        entities,
        feature_names: features.iter().map(|f| f.to_string()).collect(),
        values,
    })
}

/// Zero mean, unit variance per column. Constant columns are only centered.
fn standardize(values: &Array2<f64>) -> Array2<f64> {
    let mean = values
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(values.ncols()));
    let std = values
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 0.0 { s } else { 1.0 });
    (values - &mean) / &std
}

fn distinct_rows(values: &Array2<f64>) -> usize {
    values
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c < centroids.nrows())
        .map(|(i, &c)| {
            features
                .row(i)
                .iter()
                .zip(centroids.row(c).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
        })
        .sum()
}

/// Partition entities into `params.clusters` groups.
pub fn segment(
    features: &EntityFeatures,
    params: &SegmentParams,
) -> AnalysisResult<Segmentation> {
    let k = params.clusters;
    if k == 0 {
        return Err(AnalysisError::Clustering(
            "cluster count must be at least 1".to_string(),
        ));
    }
    let n = features.entities.len();
    if n < k {
        return Err(AnalysisError::InsufficientEntities { needed: k, found: n });
    }
    let distinct = distinct_rows(&features.values);
    if distinct < k {
        return Err(AnalysisError::InsufficientEntities {
            needed: k,
            found: distinct,
        });
    }

    let fitted_space = if features.values.ncols() > 1 {
        standardize(&features.values)
    } else {
        features.values.clone()
    };

    let dataset = Dataset::new(fitted_space.clone(), Array1::<usize>::zeros(n));
    let rng = StdRng::seed_from_u64(params.seed);
    let model = KMeans::params_with(k, rng, L2Dist)
        .max_n_iterations(params.max_iterations)
        .tolerance(params.tolerance)
        .n_runs(params.n_runs)
        .fit(&dataset)
        .map_err(|e| AnalysisError::Clustering(e.to_string()))?;

    let labels: Array1<usize> = model.predict(&fitted_space);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(&fitted_space, &labels, &centroids);

    let assignments = features
        .entities
        .iter()
        .zip(labels.iter())
        .zip(features.values.outer_iter())
        .map(|((entity, &segment), row)| SegmentAssignment {
            entity: entity.clone(),
            segment,
            features: row.to_vec(),
        })
        .collect();

    let result = Segmentation {
        clusters: k,
        feature_names: features.feature_names.clone(),
        assignments,
        centroids,
        inertia,
    };
    debug!(sizes = ?result.cluster_sizes(), inertia, "k-means fitted");
    Ok(result)
}

/// The customer identifier column `params` selects for `table`.
pub fn entity_column<'a>(table: &RecordTable, params: &'a SegmentParams) -> &'a str {
    if let Some(column) = params.entity_column.as_deref() {
        return column;
    }
    [CUSTOMER, CUSTOMER_EMAIL]
        .into_iter()
        .find(|c| table.has_column(c))
        .unwrap_or(CUSTOMER)
}

/// Total revenue per customer, clustered.
pub fn segment_customers(
    table: &RecordTable,
    params: &SegmentParams,
) -> AnalysisResult<Segmentation> {
    let entity = entity_column(table, params);
    validate(table, &[entity, REVENUE])?;
    let features = customer_features(table, entity, &[REVENUE])?;
    info!(
        entity,
        customers = features.entities.len(),
        clusters = params.clusters,
        "segmenting customers"
    );
    segment(&features, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revenue_table(values: &[(&str, &str)]) -> RecordTable {
        let rows: Vec<Vec<&str>> = values.iter().map(|(c, r)| vec![*c, *r]).collect();
        RecordTable::from_rows(&["Customer", "Revenue"], &rows)
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn separated() -> RecordTable {
        revenue_table(&[
            ("c1", "10"),
            ("c2", "10"),
            ("c3", "500"),
            ("c4", "500"),
            ("c5", "9000"),
            ("c6", "9000"),
        ])
    }

    #[test]
    fn well_separated_values_form_three_pairs() {
        let seg = segment_customers(&separated(), &SegmentParams::default()).unwrap();
        let expected: BTreeSet<BTreeSet<String>> = [
            set(&["c1", "c2"]),
            set(&["c3", "c4"]),
            set(&["c5", "c6"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(seg.partition(), expected);
        let mut sizes = seg.cluster_sizes();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 2, 2]);
        assert!(seg.inertia.abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_labels() {
        let table = revenue_table(&[
            ("a", "12"),
            ("b", "15"),
            ("c", "300"),
            ("d", "340"),
            ("e", "7000"),
            ("f", "7200"),
            ("g", "90"),
        ]);
        let params = SegmentParams {
            seed: 42,
            ..SegmentParams::default()
        };
        let first = segment_customers(&table, &params).unwrap();
        let second = segment_customers(&table, &params).unwrap();
        assert_eq!(first.labels(), second.labels());
    }

    #[test]
    fn revenue_is_summed_per_customer() {
        let table = revenue_table(&[("x", "5"), ("y", "1"), ("x", "7"), ("", "100")]);
        let features = customer_features(&table, "Customer", &["Revenue"]).unwrap();
        assert_eq!(features.entities, vec!["x", "y"]);
        assert_eq!(features.values.column(0).to_vec(), vec![12.0, 1.0]);
    }

    #[test]
    fn fewer_entities_than_clusters_is_an_error() {
        let table = revenue_table(&[("a", "1"), ("b", "2")]);
        assert_eq!(
            segment_customers(&table, &SegmentParams::default()).unwrap_err(),
            AnalysisError::InsufficientEntities { needed: 3, found: 2 }
        );
    }

    #[test]
    fn identical_entities_cannot_fill_three_clusters() {
        let table = revenue_table(&[("a", "5"), ("b", "5"), ("c", "5"), ("d", "9")]);
        assert_eq!(
            segment_customers(&table, &SegmentParams::default()).unwrap_err(),
            AnalysisError::InsufficientEntities { needed: 3, found: 2 }
        );
    }

    #[test]
    fn missing_customer_column_is_reported() {
        let table = RecordTable::from_rows(&["Revenue"], &[vec!["1"]]);
        assert_eq!(
            segment_customers(&table, &SegmentParams::default()).unwrap_err(),
            AnalysisError::MissingColumns(vec!["Customer".into()])
        );
    }

    #[test]
    fn multiple_features_are_standardized() {
        let table = RecordTable::from_rows(
            &["Customer", "Revenue", "Quantity Sold"],
            &[
                vec!["a", "10", "1"],
                vec!["b", "12", "2"],
                vec!["c", "5000", "50"],
                vec!["d", "5010", "52"],
                vec!["e", "10000", "100"],
                vec!["f", "10020", "101"],
            ],
        );
        let features =
            customer_features(&table, "Customer", &["Revenue", "Quantity Sold"]).unwrap();
        let scaled = standardize(&features.values);
        let means = scaled.mean_axis(Axis(0)).unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-9));

        let seg = segment(&features, &SegmentParams::default()).unwrap();
        assert_eq!(seg.centroids.ncols(), 2);
        for pair in [["a", "b"], ["c", "d"], ["e", "f"]] {
            assert!(seg.partition().contains(&set(&pair)));
        }
    }

    #[test]
    fn customer_email_identifies_customers_when_customer_is_absent() {
        let rows: Vec<Vec<&str>> = [
            ("ann@example.com", "10"),
            ("bob@example.com", "12"),
            ("cat@example.com", "500"),
            ("dan@example.com", "520"),
            ("eve@example.com", "9000"),
            ("fay@example.com", "9100"),
        ]
        .iter()
        .map(|(c, r)| vec![*c, *r])
        .collect();
        let table = RecordTable::from_rows(&["Customer Email", "Revenue"], &rows);
        let params = SegmentParams::default();
        assert_eq!(entity_column(&table, &params), "Customer Email");

        let seg = segment_customers(&table, &params).unwrap();
        assert!(seg
            .partition()
            .contains(&set(&["ann@example.com", "bob@example.com"])));
    }

    #[test]
    fn configured_entity_column_wins() {
        let table = RecordTable::from_rows(
            &["Customer", "Account", "Revenue"],
            &[vec!["x", "a1", "1"], vec!["x", "a2", "2"]],
        );
        let params = SegmentParams {
            entity_column: Some("Account".to_string()),
            ..SegmentParams::default()
        };
        assert_eq!(entity_column(&table, &params), "Account");
        assert_eq!(
            segment_customers(&table, &params).unwrap_err(),
            AnalysisError::InsufficientEntities { needed: 3, found: 2 }
        );
    }

    #[test]
    fn numeric_looking_ids_stay_distinct() {
        let table = revenue_table(&[
            ("00123", "10"),
            ("123", "20"),
            ("12345678901234567", "30"),
            ("12345678901234568", "40"),
        ]);
        let features = customer_features(&table, "Customer", &["Revenue"]).unwrap();
        assert_eq!(
            features.entities,
            vec!["00123", "123", "12345678901234567", "12345678901234568"]
        );
        assert_eq!(features.values.column(0).to_vec(), vec![10.0, 20.0, 30.0, 40.0]);
    }
}
