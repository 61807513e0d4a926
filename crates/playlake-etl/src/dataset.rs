//! A partitioned, in-memory collection of rows.
//!
//! Each partition is processed independently on the rayon pool; the only
//! operation that looks across partitions is [`Dataset::distinct`]. Rows
//! keep the partition they were read into, so partition indices stay
//! meaningful for key generation after filtering and deduplication.

use std::collections::HashSet;
use std::hash::Hash;

use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    partitions: Vec<Vec<T>>,
}

impl<T> Default for Dataset<T> {
    fn default() -> Self {
        Self {
            partitions: Vec::new(),
        }
    }
}

impl<T> Dataset<T> {
    #[must_use]
    pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
        Self { partitions }
    }

    /// A dataset holding all rows in a single partition.
    #[must_use]
    pub fn from_rows(rows: Vec<T>) -> Self {
        Self {
            partitions: vec![rows],
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(Vec::is_empty)
    }

    pub fn partitions(&self) -> &[Vec<T>] {
        &self.partitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.partitions.iter().flatten()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.partitions.into_iter().flatten().collect()
    }
}

impl<T: Send> Dataset<T> {
    /// Keep the rows matching `predicate`.
    #[must_use]
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|partition| partition.into_iter().filter(|row| predicate(row)).collect())
            .collect();
        Self { partitions }
    }

    /// Transform each partition, passing its index.
    ///
    /// # Errors
    /// Returns the first error produced by `f`.
    pub fn try_map_partitions_with_index<U, E, F>(self, f: F) -> Result<Dataset<U>, E>
    where
        U: Send,
        E: Send,
        F: Fn(usize, Vec<T>) -> Result<Vec<U>, E> + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .enumerate()
            .map(|(index, partition)| f(index, partition))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Dataset { partitions })
    }
}

impl<T: Sync> Dataset<T> {
    /// Project every row.
    pub fn map<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| partition.iter().map(&f).collect())
            .collect();
        Dataset { partitions }
    }

    /// Expand every row into zero or more rows.
    ///
    /// # Errors
    /// Returns the first error produced by `f`.
    pub fn try_flat_map<U, E, F>(&self, f: F) -> Result<Dataset<U>, E>
    where
        U: Send,
        E: Send,
        F: Fn(&T) -> Result<Vec<U>, E> + Sync + Send,
    {
        let partitions = self
            .partitions
            .par_iter()
            .map(|partition| {
                let mut rows = Vec::new();
                for row in partition {
                    rows.extend(f(row)?);
                }
                Ok(rows)
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Dataset { partitions })
    }
}

impl<T: Hash + Eq + Clone> Dataset<T> {
    /// Drop exact duplicate rows across the whole dataset.
    ///
    /// The first occurrence, in partition order, is kept in its partition.
    #[must_use]
    pub fn distinct(self) -> Self {
        let mut seen = HashSet::with_capacity(self.len());
        let partitions = self
            .partitions
            .into_iter()
            .map(|partition| {
                partition
                    .into_iter()
                    .filter(|row| seen.insert(row.clone()))
                    .collect()
            })
            .collect();
        Self { partitions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset<i64> {
        Dataset::from_partitions(vec![vec![1, 2, 2, 3], vec![3, 4], vec![], vec![4, 5]])
    }

    #[test]
    fn test_len_and_partitions() {
        let data = sample();
        assert_eq!(data.len(), 8);
        assert_eq!(data.num_partitions(), 4);
        assert!(!data.is_empty());
        assert!(Dataset::<i64>::default().is_empty());
        assert!(Dataset::<i64>::from_partitions(vec![vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_filter_keeps_partitioning() {
        let even = sample().filter(|v| v % 2 == 0);
        assert_eq!(
            even.partitions(),
            &[vec![2, 2], vec![4], vec![], vec![4]]
        );
    }

    #[test]
    fn test_distinct_is_global_and_keeps_first_occurrence() {
        let distinct = sample().distinct();
        assert_eq!(
            distinct.partitions(),
            &[vec![1, 2, 3], vec![4], vec![], vec![5]]
        );
    }

    #[test]
    fn test_distinct_is_idempotent() {
        let once = sample().distinct();
        let twice = once.clone().distinct();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_map_partitions_with_index_sees_each_index() {
        let tagged = sample()
            .try_map_partitions_with_index(|index, partition| {
                Ok::<_, ()>(partition.into_iter().map(|v| (index, v)).collect())
            })
            .unwrap();
        assert_eq!(tagged.partitions()[3], vec![(3, 4), (3, 5)]);
    }

    #[test]
    fn test_try_flat_map_propagates_errors() {
        let result = sample().try_flat_map(|v| if *v == 5 { Err("five") } else { Ok(vec![*v]) });
        assert_eq!(result, Err("five"));

        let doubled = sample().try_flat_map(|v| Ok::<_, ()>(vec![*v, *v])).unwrap();
        assert_eq!(doubled.len(), 16);
    }

    #[test]
    fn test_into_rows_flattens_in_order() {
        let rows = sample().map(|v| v * 10).into_rows();
        assert_eq!(rows, vec![10, 20, 20, 30, 30, 40, 40, 50]);
    }
}
