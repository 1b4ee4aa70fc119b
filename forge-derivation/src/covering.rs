#![forbid(unsafe_code)]

//! Constrained t-way covering array generation.
//!
//! Parameters are plain indices with a domain size each; values are indices
//! into those domains. The generator follows the in-parameter-order scheme
//! (IPOG): the first `t` parameters are enumerated exhaustively, then every
//! further parameter is added by horizontal growth (extending existing rows)
//! followed by vertical growth (adding rows for still uncovered tuples).
//!
//! Constraints make some tuples infeasible. Every row is kept completable at
//! all times: a partial row is only accepted if some assignment of its free
//! cells satisfies every constraint. Tuples that no valid row can contain are
//! skipped, so every emitted row is valid and every feasible t-tuple is
//! covered.

use std::collections::{BTreeSet, HashSet};

type Row = Vec<Option<usize>>;
type Tuple = Vec<(usize, usize)>;

/// Constraint over parameter indices.
pub struct IndexedConstraint<'a> {
    params: Vec<usize>,
    allows: Box<dyn Fn(&[usize]) -> bool + 'a>,
}

impl<'a> IndexedConstraint<'a> {
    /// `allows` receives the values of `params`, in that order.
    pub fn new<F>(params: Vec<usize>, allows: F) -> Self
    where
        F: Fn(&[usize]) -> bool + 'a,
    {
        Self { params, allows: Box::new(allows) }
    }

    /// `None` while one of the referenced cells is unassigned.
    fn check(&self, row: &[Option<usize>]) -> Option<bool> {
        let mut values = Vec::with_capacity(self.params.len());
        for &p in &self.params {
            values.push(row[p]?);
        }
        Some((self.allows)(&values))
    }
}

pub struct CoveringArrayGenerator<'a> {
    sizes: Vec<usize>,
    strength: usize,
    constraints: Vec<IndexedConstraint<'a>>,
    constrained: Vec<bool>,
}

impl<'a> CoveringArrayGenerator<'a> {
    pub fn new(sizes: Vec<usize>, strength: usize) -> Self {
        let constrained = vec![false; sizes.len()];
        Self { sizes, strength, constraints: Vec::new(), constrained }
    }

    pub fn with_constraint(mut self, constraint: IndexedConstraint<'a>) -> Self {
        for &p in &constraint.params {
            self.constrained[p] = true;
        }
        self.constraints.push(constraint);
        self
    }

    /// Rows of value indices, one entry per parameter.
    pub fn generate(&self) -> Vec<Vec<usize>> {
        let k = self.sizes.len();
        if k == 0 || self.sizes.iter().any(|&s| s == 0) {
            return Vec::new();
        }
        let t = self.strength.clamp(1, k);

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|a, b| self.sizes[*b].cmp(&self.sizes[*a]));

        let mut rows: Vec<Row> = Vec::new();
        let head: Vec<usize> = order[..t].to_vec();
        for values in cartesian(&head.iter().map(|&p| self.sizes[p]).collect::<Vec<_>>()) {
            let mut row = vec![None; k];
            for (&p, v) in head.iter().zip(values) {
                row[p] = Some(v);
            }
            if self.completable(&row, &order) {
                rows.push(row);
            }
        }

        for i in t..k {
            let param = order[i];
            let mut uncovered = self.feasible_tuples(&order[..i], param, t, &order);

            for row in rows.iter_mut() {
                let mut best: Option<(usize, usize)> = None;
                for value in 0..self.sizes[param] {
                    let mut candidate = row.clone();
                    candidate[param] = Some(value);
                    if !self.completable(&candidate, &order) {
                        continue;
                    }
                    let gain = uncovered.iter().filter(|tuple| covers(&candidate, tuple)).count();
                    if best.map_or(true, |(_, g)| gain > g) {
                        best = Some((value, gain));
                    }
                }
                if let Some((value, _)) = best {
                    row[param] = Some(value);
                    uncovered.retain(|tuple| !covers(row, tuple));
                }
            }

            for tuple in uncovered {
                if rows.iter().any(|row| covers(row, &tuple)) {
                    continue;
                }
                let slot = rows.iter().position(|row| {
                    fits(row, &tuple) && self.completable(&with_tuple(row, &tuple), &order)
                });
                match slot {
                    Some(index) => rows[index] = with_tuple(&rows[index], &tuple),
                    None => rows.push(with_tuple(&vec![None; k], &tuple)),
                }
            }
        }

        let mut seen = HashSet::new();
        rows.iter()
            .filter_map(|row| self.complete(row, &order))
            .filter(|row| seen.insert(row.clone()))
            .collect()
    }

    /// Whether a fully assigned row satisfies every constraint.
    pub fn accepts(&self, row: &[usize]) -> bool {
        let cells: Row = row.iter().copied().map(Some).collect();
        self.valid(&cells)
    }

    fn valid(&self, row: &[Option<usize>]) -> bool {
        self.constraints.iter().all(|c| c.check(row).unwrap_or(true))
    }

    fn completable(&self, row: &[Option<usize>], order: &[usize]) -> bool {
        self.complete(row, order).is_some()
    }

    /// Fill every free cell so that all constraints hold. Unconstrained cells
    /// take value 0; only constrained cells are searched.
    fn complete(&self, row: &[Option<usize>], order: &[usize]) -> Option<Vec<usize>> {
        if !self.valid(row) {
            return None;
        }
        let mut work = row.to_vec();
        let free: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&p| work[p].is_none() && self.constrained[p])
            .collect();
        if !self.search(&mut work, &free, 0) {
            return None;
        }
        Some(work.into_iter().map(|cell| cell.unwrap_or(0)).collect())
    }

    fn search(&self, work: &mut Row, free: &[usize], depth: usize) -> bool {
        let Some(&param) = free.get(depth) else { return true };
        for value in 0..self.sizes[param] {
            work[param] = Some(value);
            if self.valid(work) && self.search(work, free, depth + 1) {
                return true;
            }
        }
        work[param] = None;
        false
    }

    /// Every feasible t-tuple pairing `param` with `t - 1` already processed parameters.
    fn feasible_tuples(&self, processed: &[usize], param: usize, t: usize, order: &[usize]) -> BTreeSet<Tuple> {
        let k = self.sizes.len();
        let mut tuples = BTreeSet::new();
        for subset in combinations(processed, t - 1) {
            let mut params = subset.clone();
            params.push(param);
            let sizes: Vec<usize> = params.iter().map(|&p| self.sizes[p]).collect();
            for values in cartesian(&sizes) {
                let mut tuple: Tuple = params.iter().copied().zip(values).collect();
                tuple.sort_unstable();
                if self.completable(&with_tuple(&vec![None; k], &tuple), order) {
                    tuples.insert(tuple);
                }
            }
        }
        tuples
    }
}

fn covers(row: &[Option<usize>], tuple: &Tuple) -> bool {
    tuple.iter().all(|&(p, v)| row[p] == Some(v))
}

fn fits(row: &[Option<usize>], tuple: &Tuple) -> bool {
    tuple.iter().all(|&(p, v)| row[p].map_or(true, |cell| cell == v))
}

fn with_tuple(row: &[Option<usize>], tuple: &Tuple) -> Row {
    let mut out = row.to_vec();
    for &(p, v) in tuple {
        out[p] = Some(v);
    }
    out
}

/// All value vectors of the given domain sizes, last position varying fastest.
fn cartesian(sizes: &[usize]) -> Vec<Vec<usize>> {
    sizes.iter().fold(vec![Vec::new()], |acc, &size| {
        acc.into_iter()
            .flat_map(|prefix| {
                (0..size).map(move |v| {
                    let mut next = prefix.clone();
                    next.push(v);
                    next
                })
            })
            .collect()
    })
}

fn combinations(items: &[usize], r: usize) -> Vec<Vec<usize>> {
    if r == 0 {
        return vec![Vec::new()];
    }
    if items.len() < r {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (i, &first) in items.iter().enumerate() {
        for mut rest in combinations(&items[i + 1..], r - 1) {
            rest.insert(0, first);
            out.push(rest);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn all_pairs_covered(sizes: &[usize], rows: &[Vec<usize>], allowed: impl Fn(usize, usize, usize, usize) -> bool) -> bool {
        for a in 0..sizes.len() {
            for b in (a + 1)..sizes.len() {
                for va in 0..sizes[a] {
                    for vb in 0..sizes[b] {
                        if !allowed(a, va, b, vb) {
                            continue;
                        }
                        if !rows.iter().any(|r| r[a] == va && r[b] == vb) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    #[test]
    fn pairwise_is_smaller_than_exhaustive() {
        let sizes = vec![3, 3, 3, 3];
        let rows = CoveringArrayGenerator::new(sizes.clone(), 2).generate();
        assert!(rows.len() < 81);
        assert!(rows.len() >= 9);
        assert!(all_pairs_covered(&sizes, &rows, |_, _, _, _| true));
    }

    #[test]
    fn strength_at_parameter_count_is_exhaustive() {
        let rows = CoveringArrayGenerator::new(vec![2, 3], 2).generate();
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn strength_one_covers_each_value() {
        let rows = CoveringArrayGenerator::new(vec![4, 2, 3], 1).generate();
        for (param, size) in [4, 2, 3].into_iter().enumerate() {
            for v in 0..size {
                assert!(rows.iter().any(|r| r[param] == v));
            }
        }
        assert!(rows.len() >= 4);
    }

    #[test]
    fn constraints_exclude_rows_and_infeasible_pairs() {
        // parameter 0 value 0 never pairs with parameter 1 value 1
        let generator = CoveringArrayGenerator::new(vec![2, 2, 2], 2)
            .with_constraint(IndexedConstraint::new(vec![0, 1], |v| !(v[0] == 0 && v[1] == 1)));
        let rows = generator.generate();
        assert!(rows.iter().all(|r| !(r[0] == 0 && r[1] == 1)));
        assert!(all_pairs_covered(&[2, 2, 2], &rows, |a, va, b, vb| !(a == 0 && b == 1 && va == 0 && vb == 1)));
    }

    #[test]
    fn implicit_conflicts_are_skipped() {
        // value 1 of parameter 0 needs parameter 2 == 1, which parameter 1 == 0 forbids
        let generator = CoveringArrayGenerator::new(vec![2, 2, 2], 2)
            .with_constraint(IndexedConstraint::new(vec![0, 2], |v| v[0] == 0 || v[1] == 1))
            .with_constraint(IndexedConstraint::new(vec![1, 2], |v| !(v[0] == 0 && v[1] == 1)));
        let rows = generator.generate();
        for r in &rows {
            assert!(r[0] == 0 || r[2] == 1);
            assert!(!(r[1] == 0 && r[2] == 1));
        }
        assert!(rows.iter().any(|r| r[0] == 1));
        assert!(!rows.iter().any(|r| r[0] == 1 && r[1] == 0));
    }

    #[test]
    fn unsatisfiable_model_yields_nothing() {
        let generator = CoveringArrayGenerator::new(vec![2, 2], 2)
            .with_constraint(IndexedConstraint::new(vec![0], |_| false));
        assert!(generator.generate().is_empty());
    }

    proptest! {
        #[test]
        fn pairwise_coverage_holds(sizes in proptest::collection::vec(1usize..5, 2..6)) {
            let rows = CoveringArrayGenerator::new(sizes.clone(), 2).generate();
            prop_assert!(all_pairs_covered(&sizes, &rows, |_, _, _, _| true));
            for row in &rows {
                for (p, &v) in row.iter().enumerate() {
                    prop_assert!(v < sizes[p]);
                }
            }
        }
    }
}
