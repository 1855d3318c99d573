// tally: Counts format conversion for population genetic data.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Assignment of individuals from variant sources to population slots.
//!
//! Individuals are grouped by their name up to the last occurrence of
//! a split character, so `homo_sapiens-XXX` and `homo_sapiens-YYY`
//! both count towards the population `homo_sapiens`. A whole source
//! can instead be merged into one population independent of the
//! individual names. Slot order is first-seen order and fixed for the
//! lifetime of the output file.

use indexmap::IndexMap;

use rand::Rng;

use crate::errors::CfError;

/// Marks an individual as excluded from the output.
pub const EXCLUDED: i32 = -1;

/// Resolved mapping from per-source individuals to population slots.
///
/// ## Usage
///
/// ```rust
/// use tally::assign::PopulationMap;
///
/// let individuals = vec![
///     vec!["sheep-1".to_string(), "sheep-2".to_string(), "wolf-1".to_string()],
///     vec!["sheep-3".to_string()],
/// ];
/// let pops = PopulationMap::resolve(&individuals, None, None, '-').unwrap();
///
/// assert_eq!(pops.names(), &["sheep".to_string(), "wolf".to_string()]);
/// assert_eq!(pops.assignment(0), &[0, 0, 1]);
/// assert_eq!(pops.assignment(1), &[0]);
/// ```
#[derive(Clone, Debug)]
pub struct PopulationMap {
    names: Vec<String>,
    assignments: Vec<Vec<i32>>,
    individuals: Vec<Vec<String>>,
}

fn strip_name(name: &str, split_char: char) -> String {
    match name.rsplit_once(split_char) {
        Some((head, _)) => head.to_string(),
        None => name.to_string(),
    }
}

impl PopulationMap {
    /// Build the assignment matrix for the given per-source individual
    /// name lists.
    ///
    /// If `merge[i]` is true, every individual of source `i` is mapped
    /// to a single fresh slot named after the first individual's
    /// stripped name. Otherwise individuals with equal stripped names
    /// share a slot, within and across sources.
    ///
    /// `names` overrides the derived population names and must match
    /// the resolved population count.
    pub fn resolve(
        individuals: &[Vec<String>],
        merge: Option<&[bool]>,
        names: Option<&[String]>,
        split_char: char,
    ) -> Result<Self, CfError> {
        if let Some(flags) = merge {
            if flags.len() != individuals.len() {
                return Err(CfError::InvalidMergeList {
                    got: flags.len(),
                    expected: individuals.len(),
                });
            }
        }

        let mut slots: IndexMap<String, usize> = IndexMap::new();
        let mut pop_names: Vec<String> = Vec::new();
        let mut assignments: Vec<Vec<i32>> = Vec::with_capacity(individuals.len());

        for (i, source) in individuals.iter().enumerate() {
            let merged = merge.map(|flags| flags[i]).unwrap_or(false);
            if merged {
                // One fresh slot for the whole source, never shared
                // with name-derived slots.
                match source.first() {
                    Some(first) => {
                        let slot = pop_names.len() as i32;
                        pop_names.push(strip_name(first, split_char));
                        assignments.push(vec![slot; source.len()]);
                    }
                    None => assignments.push(Vec::new()),
                }
            } else {
                let mut row = Vec::with_capacity(source.len());
                for name in source {
                    let stripped = strip_name(name, split_char);
                    let slot = *slots.entry(stripped.clone()).or_insert_with(|| {
                        pop_names.push(stripped);
                        pop_names.len() - 1
                    });
                    row.push(slot as i32);
                }
                assignments.push(row);
            }
        }

        if let Some(overrides) = names {
            if overrides.len() != pop_names.len() {
                return Err(CfError::InvalidNameList {
                    got: overrides.len(),
                    expected: pop_names.len(),
                });
            }
            pop_names = overrides.to_vec();
        }

        Ok(PopulationMap {
            names: pop_names,
            assignments,
            individuals: individuals.to_vec(),
        })
    }

    /// Resolved population names in slot order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_populations(&self) -> usize {
        self.names.len()
    }

    pub fn n_sources(&self) -> usize {
        self.assignments.len()
    }

    /// Assignment row of source `i`: one slot index or [EXCLUDED] per
    /// individual.
    pub fn assignment(&self, source: usize) -> &[i32] {
        &self.assignments[source]
    }

    /// Reduce every population to one randomly picked individual.
    ///
    /// All other individuals are marked [EXCLUDED]. Returns the names
    /// of the picked individuals in slot order. Tie-breaking uses the
    /// caller-supplied generator and is not deterministic unless the
    /// generator is seeded.
    pub fn keep_one_individual(&mut self, rng: &mut impl Rng) -> Vec<String> {
        let mut picked: Vec<String> = Vec::with_capacity(self.names.len());
        for pop in 0..self.names.len() {
            let members: Vec<(usize, usize)> = self
                .assignments
                .iter()
                .enumerate()
                .flat_map(|(i, row)| {
                    row.iter()
                        .enumerate()
                        .filter(|(_, slot)| **slot == pop as i32)
                        .map(move |(j, _)| (i, j))
                })
                .collect();
            if members.is_empty() {
                continue;
            }
            let keep = rng.random_range(0..members.len());
            for (n, (i, j)) in members.iter().enumerate() {
                if n != keep {
                    self.assignments[*i][*j] = EXCLUDED;
                }
            }
            let (i, j) = members[keep];
            picked.push(self.individuals[i][j].clone());
        }
        picked
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn resolve_groups_across_sources() {
        use super::PopulationMap;

        let individuals = vec![
            vec!["sheep-1".to_string(), "wolf-1".to_string()],
            vec!["wolf-2".to_string(), "fox-1".to_string()],
        ];
        let pops = PopulationMap::resolve(&individuals, None, None, '-').unwrap();

        assert_eq!(
            pops.names(),
            &["sheep".to_string(), "wolf".to_string(), "fox".to_string()]
        );
        assert_eq!(pops.assignment(0), &[0, 1]);
        assert_eq!(pops.assignment(1), &[1, 2]);
    }

    #[test]
    fn resolve_strips_at_last_split_char() {
        use super::PopulationMap;

        let individuals = vec![vec![
            "homo-sapiens-1".to_string(),
            "homo-sapiens-2".to_string(),
        ]];
        let pops = PopulationMap::resolve(&individuals, None, None, '-').unwrap();

        assert_eq!(pops.names(), &["homo-sapiens".to_string()]);
        assert_eq!(pops.assignment(0), &[0, 0]);
    }

    #[test]
    fn resolve_merged_source_gets_own_slot() {
        use super::PopulationMap;

        let individuals = vec![
            vec!["sheep-1".to_string()],
            vec!["sheep-2".to_string(), "wolf-1".to_string()],
        ];
        let merge = vec![false, true];
        let pops = PopulationMap::resolve(&individuals, Some(&merge), None, '-').unwrap();

        // Merged source keeps its own slot even though the derived
        // name collides with the first population.
        assert_eq!(pops.names(), &["sheep".to_string(), "sheep".to_string()]);
        assert_eq!(pops.assignment(0), &[0]);
        assert_eq!(pops.assignment(1), &[1, 1]);
    }

    #[test]
    fn resolve_rejects_bad_merge_list() {
        use crate::errors::CfError;
        use super::PopulationMap;

        let individuals = vec![vec!["a-1".to_string()]];
        let got = PopulationMap::resolve(&individuals, Some(&[true, false]), None, '-');

        assert!(matches!(got, Err(CfError::InvalidMergeList { got: 2, expected: 1 })));
    }

    #[test]
    fn resolve_rejects_bad_name_list() {
        use crate::errors::CfError;
        use super::PopulationMap;

        let individuals = vec![vec!["a-1".to_string(), "b-1".to_string()]];
        let names = vec!["only_one".to_string()];
        let got = PopulationMap::resolve(&individuals, None, Some(&names), '-');

        assert!(matches!(got, Err(CfError::InvalidNameList { got: 1, expected: 2 })));
    }

    #[test]
    fn resolve_is_idempotent() {
        use super::PopulationMap;

        let individuals = vec![
            vec!["sheep-1".to_string(), "wolf-1".to_string()],
            vec!["wolf-2".to_string()],
        ];
        let first = PopulationMap::resolve(&individuals, None, None, '-').unwrap();
        let second = PopulationMap::resolve(&individuals, None, None, '-').unwrap();

        assert_eq!(first.names(), second.names());
        for i in 0..first.n_sources() {
            assert_eq!(first.assignment(i), second.assignment(i));
        }
    }

    #[test]
    fn keep_one_individual_leaves_one_per_population() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use super::EXCLUDED;
        use super::PopulationMap;

        let individuals = vec![vec![
            "sheep-1".to_string(),
            "sheep-2".to_string(),
            "sheep-3".to_string(),
            "wolf-1".to_string(),
        ]];
        let mut pops = PopulationMap::resolve(&individuals, None, None, '-').unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let picked = pops.keep_one_individual(&mut rng);

        assert_eq!(picked.len(), 2);
        let kept_sheep = pops.assignment(0)[0..3]
            .iter()
            .filter(|slot| **slot == 0)
            .count();
        assert_eq!(kept_sheep, 1);
        assert_eq!(pops.assignment(0)[3], 1);
        assert!(pops.assignment(0)[0..3].iter().filter(|s| **s == EXCLUDED).count() == 2);
    }
}
