//! Dependency ordering over configured units.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use benv_core::{Error, Result};

use crate::unit::{CabalPlan, ConfiguredUnit};

/// Order the plan's configured units so that every unit appears after all
/// of its dependencies.
///
/// Edges run only between configured units; dependencies on pre-existing
/// units are already satisfied and are dropped. A dependency on a unit the
/// plan does not contain at all is an error. Ties are broken by the order
/// units first appeared in the input plan.
pub fn sort_plan(plan: &CabalPlan) -> Result<Vec<ConfiguredUnit>> {
    let units: Vec<&ConfiguredUnit> = plan.configured().collect();

    // Position of each configured unit, plus membership for every plan unit.
    let mut configured_idx: HashMap<&str, usize> = HashMap::with_capacity(units.len());
    for (idx, unit) in units.iter().enumerate() {
        configured_idx.insert(unit.id.as_str(), idx);
    }

    let mut indegree = vec![0usize; units.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];

    for (idx, unit) in units.iter().enumerate() {
        for dep in unit.all_depends() {
            match configured_idx.get(dep.as_str()) {
                Some(&dep_idx) => {
                    indegree[idx] += 1;
                    dependents[dep_idx].push(idx);
                }
                None => {
                    if plan.lookup(dep).is_none() {
                        return Err(Error::DanglingDep {
                            unit: unit.id.to_string(),
                            dep: dep.to_string(),
                        });
                    }
                    // Pre-existing: already installed, no edge.
                }
            }
        }
    }

    // Kahn's algorithm with a min-heap over input position keeps the
    // ordering stable.
    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut sorted = Vec::with_capacity(units.len());
    while let Some(Reverse(idx)) = ready.pop() {
        sorted.push(units[idx].clone());
        for &dependent in &dependents[idx] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if sorted.len() < units.len() {
        let stuck: Vec<String> = units
            .iter()
            .enumerate()
            .filter(|(idx, _)| indegree[*idx] > 0)
            .map(|(_, u)| u.id.to_string())
            .collect();
        return Err(Error::PlanCyclic { units: stuck });
    }

    Ok(sorted)
}
