use std::collections::{BTreeMap, BTreeSet};

use parcel_core::PackageRecord;

/// Dependencies-first order of `selected`. Edges leaving the selection are
/// ignored. On a cycle, returns the names that could not be ordered.
pub(crate) fn topo_order(
    selected: &BTreeMap<String, PackageRecord>,
) -> Result<Vec<String>, Vec<String>> {
    let mut reverse: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

    for (name, record) in selected {
        let inside = record
            .dependencies
            .keys()
            .filter(|dep| selected.contains_key(*dep))
            .collect::<Vec<_>>();
        in_degree.insert(name.as_str(), inside.len());
        for dep in inside {
            reverse.entry(dep.as_str()).or_default().insert(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter_map(|(name, degree)| (*degree == 0).then_some(*name))
        .collect();
    let mut ordered = Vec::with_capacity(selected.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(next.to_string());
        for child in reverse.get(next).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(child) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(*child);
                }
            }
        }
    }

    if ordered.len() != selected.len() {
        let cycle = selected
            .keys()
            .filter(|name| !ordered.contains(*name))
            .cloned()
            .collect();
        return Err(cycle);
    }
    Ok(ordered)
}
