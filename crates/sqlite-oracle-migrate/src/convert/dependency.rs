//! Foreign-key dependency ordering.

use std::collections::{HashMap, HashSet};

use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Order table names so every referenced table precedes its referrers.
///
/// Depth-first post-order over `deps` (table -> referenced tables). Roots are
/// visited in the order of `names` and edges in declaration order, so ties
/// keep their first-appearance order. Edges that close a cycle are skipped
/// rather than rejected, and references to names outside `names` are
/// ignored. Every name appears exactly once in the result.
pub fn sort_tables(names: &[String], deps: &HashMap<String, Vec<String>>) -> Vec<String> {
    let known: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(names.len());
    let mut order = Vec::with_capacity(names.len());

    for root in names {
        if marks.contains_key(root.as_str()) {
            continue;
        }
        marks.insert(root.as_str(), Mark::InProgress);
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];

        while let Some(&(node, next)) = stack.last() {
            let edges = deps.get(node).map(Vec::as_slice).unwrap_or_default();

            if next >= edges.len() {
                marks.insert(node, Mark::Done);
                order.push(node.to_string());
                stack.pop();
                continue;
            }

            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            let dep = edges[next].as_str();

            if !known.contains(dep) {
                debug!("{} references unknown table {}, ignoring", node, dep);
                continue;
            }
            match marks.get(dep) {
                Some(Mark::Done) => {}
                Some(Mark::InProgress) => {
                    if dep != node {
                        debug!("Dependency cycle through {} -> {}, edge skipped", node, dep);
                    }
                }
                None => {
                    marks.insert(dep, Mark::InProgress);
                    stack.push((dep, 0));
                }
            }
        }
    }

    order
}

/// Creation order for a set of named tables.
///
/// `tables` pairs each canonical name with the tables it references, in
/// dump order. Returns indices into `tables`, parents first.
pub fn creation_order<S>(tables: &[(String, S)]) -> Vec<usize>
where
    S: AsRef<[String]>,
{
    let names: Vec<String> = tables.iter().map(|(name, _)| name.clone()).collect();
    let mut deps: HashMap<String, Vec<String>> = HashMap::new();
    for (name, refs) in tables {
        deps.entry(name.clone())
            .or_default()
            .extend(refs.as_ref().iter().cloned());
    }

    let mut position: HashMap<&str, usize> = HashMap::new();
    for (i, name) in names.iter().enumerate() {
        position.entry(name.as_str()).or_insert(i);
    }

    let mut order: Vec<usize> = sort_tables(&names, &deps)
        .iter()
        .filter_map(|name| position.get(name.as_str()).copied())
        .collect();

    // Duplicate definitions of the same name keep their dump position after
    // the first.
    let placed: HashSet<usize> = order.iter().copied().collect();
    order.extend((0..tables.len()).filter(|i| !placed.contains(i)));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn deps(edges: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(from, to)| (from.to_string(), names(to)))
            .collect()
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_chain_orders_parents_first() {
        let order = sort_tables(
            &names(&["c", "b", "a"]),
            &deps(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]),
        );
        assert_eq!(order, names(&["a", "b", "c"]));
    }

    #[test]
    fn test_cycle_is_tolerated() {
        let order = sort_tables(&names(&["x", "y"]), &deps(&[("x", &["y"]), ("y", &["x"])]));
        assert_eq!(order.len(), 2);
        assert!(order.contains(&"x".to_string()));
        assert!(order.contains(&"y".to_string()));
    }

    #[test]
    fn test_self_reference_and_dangling() {
        let order = sort_tables(
            &names(&["emp", "dept"]),
            &deps(&[("emp", &["emp", "dept", "ghost"])]),
        );
        assert_eq!(order, names(&["dept", "emp"]));
    }

    #[test]
    fn test_ties_keep_first_appearance() {
        let order = sort_tables(&names(&["z", "m", "a"]), &HashMap::new());
        assert_eq!(order, names(&["z", "m", "a"]));
    }

    #[test]
    fn test_every_edge_respected_in_dag() {
        let list = names(&["orders", "items", "users", "products", "reviews"]);
        let graph = deps(&[
            ("orders", &["users"]),
            ("items", &["orders", "products"]),
            ("reviews", &["users", "products"]),
        ]);
        let order = sort_tables(&list, &graph);
        assert_eq!(order.len(), list.len());
        for (from, to) in &graph {
            for dep in to {
                assert!(position(&order, dep) < position(&order, from));
            }
        }
    }

    #[test]
    fn test_creation_order_indices() {
        let tables = vec![
            ("child".to_string(), vec!["parent".to_string()]),
            ("parent".to_string(), vec![]),
            ("child".to_string(), vec![]),
        ];
        assert_eq!(creation_order(&tables), vec![1, 0, 2]);
    }
}
