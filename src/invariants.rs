use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::NestedSetError;
use crate::node::Model;

/// A structural defect found in a fetched tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TreeInvariantViolation {
    InvertedBounds {
        node_id: i32,
    },
    EvenWidth {
        node_id: i32,
    },
    PartialOverlap {
        node_id: i32,
        other_node_id: i32,
    },
    BoundaryGap {
        root_id: i32,
        expected: i32,
        found: i32,
    },
    InvalidRoot {
        root_id: i32,
        node_id: i32,
    },
    WrongParent {
        node_id: i32,
        parent_id: i32,
        enclosing_node_id: i32,
    },
    WrongLevel {
        node_id: i32,
        level: i32,
        expected: i32,
    },
}

impl TreeInvariantViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            TreeInvariantViolation::InvertedBounds { .. } => "tree_inverted_bounds",
            TreeInvariantViolation::EvenWidth { .. } => "tree_even_width",
            TreeInvariantViolation::PartialOverlap { .. } => "tree_partial_overlap",
            TreeInvariantViolation::BoundaryGap { .. } => "tree_boundary_gap",
            TreeInvariantViolation::InvalidRoot { .. } => "tree_invalid_root",
            TreeInvariantViolation::WrongParent { .. } => "tree_wrong_parent",
            TreeInvariantViolation::WrongLevel { .. } => "tree_wrong_level",
        }
    }
}

/// Check every tree contained in `nodes` (grouped by `root_id`).
pub fn tree_invariant_violations(nodes: &[Model]) -> Vec<TreeInvariantViolation> {
    let mut trees: BTreeMap<i32, Vec<&Model>> = BTreeMap::new();
    for node in nodes {
        trees.entry(node.root_id).or_default().push(node);
    }

    let mut violations = Vec::new();
    for (root_id, mut members) in trees {
        members.sort_by_key(|node| node.left_bound);
        check_bounds(&members, &mut violations);
        check_contiguous(root_id, &members, &mut violations);
        check_nesting(root_id, &members, &mut violations);
    }
    violations
}

pub fn ensure_tree_invariants(nodes: &[Model]) -> Result<(), NestedSetError> {
    let violations = tree_invariant_violations(nodes);
    if let Some(first) = violations.first() {
        return Err(NestedSetError::invariant(format!(
            "{}: {:?}",
            first.error_code(),
            violations
        )));
    }
    Ok(())
}

fn check_bounds(members: &[&Model], violations: &mut Vec<TreeInvariantViolation>) {
    for node in members {
        if node.left_bound >= node.right_bound {
            violations.push(TreeInvariantViolation::InvertedBounds {
                node_id: node.node_id,
            });
        } else if (node.right_bound - node.left_bound) % 2 == 0 {
            violations.push(TreeInvariantViolation::EvenWidth {
                node_id: node.node_id,
            });
        }
    }
}

/// Boundaries of one tree must be exactly `1..=2n`.
fn check_contiguous(root_id: i32, members: &[&Model], violations: &mut Vec<TreeInvariantViolation>) {
    let mut boundaries = members
        .iter()
        .flat_map(|node| [node.left_bound, node.right_bound])
        .collect::<Vec<_>>();
    boundaries.sort_unstable();

    for (expected, found) in (1..).zip(boundaries) {
        if expected != found {
            violations.push(TreeInvariantViolation::BoundaryGap {
                root_id,
                expected,
                found,
            });
            return;
        }
    }
}

fn check_nesting(root_id: i32, members: &[&Model], violations: &mut Vec<TreeInvariantViolation>) {
    let mut stack: Vec<&Model> = Vec::new();

    for &node in members {
        while stack
            .last()
            .is_some_and(|open| open.right_bound < node.left_bound)
        {
            stack.pop();
        }

        match stack.last() {
            Some(enclosing) => {
                if node.right_bound > enclosing.right_bound {
                    violations.push(TreeInvariantViolation::PartialOverlap {
                        node_id: node.node_id,
                        other_node_id: enclosing.node_id,
                    });
                }
                if node.parent_id != enclosing.node_id {
                    violations.push(TreeInvariantViolation::WrongParent {
                        node_id: node.node_id,
                        parent_id: node.parent_id,
                        enclosing_node_id: enclosing.node_id,
                    });
                }
                let expected = enclosing.level + 1;
                if node.level != expected {
                    violations.push(TreeInvariantViolation::WrongLevel {
                        node_id: node.node_id,
                        level: node.level,
                        expected,
                    });
                }
            }
            None => {
                if node.node_id != root_id || node.parent_id != 0 || node.left_bound != 1 {
                    violations.push(TreeInvariantViolation::InvalidRoot {
                        root_id,
                        node_id: node.node_id,
                    });
                }
                if node.level != 1 {
                    violations.push(TreeInvariantViolation::WrongLevel {
                        node_id: node.node_id,
                        level: node.level,
                        expected: 1,
                    });
                }
            }
        }

        stack.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(node_id: i32, parent_id: i32, left: i32, right: i32, level: i32) -> Model {
        Model {
            node_id,
            root_id: 1,
            parent_id,
            left_bound: left,
            right_bound: right,
            level,
            order_hint: 0,
            owner_id: 1,
            company_id: None,
            name: format!("n{node_id}"),
        }
    }

    fn valid_tree() -> Vec<Model> {
        vec![
            node(1, 0, 1, 8, 1),
            node(2, 1, 2, 5, 2),
            node(3, 2, 3, 4, 3),
            node(4, 1, 6, 7, 2),
        ]
    }

    #[test]
    fn accepts_valid_tree() {
        assert!(tree_invariant_violations(&valid_tree()).is_empty());
        assert!(ensure_tree_invariants(&valid_tree()).is_ok());
    }

    #[test]
    fn accepts_several_trees() {
        let mut nodes = valid_tree();
        nodes.push(Model {
            root_id: 9,
            ..node(9, 0, 1, 2, 1)
        });
        assert!(tree_invariant_violations(&nodes).is_empty());
    }

    #[test]
    fn reports_partial_overlap() {
        let nodes = vec![
            node(1, 0, 1, 8, 1),
            node(2, 1, 2, 5, 2),
            node(3, 2, 4, 7, 3),
            node(4, 1, 3, 6, 2),
        ];
        let violations = tree_invariant_violations(&nodes);
        assert!(violations
            .iter()
            .any(|v| matches!(v, TreeInvariantViolation::PartialOverlap { .. })));
    }

    #[test]
    fn reports_gaps_and_even_widths() {
        let nodes = vec![node(1, 0, 1, 6, 1), node(2, 1, 2, 4, 2)];
        let violations = tree_invariant_violations(&nodes);
        assert!(violations
            .iter()
            .any(|v| matches!(v, TreeInvariantViolation::EvenWidth { node_id: 2 })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, TreeInvariantViolation::BoundaryGap { expected: 3, found: 4, .. })));
    }

    #[test]
    fn reports_wrong_level_and_parent() {
        let mut nodes = valid_tree();
        nodes[2].level = 2;
        nodes[3].parent_id = 2;
        let violations = tree_invariant_violations(&nodes);
        assert!(violations.contains(&TreeInvariantViolation::WrongLevel {
            node_id: 3,
            level: 2,
            expected: 3
        }));
        assert!(violations.contains(&TreeInvariantViolation::WrongParent {
            node_id: 4,
            parent_id: 2,
            enclosing_node_id: 1
        }));
    }

    #[test]
    fn reports_invalid_root() {
        let nodes = vec![node(1, 5, 1, 2, 1)];
        let err = ensure_tree_invariants(&nodes).unwrap_err();
        assert!(err.to_string().contains("tree_invalid_root"));
    }
}
