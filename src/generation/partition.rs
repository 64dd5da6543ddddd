//! # Partition Tree
//!
//! Binary space partitioning of the map into leaf regions. Every leaf is the
//! source of at most one room, and because leaves tile the map without
//! overlap, rooms inset inside distinct leaves can never overlap.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`].

use super::{PartitionSettings, ValidationReport};
use crate::geometry::Region;
use crate::{config, FloorplanError, FloorplanResult};
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Index of a node in a [`PartitionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Orientation of the line a node was cut along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitAxis {
    /// Vertical cut; children are left and right
    Vertical,
    /// Horizontal cut; children are top and bottom
    Horizontal,
}

/// How the split axis of a node is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Vertical at even depths, horizontal at odd depths
    Alternate,
    /// Cut across the longer side, vertical on ties
    LongerAxis,
    /// Seeded coin flip
    Random,
}

impl SplitPolicy {
    fn choose(self, bounds: &Region, depth: u32, rng: &mut StdRng) -> SplitAxis {
        match self {
            SplitPolicy::Alternate => {
                if depth % 2 == 0 {
                    SplitAxis::Vertical
                } else {
                    SplitAxis::Horizontal
                }
            }
            SplitPolicy::LongerAxis => {
                if bounds.width >= bounds.height {
                    SplitAxis::Vertical
                } else {
                    SplitAxis::Horizontal
                }
            }
            SplitPolicy::Random => {
                if rng.gen_bool(0.5) {
                    SplitAxis::Vertical
                } else {
                    SplitAxis::Horizontal
                }
            }
        }
    }
}

/// One node of the partition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionNode {
    pub id: NodeId,
    pub bounds: Region,
    pub depth: u32,
    /// First child is left or top, second is right or bottom
    pub children: Option<(NodeId, NodeId)>,
    pub axis: Option<SplitAxis>,
    /// Debug annotation for visualization
    pub label: Option<String>,
}

impl PartitionNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Aggregate shape of a partition tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_depth: u32,
    pub vertical_splits: usize,
    pub horizontal_splits: usize,
}

/// Arena-backed binary partition of a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionTree {
    bounds: Region,
    nodes: Vec<PartitionNode>,
}

impl PartitionTree {
    /// Recursively splits `region` into a partition tree.
    ///
    /// A node becomes a leaf when it reaches `max_depth`, when either side
    /// is shorter than twice `min_partition_size`, or when a seeded
    /// `stop_probability` roll succeeds. Undersized leaves are kept as they
    /// are; splitting is never retried.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan::generation::utils::create_rng;
    /// use floorplan::{PartitionSettings, PartitionTree, Region};
    ///
    /// let region = Region::new(0, 0, 64, 48).unwrap();
    /// let mut rng = create_rng(42);
    /// let tree = PartitionTree::split(region, &PartitionSettings::default(), &mut rng);
    /// assert!(tree.validate().is_valid());
    /// assert!(!tree.enumerate_leaves().is_empty());
    /// ```
    pub fn split(region: Region, settings: &PartitionSettings, rng: &mut StdRng) -> Self {
        let mut tree = Self {
            bounds: region,
            nodes: Vec::new(),
        };
        tree.build(region, 0, settings, rng);
        debug!(
            "Partitioned {}x{} region into {} nodes",
            region.width,
            region.height,
            tree.nodes.len()
        );
        tree
    }

    fn build(
        &mut self,
        bounds: Region,
        depth: u32,
        settings: &PartitionSettings,
        rng: &mut StdRng,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(PartitionNode {
            id,
            bounds,
            depth,
            children: None,
            axis: None,
            label: None,
        });

        let min = settings.min_partition_size.max(1);
        let too_small = bounds.width < min * 2 || bounds.height < min * 2;
        if depth >= settings.max_depth || too_small || rng.gen_bool(settings.stop_probability) {
            return id;
        }

        let axis = settings.split_policy.choose(&bounds, depth, rng);
        let side = match axis {
            SplitAxis::Vertical => bounds.width,
            SplitAxis::Horizontal => bounds.height,
        };
        let first_len = split_length(side, min, settings.split_variation, rng);

        let (first, second) = match axis {
            SplitAxis::Vertical => (
                Region {
                    width: first_len,
                    ..bounds
                },
                Region {
                    x: bounds.x + first_len as i32,
                    width: side - first_len,
                    ..bounds
                },
            ),
            SplitAxis::Horizontal => (
                Region {
                    height: first_len,
                    ..bounds
                },
                Region {
                    y: bounds.y + first_len as i32,
                    height: side - first_len,
                    ..bounds
                },
            ),
        };

        let left = self.build(first, depth + 1, settings, rng);
        let right = self.build(second, depth + 1, settings, rng);
        let node = &mut self.nodes[id.0];
        node.children = Some((left, right));
        node.axis = Some(axis);
        id
    }

    /// The region the tree was built over.
    pub fn bounds(&self) -> Region {
        self.bounds
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&PartitionNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[PartitionNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaves in depth-first order, left (or top) child before right.
    ///
    /// Room IDs are assigned in this order, so it must stay stable.
    pub fn enumerate_leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = Vec::new();
        if !self.nodes.is_empty() {
            stack.push(self.root());
        }

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            if std::mem::replace(&mut visited[id.0], true) {
                continue;
            }
            match node.children {
                Some((left, right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => leaves.push(id),
            }
        }

        leaves
    }

    /// Sets the debug label of a node.
    pub fn annotate(&mut self, id: NodeId, label: impl Into<String>) -> FloorplanResult<()> {
        let node = self.nodes.get_mut(id.0).ok_or_else(|| {
            FloorplanError::InvalidInput(format!("partition node {} does not exist", id.0))
        })?;
        node.label = Some(label.into());
        Ok(())
    }

    pub fn stats(&self) -> PartitionStats {
        let mut stats = PartitionStats {
            node_count: self.nodes.len(),
            ..PartitionStats::default()
        };
        for node in &self.nodes {
            stats.max_depth = stats.max_depth.max(node.depth);
            match (node.children, node.axis) {
                (None, _) => stats.leaf_count += 1,
                (Some(_), Some(SplitAxis::Vertical)) => stats.vertical_splits += 1,
                (Some(_), Some(SplitAxis::Horizontal)) => stats.horizontal_splits += 1,
                (Some(_), None) => {}
            }
        }
        stats
    }

    /// Checks the tiling and bookkeeping invariants of the tree.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        let Some(root) = self.nodes.first() else {
            report.error("partition tree has no nodes");
            return report;
        };
        if root.bounds != self.bounds {
            report.error(format!(
                "root bounds {:?} do not cover the partitioned region {:?}",
                root.bounds, self.bounds
            ));
        }
        if root.depth != 0 {
            report.error(format!("root depth is {} instead of 0", root.depth));
        }

        let mut parents = vec![0_usize; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.0 != index {
                report.error(format!("node at index {index} is labelled {}", node.id.0));
            }

            let Some((left, right)) = node.children else {
                if node.axis.is_some() {
                    report.error(format!("leaf {index} records a split axis"));
                }
                if node.bounds.width < config::MIN_ROOM_SIZE
                    || node.bounds.height < config::MIN_ROOM_SIZE
                {
                    report.warning(format!(
                        "leaf {index} ({}x{}) cannot hold a room",
                        node.bounds.width, node.bounds.height
                    ));
                }
                continue;
            };

            if left == right {
                report.error(format!("node {index} lists child {} twice", left.0));
                continue;
            }
            let (Some(a), Some(b)) = (self.nodes.get(left.0), self.nodes.get(right.0)) else {
                report.error(format!("node {index} refers to a missing child"));
                continue;
            };
            parents[left.0] += 1;
            parents[right.0] += 1;

            if node.axis.is_none() {
                report.error(format!("split node {index} has no split axis"));
            }
            if a.depth != node.depth + 1 || b.depth != node.depth + 1 {
                report.error(format!("children of node {index} have inconsistent depth"));
            }
            let contained =
                node.bounds.contains_region(&a.bounds) && node.bounds.contains_region(&b.bounds);
            let disjoint = !a.bounds.intersects(&b.bounds);
            let covering = a.bounds.area() + b.bounds.area() == node.bounds.area();
            if !(contained && disjoint && covering) {
                report.error(format!(
                    "children of node {index} do not exactly tile {:?}",
                    node.bounds
                ));
            }
        }

        for (index, &count) in parents.iter().enumerate().skip(1) {
            if count != 1 {
                report.error(format!("node {index} has {count} parents"));
            }
        }
        if parents.first().copied().unwrap_or(0) != 0 {
            report.error("root is listed as a child");
        }

        report
    }
}

/// Length of the first child along the split side: the midpoint moved by a
/// seeded offset of up to `variation * side`, clamped so both children keep
/// at least `min` cells.
fn split_length(side: u32, min: u32, variation: f64, rng: &mut StdRng) -> u32 {
    let mid = (side / 2) as i64;
    let offset = if variation > 0.0 {
        (rng.gen_range(-variation..=variation) * side as f64).round() as i64
    } else {
        0
    };
    (mid + offset).clamp(min as i64, (side - min) as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::utils::create_rng;

    fn settings() -> PartitionSettings {
        PartitionSettings {
            min_partition_size: 10,
            max_depth: 5,
            stop_probability: 0.0,
            ..PartitionSettings::default()
        }
    }

    fn region() -> Region {
        Region::new(0, 0, 100, 100).unwrap()
    }

    #[test]
    fn test_leaves_tile_the_region() {
        for seed in 0..20 {
            let tree = PartitionTree::split(region(), &settings(), &mut create_rng(seed));
            let report = tree.validate();
            assert!(report.is_valid(), "seed {seed}: {report}");

            let leaves = tree.enumerate_leaves();
            let area: u64 = leaves
                .iter()
                .map(|&id| tree.node(id).unwrap().bounds.area())
                .sum();
            assert_eq!(area, region().area());
            for (i, &a) in leaves.iter().enumerate() {
                for &b in &leaves[i + 1..] {
                    let (a, b) = (tree.node(a).unwrap(), tree.node(b).unwrap());
                    assert!(!a.bounds.intersects(&b.bounds));
                }
            }
        }
    }

    #[test]
    fn test_split_respects_minimum_size() {
        let tree = PartitionTree::split(region(), &settings(), &mut create_rng(9));
        for id in tree.enumerate_leaves() {
            let node = tree.node(id).unwrap();
            assert!(node.bounds.width >= 10 && node.bounds.height >= 10);
            assert!(node.depth <= 5);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = PartitionTree::split(region(), &settings(), &mut create_rng(12345));
        let b = PartitionTree::split(region(), &settings(), &mut create_rng(12345));
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_depth_zero_yields_single_leaf() {
        let settings = PartitionSettings {
            max_depth: 0,
            ..settings()
        };
        let tree = PartitionTree::split(region(), &settings, &mut create_rng(1));
        assert_eq!(tree.enumerate_leaves(), vec![tree.root()]);
        assert_eq!(tree.stats().leaf_count, 1);
    }

    #[test]
    fn test_certain_stop_yields_single_leaf() {
        let settings = PartitionSettings {
            stop_probability: 1.0,
            ..settings()
        };
        let tree = PartitionTree::split(region(), &settings, &mut create_rng(1));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_small_region_is_a_leaf() {
        let small = Region::new(0, 0, 19, 50).unwrap();
        let tree = PartitionTree::split(small, &settings(), &mut create_rng(3));
        assert_eq!(tree.len(), 1);
        assert!(tree.node(tree.root()).unwrap().is_leaf());
    }

    #[test]
    fn test_alternate_policy_and_leaf_order() {
        let settings = PartitionSettings {
            max_depth: 2,
            split_policy: SplitPolicy::Alternate,
            split_variation: 0.0,
            ..settings()
        };
        let tree = PartitionTree::split(region(), &settings, &mut create_rng(5));
        let leaves: Vec<Region> = tree
            .enumerate_leaves()
            .into_iter()
            .map(|id| tree.node(id).unwrap().bounds)
            .collect();

        assert_eq!(
            leaves,
            vec![
                Region::new(0, 0, 50, 50).unwrap(),
                Region::new(0, 50, 50, 50).unwrap(),
                Region::new(50, 0, 50, 50).unwrap(),
                Region::new(50, 50, 50, 50).unwrap(),
            ]
        );

        let stats = tree.stats();
        assert_eq!(stats.vertical_splits, 1);
        assert_eq!(stats.horizontal_splits, 2);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.node_count, 7);
    }

    #[test]
    fn test_longer_axis_policy_cuts_long_side() {
        let settings = PartitionSettings {
            max_depth: 1,
            split_policy: SplitPolicy::LongerAxis,
            ..settings()
        };
        let wide = Region::new(0, 0, 80, 30).unwrap();
        let tree = PartitionTree::split(wide, &settings, &mut create_rng(2));
        assert_eq!(tree.node(tree.root()).unwrap().axis, Some(SplitAxis::Vertical));
    }

    #[test]
    fn test_annotate() {
        let mut tree = PartitionTree::split(region(), &settings(), &mut create_rng(4));
        let leaf = tree.enumerate_leaves()[0];
        tree.annotate(leaf, "reception").unwrap();
        assert_eq!(tree.node(leaf).unwrap().label.as_deref(), Some("reception"));
        assert!(tree.annotate(NodeId::new(10_000), "missing").is_err());
    }

    #[test]
    fn test_validate_reports_broken_tiling() {
        let mut tree = PartitionTree::split(region(), &settings(), &mut create_rng(4));
        let leaf = tree.enumerate_leaves()[0];
        tree.nodes[leaf.index()].bounds.width += 1;
        assert!(!tree.validate().is_valid());

        let mut tree = PartitionTree::split(region(), &settings(), &mut create_rng(4));
        let root = tree.root();
        tree.nodes[root.index()].children = Some((NodeId::new(1), NodeId::new(99_999)));
        assert!(!tree.validate().is_valid());
    }

    #[test]
    fn test_split_length_is_clamped() {
        let mut rng = create_rng(8);
        for _ in 0..200 {
            let len = split_length(25, 10, 0.49, &mut rng);
            assert!((10..=15).contains(&len));
        }
        assert_eq!(split_length(40, 10, 0.0, &mut rng), 20);
    }
}
