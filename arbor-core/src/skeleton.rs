use std::collections::VecDeque;

use glam::{Quat, Vec3};

use crate::types::{FlowHandle, NodeHandle};

/// Geometric state of one node, maintained by the pose pass.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub global_position: Vec3,
    pub global_rotation: Quat,
    pub local_rotation: Quat,
    pub length: f32,
    pub thickness: f32,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            global_position: Vec3::ZERO,
            global_rotation: Quat::IDENTITY,
            local_rotation: Quat::IDENTITY,
            length: 0.0,
            thickness: 0.0,
        }
    }
}

impl NodeInfo {
    /// World-space end point of the internode (front axis is local -Z).
    pub fn global_end_position(&self) -> Vec3 {
        self.global_position + self.length * (self.global_rotation * Vec3::NEG_Z)
    }
}

/// One node of a skeleton, owning its payload `N`.
#[derive(Debug, Clone)]
pub struct Node<N> {
    handle: NodeHandle,
    recycled: bool,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    flow: FlowHandle,
    apical: bool,
    order: u32,
    pub info: NodeInfo,
    pub data: N,
}

impl<N> Node<N> {
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    pub fn flow(&self) -> FlowHandle {
        self.flow
    }

    /// Whether this node continues its parent's axis (true for the root).
    pub fn is_apical(&self) -> bool {
        self.apical
    }

    pub fn is_end_node(&self) -> bool {
        self.children.is_empty()
    }

    /// Branch depth of the owning flow, written by
    /// [`Skeleton::calculate_flows`].
    pub fn order(&self) -> u32 {
        self.order
    }
}

/// A maximal unbranched chain of nodes.
#[derive(Debug, Clone)]
pub struct Flow<F> {
    handle: FlowHandle,
    recycled: bool,
    parent: Option<FlowHandle>,
    children: Vec<FlowHandle>,
    nodes: Vec<NodeHandle>,
    apical: bool,
    order: u32,
    pub data: F,
}

impl<F> Flow<F> {
    pub fn handle(&self) -> FlowHandle {
        self.handle
    }

    pub fn parent(&self) -> Option<FlowHandle> {
        self.parent
    }

    pub fn children(&self) -> &[FlowHandle] {
        &self.children
    }

    /// Member nodes, ordered root-to-tip.
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    pub fn is_apical(&self) -> bool {
        self.apical
    }

    pub fn order(&self) -> u32 {
        self.order
    }
}

/// Rooted tree of nodes partitioned into flows, with handle-indexed pools
/// and free lists for recycling.
///
/// A fresh skeleton always contains one root node (handle 0) in one root
/// flow. Topologically sorted traversal orders are recomputed on demand by
/// [`Skeleton::sort_lists`] and are invalidated by any structural change.
#[derive(Debug, Clone)]
pub struct Skeleton<S, F, N> {
    nodes: Vec<Node<N>>,
    flows: Vec<Flow<F>>,
    node_pool: Vec<NodeHandle>,
    flow_pool: Vec<FlowHandle>,
    sorted_nodes: Vec<NodeHandle>,
    sorted_flows: Vec<FlowHandle>,
    pub min: Vec3,
    pub max: Vec3,
    pub data: S,
}

impl<S: Default, F: Default, N: Default> Default for Skeleton<S, F, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Default, F: Default, N: Default> Skeleton<S, F, N> {
    pub fn new() -> Self {
        let mut skeleton = Self {
            nodes: Vec::new(),
            flows: Vec::new(),
            node_pool: Vec::new(),
            flow_pool: Vec::new(),
            sorted_nodes: Vec::new(),
            sorted_flows: Vec::new(),
            min: Vec3::ZERO,
            max: Vec3::ZERO,
            data: S::default(),
        };
        let flow = skeleton.allocate_flow(None, true);
        let root = skeleton.allocate_node(None, flow, true);
        skeleton.flows[flow].nodes.push(root);
        skeleton.sort_lists();
        skeleton
    }

    /// Rebuilds this skeleton as a 1:1 structural copy of `source`,
    /// reporting each `(source, destination)` node-handle pair through
    /// `on_map`. Payloads are defaulted; `NodeInfo` is copied.
    pub fn clone_topology<S2, F2, N2>(
        source: &Skeleton<S2, F2, N2>,
        mut on_map: impl FnMut(NodeHandle, NodeHandle),
    ) -> Self {
        let mut skeleton = Self::new();
        let mut queue = VecDeque::new();
        let src_root = source
            .nodes
            .iter()
            .find(|n| !n.recycled && n.parent.is_none())
            .map(|n| n.handle);
        let Some(src_root) = src_root else {
            return skeleton;
        };
        // (source handle, destination parent) pairs; the root maps onto the
        // fresh skeleton's own root.
        skeleton.nodes[0].info = source.nodes[src_root].info.clone();
        on_map(src_root, 0);
        for &child in &source.nodes[src_root].children {
            queue.push_back((child, 0));
        }
        while let Some((src_handle, dst_parent)) = queue.pop_front() {
            let src_node = &source.nodes[src_handle];
            let dst_handle = skeleton.extend(dst_parent, !src_node.apical);
            skeleton.nodes[dst_handle].info = src_node.info.clone();
            on_map(src_handle, dst_handle);
            for &child in &source.nodes[src_handle].children {
                queue.push_back((child, dst_handle));
            }
        }
        skeleton.sort_lists();
        skeleton
    }

    fn allocate_node(
        &mut self,
        parent: Option<NodeHandle>,
        flow: FlowHandle,
        apical: bool,
    ) -> NodeHandle {
        if let Some(handle) = self.node_pool.pop() {
            let node = &mut self.nodes[handle];
            node.recycled = false;
            node.parent = parent;
            node.children.clear();
            node.flow = flow;
            node.apical = apical;
            node.order = 0;
            node.info = NodeInfo::default();
            node.data = N::default();
            handle
        } else {
            let handle = self.nodes.len();
            self.nodes.push(Node {
                handle,
                recycled: false,
                parent,
                children: Vec::new(),
                flow,
                apical,
                order: 0,
                info: NodeInfo::default(),
                data: N::default(),
            });
            handle
        }
    }

    fn allocate_flow(&mut self, parent: Option<FlowHandle>, apical: bool) -> FlowHandle {
        if let Some(handle) = self.flow_pool.pop() {
            let flow = &mut self.flows[handle];
            flow.recycled = false;
            flow.parent = parent;
            flow.children.clear();
            flow.nodes.clear();
            flow.apical = apical;
            flow.order = 0;
            flow.data = F::default();
            handle
        } else {
            let handle = self.flows.len();
            self.flows.push(Flow {
                handle,
                recycled: false,
                parent,
                children: Vec::new(),
                nodes: Vec::new(),
                apical,
                order: 0,
                data: F::default(),
            });
            handle
        }
    }

    /// Creates one new child of `parent`.
    ///
    /// With `is_branch == false` the child continues the parent's flow; the
    /// parent must be childless. With `is_branch == true` the child starts a
    /// new flow; a parent interior to its flow splits the flow first so that
    /// branch points stay on flow boundaries.
    pub fn extend(&mut self, parent: NodeHandle, is_branch: bool) -> NodeHandle {
        assert!(
            !self.nodes[parent].recycled,
            "extend from recycled node {parent}"
        );
        let parent_flow = self.nodes[parent].flow;
        let target_flow = if is_branch {
            if *self.flows[parent_flow]
                .nodes
                .last()
                .expect("flow without nodes")
                != parent
            {
                self.split_flow(parent_flow, parent);
            }
            let flow = self.allocate_flow(Some(parent_flow), false);
            self.flows[parent_flow].children.push(flow);
            flow
        } else {
            assert!(
                self.nodes[parent].children.is_empty(),
                "apical continuation from a node that already has children"
            );
            parent_flow
        };
        let handle = self.allocate_node(Some(parent), target_flow, !is_branch);
        self.flows[target_flow].nodes.push(handle);
        self.nodes[parent].children.push(handle);
        handle
    }

    /// Moves the nodes after `after` out of `flow` into a fresh apical child
    /// flow, which also inherits the original flow's children.
    fn split_flow(&mut self, flow: FlowHandle, after: NodeHandle) {
        let position = self.flows[flow]
            .nodes
            .iter()
            .position(|&n| n == after)
            .expect("split node not in flow");
        let tail = self.flows[flow].nodes.split_off(position + 1);
        if tail.is_empty() {
            return;
        }
        let new_flow = self.allocate_flow(Some(flow), true);
        let moved_children = std::mem::take(&mut self.flows[flow].children);
        for &child in &moved_children {
            self.flows[child].parent = Some(new_flow);
        }
        for &node in &tail {
            self.nodes[node].flow = new_flow;
        }
        self.flows[new_flow].children = moved_children;
        self.flows[new_flow].nodes = tail;
        self.flows[flow].children.push(new_flow);
    }

    /// Removes `handle` and its entire subtree. Handles inside the subtree
    /// are invalidated and returned to the free list; flows fully contained
    /// in the subtree are recycled, a flow cut mid-chain keeps its prefix.
    pub fn recycle_node(&mut self, handle: NodeHandle) {
        assert!(
            !self.nodes[handle].recycled,
            "recycle of already recycled node {handle}"
        );
        assert!(
            self.nodes[handle].parent.is_some(),
            "root node cannot be recycled"
        );
        if let Some(parent) = self.nodes[handle].parent {
            self.nodes[parent].children.retain(|&c| c != handle);
        }
        let mut stack = vec![handle];
        let mut subtree = Vec::new();
        while let Some(h) = stack.pop() {
            subtree.push(h);
            stack.extend(self.nodes[h].children.iter().copied());
        }
        for &h in &subtree {
            let flow = self.nodes[h].flow;
            self.flows[flow].nodes.retain(|&n| n != h);
            let node = &mut self.nodes[h];
            node.recycled = true;
            node.parent = None;
            node.children.clear();
            node.data = N::default();
            self.node_pool.push(h);
        }
        for h in 0..self.flows.len() {
            if !self.flows[h].recycled && self.flows[h].nodes.is_empty() {
                if let Some(parent) = self.flows[h].parent {
                    self.flows[parent].children.retain(|&c| c != h);
                }
                let flow = &mut self.flows[h];
                flow.recycled = true;
                flow.parent = None;
                flow.children.clear();
                flow.data = F::default();
                self.flow_pool.push(h);
            }
        }
    }
}

impl<S, F, N> Skeleton<S, F, N> {
    pub fn node(&self, handle: NodeHandle) -> &Node<N> {
        let node = &self.nodes[handle];
        assert!(!node.recycled, "access to recycled node {handle}");
        node
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> &mut Node<N> {
        let node = &mut self.nodes[handle];
        assert!(!node.recycled, "access to recycled node {handle}");
        node
    }

    pub fn flow(&self, handle: FlowHandle) -> &Flow<F> {
        let flow = &self.flows[handle];
        assert!(!flow.recycled, "access to recycled flow {handle}");
        flow
    }

    pub fn flow_mut(&mut self, handle: FlowHandle) -> &mut Flow<F> {
        let flow = &mut self.flows[handle];
        assert!(!flow.recycled, "access to recycled flow {handle}");
        flow
    }

    pub fn root_handle(&self) -> NodeHandle {
        0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.node_pool.len()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len() - self.flow_pool.len()
    }

    /// Root-first topological node order from the last [`Self::sort_lists`].
    pub fn sorted_node_list(&self) -> &[NodeHandle] {
        &self.sorted_nodes
    }

    pub fn sorted_flow_list(&self) -> &[FlowHandle] {
        &self.sorted_flows
    }

    /// Recomputes the sorted node and flow lists (root first, parents before
    /// children). Required before any traversal that aggregates leaf-to-root
    /// or root-to-leaf state.
    pub fn sort_lists(&mut self) {
        self.sorted_nodes.clear();
        let mut queue = VecDeque::from([self.root_handle()]);
        while let Some(handle) = queue.pop_front() {
            self.sorted_nodes.push(handle);
            queue.extend(self.nodes[handle].children.iter().copied());
        }
        self.sorted_flows.clear();
        let mut queue = VecDeque::from([self.nodes[self.root_handle()].flow]);
        while let Some(handle) = queue.pop_front() {
            self.sorted_flows.push(handle);
            queue.extend(self.flows[handle].children.iter().copied());
        }
    }

    /// Recomputes each flow's order (apical continuation keeps the parent
    /// flow's order, branching increments it) and writes the order onto
    /// member nodes. Expects [`Self::sort_lists`] to be current.
    pub fn calculate_flows(&mut self) {
        for i in 0..self.sorted_flows.len() {
            let handle = self.sorted_flows[i];
            let order = match self.flows[handle].parent {
                None => 0,
                Some(parent) => {
                    let parent_order = self.flows[parent].order;
                    if self.flows[handle].apical {
                        parent_order
                    } else {
                        parent_order + 1
                    }
                }
            };
            self.flows[handle].order = order;
            for n in 0..self.flows[handle].nodes.len() {
                let node = self.flows[handle].nodes[n];
                self.nodes[node].order = order;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestSkeleton = Skeleton<(), (), ()>;

    fn sorted_position(skeleton: &TestSkeleton, handle: NodeHandle) -> usize {
        skeleton
            .sorted_node_list()
            .iter()
            .position(|&h| h == handle)
            .expect("node missing from sorted list")
    }

    #[test]
    fn new_skeleton_has_single_root_in_single_flow() {
        let skeleton = TestSkeleton::new();
        assert_eq!(skeleton.node_count(), 1);
        assert_eq!(skeleton.flow_count(), 1);
        let root = skeleton.node(skeleton.root_handle());
        assert!(root.parent().is_none());
        assert!(root.is_apical());
        assert_eq!(skeleton.flow(root.flow()).nodes(), &[0]);
    }

    #[test]
    fn apical_extension_continues_the_flow() {
        let mut skeleton = TestSkeleton::new();
        let a = skeleton.extend(0, false);
        let b = skeleton.extend(a, false);
        assert_eq!(skeleton.flow_count(), 1);
        assert_eq!(skeleton.node(0).flow(), skeleton.node(b).flow());
        assert_eq!(skeleton.flow(skeleton.node(0).flow()).nodes(), &[0, a, b]);
    }

    #[test]
    fn branching_from_flow_end_creates_child_flow() {
        let mut skeleton = TestSkeleton::new();
        let branch = skeleton.extend(0, true);
        assert_eq!(skeleton.flow_count(), 2);
        let branch_flow = skeleton.node(branch).flow();
        assert!(!skeleton.flow(branch_flow).is_apical());
        assert_eq!(
            skeleton.flow(branch_flow).parent(),
            Some(skeleton.node(0).flow())
        );
        assert!(!skeleton.node(branch).is_apical());
    }

    #[test]
    fn branching_mid_flow_splits_the_flow() {
        let mut skeleton = TestSkeleton::new();
        let a = skeleton.extend(0, false);
        let b = skeleton.extend(a, false);
        // Branch from `a`, which is interior to the root flow.
        let side = skeleton.extend(a, true);
        assert_eq!(skeleton.flow_count(), 3);

        let root_flow = skeleton.node(0).flow();
        assert_eq!(skeleton.flow(root_flow).nodes(), &[0, a]);

        let tail_flow = skeleton.node(b).flow();
        assert_ne!(tail_flow, root_flow);
        assert!(skeleton.flow(tail_flow).is_apical());
        assert_eq!(skeleton.flow(tail_flow).nodes(), &[b]);

        let side_flow = skeleton.node(side).flow();
        assert!(!skeleton.flow(side_flow).is_apical());
        assert_eq!(skeleton.flow(side_flow).parent(), Some(root_flow));
    }

    #[test]
    fn sorted_list_puts_every_node_after_its_parent() {
        let mut skeleton = TestSkeleton::new();
        let a = skeleton.extend(0, false);
        let b = skeleton.extend(a, false);
        let s1 = skeleton.extend(a, true);
        let s2 = skeleton.extend(b, true);
        let tip = skeleton.extend(s1, false);
        skeleton.sort_lists();
        for &handle in skeleton.sorted_node_list() {
            if let Some(parent) = skeleton.node(handle).parent() {
                assert!(
                    sorted_position(&skeleton, parent) < sorted_position(&skeleton, handle),
                    "node {handle} sorted before its parent {parent}"
                );
            }
        }
        assert_eq!(skeleton.sorted_node_list().len(), 6);
        let _ = (s2, tip);
    }

    #[test]
    fn flow_orders_follow_branching_depth() {
        let mut skeleton = TestSkeleton::new();
        let a = skeleton.extend(0, false);
        let b = skeleton.extend(a, false);
        let side = skeleton.extend(a, true);
        let side_side = skeleton.extend(side, true);
        skeleton.sort_lists();
        skeleton.calculate_flows();

        // Root flow and the split-off apical tail share order 0.
        assert_eq!(skeleton.flow(skeleton.node(0).flow()).order(), 0);
        assert_eq!(skeleton.flow(skeleton.node(b).flow()).order(), 0);
        assert_eq!(skeleton.flow(skeleton.node(side).flow()).order(), 1);
        assert_eq!(skeleton.flow(skeleton.node(side_side).flow()).order(), 2);

        // Orders are propagated onto member nodes.
        assert_eq!(skeleton.node(b).order(), 0);
        assert_eq!(skeleton.node(side).order(), 1);
        assert_eq!(skeleton.node(side_side).order(), 2);

        // Every flow's members share one order value.
        for &flow in skeleton.sorted_flow_list() {
            let order = skeleton.flow(flow).order();
            for &node in skeleton.flow(flow).nodes() {
                assert_eq!(skeleton.node(node).order(), order);
            }
        }
    }

    #[test]
    fn recycle_removes_whole_subtree_and_its_flows() {
        let mut skeleton = TestSkeleton::new();
        let a = skeleton.extend(0, false);
        let b = skeleton.extend(a, false);
        let side = skeleton.extend(a, true);
        let side_tip = skeleton.extend(side, false);
        assert_eq!(skeleton.node_count(), 5);

        skeleton.recycle_node(side);
        assert_eq!(skeleton.node_count(), 3);
        assert_eq!(skeleton.node(a).children(), &[b]);
        // The branch flow is gone; root flow and apical tail remain.
        assert_eq!(skeleton.flow_count(), 2);

        skeleton.sort_lists();
        assert_eq!(skeleton.sorted_node_list().len(), 3);
        let _ = side_tip;
    }

    #[test]
    fn recycled_handles_are_reused() {
        let mut skeleton = TestSkeleton::new();
        let a = skeleton.extend(0, false);
        let side = skeleton.extend(a, true);
        skeleton.recycle_node(side);
        let again = skeleton.extend(a, true);
        assert_eq!(again, side);
        assert_eq!(skeleton.node_count(), 3);
    }

    #[test]
    #[should_panic(expected = "recycled")]
    fn access_to_recycled_node_panics() {
        let mut skeleton = TestSkeleton::new();
        let a = skeleton.extend(0, true);
        skeleton.recycle_node(a);
        let _ = skeleton.node(a);
    }

    #[test]
    fn clone_topology_maps_every_live_node() {
        let mut source = TestSkeleton::new();
        let a = source.extend(0, false);
        let _b = source.extend(a, false);
        let side = source.extend(a, true);
        let _side_tip = source.extend(side, false);
        source.sort_lists();

        let mut map = std::collections::HashMap::new();
        let clone: TestSkeleton = Skeleton::clone_topology(&source, |src, dst| {
            map.insert(src, dst);
        });
        assert_eq!(clone.node_count(), source.node_count());
        assert_eq!(clone.flow_count(), source.flow_count());
        for (&src, &dst) in &map {
            assert_eq!(
                source.node(src).is_apical(),
                clone.node(dst).is_apical(),
                "apical flag mismatch for source node {src}"
            );
            assert_eq!(
                source.node(src).children().len(),
                clone.node(dst).children().len()
            );
        }
    }
}
