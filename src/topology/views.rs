//! Read-only view wrappers over cached topologies, and the property graph
//! that owns the cache.
//!
//! Algorithms are written against the small [`View`] surface (or
//! [`BiDirectionalView`] when they need in-edges); each concrete wrapper
//! composes one or two shared topologies. Building a view goes through
//! [`PropertyGraph`], which consults the view cache and reuses previously
//! built topologies where the tags allow.

use std::ops::Range;
use std::sync::Arc;

use crate::error::Result;
use crate::properties::EdgeTypeProvider;
use crate::runtime::Runtime;
use crate::topology::cache::{DefaultTopology, RdgTopology, ViewCache};
use crate::topology::shuffle::{EdgeShuffleTopology, ShuffleTopology};
use crate::topology::type_aware::EdgeTypeAwareTopology;
use crate::topology::{
    Edge, EdgeSortKind, EntityTypeId, GraphTopology, Node, NodeSortKind, PropertyIndex,
    TransposeKind,
};

/// Shared access to a CSR plus the node-permutation hook the fully shuffled
/// topology overrides.
pub trait TopologyRef: Send + Sync {
    fn topo(&self) -> &GraphTopology;

    fn node_property_index(&self, node: Node) -> PropertyIndex {
        node as PropertyIndex
    }
}

impl TopologyRef for GraphTopology {
    fn topo(&self) -> &GraphTopology {
        self
    }
}

impl TopologyRef for DefaultTopology {
    fn topo(&self) -> &GraphTopology {
        self
    }
}

impl TopologyRef for EdgeShuffleTopology {
    fn topo(&self) -> &GraphTopology {
        self.csr()
    }
}

impl TopologyRef for ShuffleTopology {
    fn topo(&self) -> &GraphTopology {
        self.csr()
    }

    fn node_property_index(&self, node: Node) -> PropertyIndex {
        ShuffleTopology::node_property_index(self, node)
    }
}

impl TopologyRef for EdgeTypeAwareTopology {
    fn topo(&self) -> &GraphTopology {
        self.csr()
    }
}

impl<T: TopologyRef> TopologyRef for Arc<T> {
    fn topo(&self) -> &GraphTopology {
        (**self).topo()
    }

    fn node_property_index(&self, node: Node) -> PropertyIndex {
        (**self).node_property_index(node)
    }
}

/// Minimum query surface algorithms are generic over.
pub trait View: Sync {
    fn num_nodes(&self) -> u64;
    fn num_edges(&self) -> u64;
    fn nodes(&self) -> Range<Node>;
    fn out_edges(&self, node: Node) -> Range<Edge>;
    fn out_edge_dst(&self, edge: Edge) -> Node;
    fn out_degree(&self, node: Node) -> usize;
}

/// Views that also expose incoming edges.
pub trait BiDirectionalView: View {
    fn in_edges(&self, node: Node) -> Range<Edge>;
    fn in_edge_src(&self, edge: Edge) -> Node;
    fn in_degree(&self, node: Node) -> usize;
}

/// Plain wrapper over one topology.
pub struct BasicView<T> {
    topo: T,
}

impl<T: TopologyRef> BasicView<T> {
    pub fn new(topo: T) -> Self {
        BasicView { topo }
    }

    pub fn topology(&self) -> &GraphTopology {
        self.topo.topo()
    }

    pub fn edge_property_index(&self, edge: Edge) -> PropertyIndex {
        self.topo.topo().edge_property_index(edge)
    }

    pub fn node_property_index(&self, node: Node) -> PropertyIndex {
        self.topo.node_property_index(node)
    }

    pub fn edge_src(&self, edge: Edge) -> Node {
        self.topo.topo().edge_src(edge)
    }
}

impl<T: TopologyRef> View for BasicView<T> {
    fn num_nodes(&self) -> u64 {
        self.topo.topo().num_nodes()
    }

    fn num_edges(&self) -> u64 {
        self.topo.topo().num_edges()
    }

    fn nodes(&self) -> Range<Node> {
        self.topo.topo().nodes()
    }

    fn out_edges(&self, node: Node) -> Range<Edge> {
        self.topo.topo().out_edges(node)
    }

    fn out_edge_dst(&self, edge: Edge) -> Node {
        self.topo.topo().out_edge_dst(edge)
    }

    fn out_degree(&self, node: Node) -> usize {
        self.topo.topo().out_degree(node)
    }
}

/// View over a destination-sorted topology; adds the binary-search queries.
pub struct SortedView {
    topo: Arc<EdgeShuffleTopology>,
}

impl SortedView {
    pub fn new(topo: Arc<EdgeShuffleTopology>) -> Self {
        debug_assert!(topo.has_edges_sorted_by(EdgeSortKind::SortedByDestId));
        SortedView { topo }
    }

    pub fn find_edge(&self, src: Node, dst: Node) -> Option<Edge> {
        self.topo.find_edge(src, dst)
    }

    pub fn find_all_edges(&self, src: Node, dst: Node) -> Range<Edge> {
        self.topo.find_all_edges(src, dst)
    }

    pub fn has_edge(&self, src: Node, dst: Node) -> bool {
        self.topo.has_edge(src, dst)
    }

    pub fn edge_property_index(&self, edge: Edge) -> PropertyIndex {
        self.topo.edge_property_index(edge)
    }
}

impl View for SortedView {
    fn num_nodes(&self) -> u64 {
        self.topo.num_nodes()
    }

    fn num_edges(&self) -> u64 {
        self.topo.num_edges()
    }

    fn nodes(&self) -> Range<Node> {
        self.topo.nodes()
    }

    fn out_edges(&self, node: Node) -> Range<Edge> {
        self.topo.out_edges(node)
    }

    fn out_edge_dst(&self, edge: Edge) -> Node {
        self.topo.out_edge_dst(edge)
    }

    fn out_degree(&self, node: Node) -> usize {
        self.topo.out_degree(node)
    }
}

/// Out-topology plus its transpose, for algorithms that walk both
/// directions.
pub struct BiDirView<O, I> {
    out: O,
    in_: I,
}

impl<O: TopologyRef, I: TopologyRef> BiDirView<O, I> {
    pub fn new(out: O, in_: I) -> Self {
        debug_assert!(in_.topo().is_transposed());
        debug_assert_eq!(out.topo().num_nodes(), in_.topo().num_nodes());
        debug_assert_eq!(out.topo().num_edges(), in_.topo().num_edges());
        BiDirView { out, in_ }
    }

    pub fn edge_property_index_from_out_edge(&self, edge: Edge) -> PropertyIndex {
        self.out.topo().edge_property_index(edge)
    }

    pub fn edge_property_index_from_in_edge(&self, edge: Edge) -> PropertyIndex {
        self.in_.topo().edge_property_index(edge)
    }

    pub fn node_property_index(&self, node: Node) -> PropertyIndex {
        self.out.node_property_index(node)
    }
}

impl<O: TopologyRef, I: TopologyRef> View for BiDirView<O, I> {
    fn num_nodes(&self) -> u64 {
        self.out.topo().num_nodes()
    }

    fn num_edges(&self) -> u64 {
        self.out.topo().num_edges()
    }

    fn nodes(&self) -> Range<Node> {
        self.out.topo().nodes()
    }

    fn out_edges(&self, node: Node) -> Range<Edge> {
        self.out.topo().out_edges(node)
    }

    fn out_edge_dst(&self, edge: Edge) -> Node {
        self.out.topo().out_edge_dst(edge)
    }

    fn out_degree(&self, node: Node) -> usize {
        self.out.topo().out_degree(node)
    }
}

impl<O: TopologyRef, I: TopologyRef> BiDirectionalView for BiDirView<O, I> {
    fn in_edges(&self, node: Node) -> Range<Edge> {
        self.in_.topo().out_edges(node)
    }

    fn in_edge_src(&self, edge: Edge) -> Node {
        self.in_.topo().out_edge_dst(edge)
    }

    fn in_degree(&self, node: Node) -> usize {
        self.in_.topo().out_degree(node)
    }
}

/// Union of out- and in-edges per node. In-edges get fake ids offset by
/// `num_edges + 1` so the two ranges never collide.
pub struct UndirectedView<O, I> {
    out: O,
    in_: I,
}

impl<O: TopologyRef, I: TopologyRef> UndirectedView<O, I> {
    pub fn new(out: O, in_: I) -> Self {
        debug_assert!(in_.topo().is_transposed());
        debug_assert_eq!(out.topo().num_nodes(), in_.topo().num_nodes());
        UndirectedView { out, in_ }
    }

    fn fake_id_offset(&self) -> Edge {
        // +1 so the one-past-last out-edge id differs from the first in-edge.
        self.out.topo().num_edges() + 1
    }

    fn is_in_edge(&self, edge: Edge) -> bool {
        edge >= self.fake_id_offset()
    }

    fn real_in_edge_id(&self, edge: Edge) -> Edge {
        debug_assert!(self.is_in_edge(edge));
        edge - self.fake_id_offset()
    }

    /// All undirected edge ids of `node`: out-edge ids followed by offset
    /// in-edge ids.
    pub fn undirected_edges(&self, node: Node) -> impl Iterator<Item = Edge> + '_ {
        let offset = self.fake_id_offset();
        let in_range = self.in_.topo().out_edges(node);
        self.out
            .topo()
            .out_edges(node)
            .chain(in_range.start + offset..in_range.end + offset)
    }

    pub fn undirected_degree(&self, node: Node) -> usize {
        self.out.topo().out_degree(node) + self.in_.topo().out_degree(node)
    }

    /// Neighbor on the other end of an undirected edge id.
    pub fn undirected_edge_neighbor(&self, edge: Edge) -> Node {
        if self.is_in_edge(edge) {
            self.in_.topo().out_edge_dst(self.real_in_edge_id(edge))
        } else {
            self.out.topo().out_edge_dst(edge)
        }
    }

    pub fn edge_property_index_from_undirected(&self, edge: Edge) -> PropertyIndex {
        if self.is_in_edge(edge) {
            self.in_
                .topo()
                .edge_property_index(self.real_in_edge_id(edge))
        } else {
            self.out.topo().edge_property_index(edge)
        }
    }

    pub fn node_property_index(&self, node: Node) -> PropertyIndex {
        self.out.node_property_index(node)
    }
}

impl<O: TopologyRef, I: TopologyRef> View for UndirectedView<O, I> {
    fn num_nodes(&self) -> u64 {
        self.out.topo().num_nodes()
    }

    // Out-edge ids cover every edge once; the in-side ids are aliases.
    fn num_edges(&self) -> u64 {
        self.out.topo().num_edges()
    }

    fn nodes(&self) -> Range<Node> {
        self.out.topo().nodes()
    }

    fn out_edges(&self, node: Node) -> Range<Edge> {
        self.out.topo().out_edges(node)
    }

    fn out_edge_dst(&self, edge: Edge) -> Node {
        self.out.topo().out_edge_dst(edge)
    }

    fn out_degree(&self, node: Node) -> usize {
        self.out.topo().out_degree(node)
    }
}

/// Edge-type-aware topology in both directions; lookups pick the cheaper
/// side by degree.
pub struct EdgeTypeAwareBiDirView {
    out: Arc<EdgeTypeAwareTopology>,
    in_: Arc<EdgeTypeAwareTopology>,
}

impl EdgeTypeAwareBiDirView {
    pub fn new(out: Arc<EdgeTypeAwareTopology>, in_: Arc<EdgeTypeAwareTopology>) -> Self {
        debug_assert!(in_.is_transposed());
        EdgeTypeAwareBiDirView { out, in_ }
    }

    pub fn distinct_edge_types(&self) -> &[EntityTypeId] {
        self.out.distinct_edge_types()
    }

    pub fn has_edge_type(&self, edge_type: EntityTypeId) -> bool {
        self.out.has_edge_type(edge_type)
    }

    pub fn out_edges_with_type(&self, node: Node, edge_type: EntityTypeId) -> Range<Edge> {
        self.out.edges_with_type(node, edge_type)
    }

    pub fn in_edges_with_type(&self, node: Node, edge_type: EntityTypeId) -> Range<Edge> {
        self.in_.edges_with_type(node, edge_type)
    }

    pub fn out_degree_with_type(&self, node: Node, edge_type: EntityTypeId) -> usize {
        self.out.degree_with_type(node, edge_type)
    }

    pub fn in_degree_with_type(&self, node: Node, edge_type: EntityTypeId) -> usize {
        self.in_.degree_with_type(node, edge_type)
    }

    pub fn find_all_edges_with_type(
        &self,
        src: Node,
        dst: Node,
        edge_type: EntityTypeId,
    ) -> Range<Edge> {
        self.out.find_all_edges_with_type(src, dst, edge_type)
    }

    pub fn find_all_edges(&self, src: Node, dst: Node) -> Range<Edge> {
        if self.out.out_degree(src) == 0 || self.in_.out_degree(dst) == 0 {
            return 0..0;
        }
        self.out.find_all_edges(src, dst)
    }

    pub fn has_edge_with_type(&self, src: Node, dst: Node, edge_type: EntityTypeId) -> bool {
        let d_out = self.out_degree_with_type(src, edge_type);
        let d_in = self.in_degree_with_type(dst, edge_type);
        if d_out == 0 || d_in == 0 {
            return false;
        }
        if d_out < d_in {
            self.out.has_edge_with_type(src, dst, edge_type)
        } else {
            self.in_.has_edge_with_type(dst, src, edge_type)
        }
    }

    pub fn has_edge(&self, src: Node, dst: Node) -> bool {
        let d_out = self.out.out_degree(src);
        let d_in = self.in_.out_degree(dst);
        if d_out == 0 || d_in == 0 {
            return false;
        }
        if d_out < d_in {
            self.out.has_edge(src, dst)
        } else {
            self.in_.has_edge(dst, src)
        }
    }
}

impl View for EdgeTypeAwareBiDirView {
    fn num_nodes(&self) -> u64 {
        self.out.num_nodes()
    }

    fn num_edges(&self) -> u64 {
        self.out.num_edges()
    }

    fn nodes(&self) -> Range<Node> {
        self.out.nodes()
    }

    fn out_edges(&self, node: Node) -> Range<Edge> {
        self.out.out_edges(node)
    }

    fn out_edge_dst(&self, edge: Edge) -> Node {
        self.out.out_edge_dst(edge)
    }

    fn out_degree(&self, node: Node) -> usize {
        self.out.out_degree(node)
    }
}

impl BiDirectionalView for EdgeTypeAwareBiDirView {
    fn in_edges(&self, node: Node) -> Range<Edge> {
        self.in_.out_edges(node)
    }

    fn in_edge_src(&self, edge: Edge) -> Node {
        self.in_.out_edge_dst(edge)
    }

    fn in_degree(&self, node: Node) -> usize {
        self.in_.out_degree(node)
    }
}

pub type DefaultView = BasicView<DefaultTopology>;
pub type TransposedView = BasicView<Arc<EdgeShuffleTopology>>;
pub type NodesSortedByDegreeView = BasicView<Arc<ShuffleTopology>>;
pub type BiDirectional = BiDirView<DefaultTopology, Arc<EdgeShuffleTopology>>;
pub type Undirected = UndirectedView<DefaultTopology, Arc<EdgeShuffleTopology>>;

/// The graph object: owns the base topology via the view cache plus the
/// optional edge-type column, and builds views on demand.
pub struct PropertyGraph {
    cache: ViewCache,
    edge_types: Option<Arc<dyn EdgeTypeProvider>>,
}

impl PropertyGraph {
    pub fn new(topology: GraphTopology) -> Self {
        PropertyGraph {
            cache: ViewCache::new(topology),
            edge_types: None,
        }
    }

    pub fn with_edge_types(topology: GraphTopology, edge_types: Arc<dyn EdgeTypeProvider>) -> Self {
        PropertyGraph {
            cache: ViewCache::new(topology),
            edge_types: Some(edge_types),
        }
    }

    pub fn topology(&self) -> &GraphTopology {
        self.cache.default_topology_ref()
    }

    pub fn num_nodes(&self) -> u64 {
        self.topology().num_nodes()
    }

    pub fn num_edges(&self) -> u64 {
        self.topology().num_edges()
    }

    pub fn view_cache(&self) -> &ViewCache {
        &self.cache
    }

    pub fn drop_all_topologies(&mut self) {
        self.cache.drop_all();
    }

    pub fn to_rdg_topologies(&self) -> Vec<RdgTopology> {
        self.cache.to_rdg_topologies()
    }

    pub fn default_view(&self) -> DefaultView {
        BasicView::new(self.cache.default_topology())
    }

    pub fn transposed_view(&mut self, rt: &Runtime) -> Result<TransposedView> {
        let types = self.edge_types.as_deref();
        let topo = self.cache.edge_shuffle_topology(
            rt,
            TransposeKind::Yes,
            EdgeSortKind::Any,
            types,
        )?;
        Ok(BasicView::new(topo))
    }

    /// Destination-sorted view. The sorted topology also becomes the default
    /// so equivalent CSRs are not kept twice.
    pub fn edges_sorted_by_dest_view(&mut self, rt: &Runtime) -> Result<SortedView> {
        let types = self.edge_types.as_deref();
        let topo = self.cache.edge_shuffle_topology(
            rt,
            TransposeKind::No,
            EdgeSortKind::SortedByDestId,
            types,
        )?;
        self.cache.reseat_default(&topo);
        Ok(SortedView::new(topo))
    }

    pub fn nodes_sorted_by_degree_view(&mut self, rt: &Runtime) -> Result<NodesSortedByDegreeView> {
        let types = self.edge_types.as_deref();
        let topo = self.cache.shuffle_topology(
            rt,
            TransposeKind::No,
            NodeSortKind::SortedByDegree,
            EdgeSortKind::SortedByDestId,
            types,
        )?;
        Ok(BasicView::new(topo))
    }

    pub fn bidirectional_view(&mut self, rt: &Runtime) -> Result<BiDirectional> {
        let types = self.edge_types.as_deref();
        let tpose = self.cache.edge_shuffle_topology(
            rt,
            TransposeKind::Yes,
            EdgeSortKind::Any,
            types,
        )?;
        Ok(BiDirView::new(self.cache.default_topology(), tpose))
    }

    pub fn undirected_view(&mut self, rt: &Runtime) -> Result<Undirected> {
        let types = self.edge_types.as_deref();
        let tpose = self.cache.edge_shuffle_topology(
            rt,
            TransposeKind::Yes,
            EdgeSortKind::Any,
            types,
        )?;
        Ok(UndirectedView::new(self.cache.default_topology(), tpose))
    }

    pub fn edge_type_aware_bidir_view(&mut self, rt: &Runtime) -> Result<EdgeTypeAwareBiDirView> {
        let provider = self.edge_types.clone().ok_or_else(|| {
            crate::error::Error::invalid("edge-type-aware view requires an edge type column")
        })?;
        let out = self
            .cache
            .edge_type_aware_topology(rt, TransposeKind::No, provider.as_ref())?;
        let in_ = self
            .cache
            .edge_type_aware_topology(rt, TransposeKind::Yes, provider.as_ref())?;
        Ok(EdgeTypeAwareBiDirView::new(out, in_))
    }
}
