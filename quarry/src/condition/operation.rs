use std::fmt::Display;

use itertools::Itertools;

use crate::common::{Record, Value};
use crate::condition::Comparison;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};

/// Index of a node inside a [ConditionTree] arena.
pub type NodeId = usize;

/// The connective of a boolean operation node.
///
/// `Null` is the degenerate placeholder: it matches everything, and it
/// mutates into `And` the first time an operand lands on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    And,
    Or,
    Not,
    Null,
}

impl OperationKind {
    pub fn operator(&self) -> &'static str {
        match self {
            OperationKind::And | OperationKind::Null => "AND",
            OperationKind::Or => "OR",
            OperationKind::Not => "NOT",
        }
    }
}

/// One node of the tree: a boolean operation over child nodes, a comparison
/// leaf, or a raw field/value literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Operation {
        kind: OperationKind,
        children: Vec<NodeId>,
    },
    Comparison(Comparison),
    /// Raw condition: untyped field text paired with a bind value. It skips
    /// the model layer entirely; in-memory evaluation treats it as equality
    /// of the named field.
    Literal(String, Value),
}

/// Something that can be appended to an operation node.
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionOperand {
    Comparison(Comparison),
    /// A fresh empty operation of the given kind.
    Operation(OperationKind),
    /// A whole tree grafted in as a subtree (flattened when the root
    /// connective matches the target's).
    Tree(ConditionTree),
    Literal(String, Value),
}

#[derive(Clone, Debug, PartialEq)]
struct NodeEntry {
    node: Node,
    parent: Option<NodeId>,
}

/// A boolean condition tree stored in a flat arena.
///
/// Nodes reference each other by index and children hold their parent's
/// index; subtrees are grafted by copying. There are no shared node handles,
/// so a tree can never be appended into itself, and negation state is always
/// computed from the current ancestry rather than cached.
///
/// The root is an operation node, conventionally `And`; an `And` with no
/// children matches every record.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionTree {
    nodes: Vec<NodeEntry>,
    root: NodeId,
}

impl ConditionTree {
    /// Creates a tree with an empty operation of the given kind at the root.
    pub fn new(kind: OperationKind) -> ConditionTree {
        ConditionTree {
            nodes: vec![NodeEntry {
                node: Node::Operation {
                    kind,
                    children: Vec::new(),
                },
                parent: None,
            }],
            root: 0,
        }
    }

    /// An `And` root holding a single comparison.
    pub fn from_comparison(comparison: Comparison) -> ConditionTree {
        let mut tree = ConditionTree::new(OperationKind::And);
        let root = tree.root();
        tree.push_node(root, Node::Comparison(comparison));
        tree
    }

    /// A tree that matches no record at all: `Not` over the match-all
    /// placeholder.
    pub fn match_none() -> ConditionTree {
        let mut tree = ConditionTree::new(OperationKind::And);
        let root = tree.root();
        let not = tree.push_node(
            root,
            Node::Operation {
                kind: OperationKind::Not,
                children: Vec::new(),
            },
        );
        tree.push_node(
            not,
            Node::Operation {
                kind: OperationKind::Null,
                children: Vec::new(),
            },
        );
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id].node
    }

    /// The connective at the root.
    pub fn root_kind(&self) -> OperationKind {
        match self.node(self.root) {
            Node::Operation { kind, .. } => *kind,
            // the root is always an operation node
            _ => OperationKind::And,
        }
    }

    /// Child ids of an operation node; empty for leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Node::Operation { children, .. } => children,
            _ => &[],
        }
    }

    /// True when the tree places no constraint on records (empty root).
    pub fn is_match_all(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// Appends an operand to the operation node `target` and returns the id
    /// of the appended node.
    ///
    /// Appending enforces the tree's shape rules:
    /// - a `Null` target mutates to `And` on its first operand;
    /// - a `Not` target accepts exactly one operand;
    /// - a grafted `And`/`Or` tree whose root connective equals the target's
    ///   is flattened into the target instead of nesting (`Not` always
    ///   nests);
    /// - an operand structurally equal to an existing child is dropped and
    ///   the existing child's id is returned.
    pub fn append(&mut self, target: NodeId, operand: ConditionOperand) -> QuarryResult<NodeId> {
        self.check_target(target)?;

        match operand {
            ConditionOperand::Comparison(comparison) => {
                self.append_leaf(target, Node::Comparison(comparison))
            }
            ConditionOperand::Literal(text, value) => {
                self.append_leaf(target, Node::Literal(text, value))
            }
            ConditionOperand::Operation(kind) => {
                if let Some(existing) = self.children(target).iter().copied().find(|c| {
                    matches!(
                        self.node(*c),
                        Node::Operation { kind: k, children } if *k == kind && children.is_empty()
                    )
                }) {
                    return Ok(existing);
                }
                self.promote_null(target);
                self.check_arity(target)?;
                Ok(self.push_node(
                    target,
                    Node::Operation {
                        kind,
                        children: Vec::new(),
                    },
                ))
            }
            ConditionOperand::Tree(tree) => {
                // an empty placeholder contributes nothing
                if tree.root_kind() == OperationKind::Null && tree.is_match_all() {
                    return Ok(target);
                }
                self.promote_null(target);

                let target_kind = self.kind_of(target);
                if tree.root_kind() == target_kind
                    && matches!(target_kind, OperationKind::And | OperationKind::Or)
                {
                    // flatten: splice the children rather than nesting
                    for child in tree.children(tree.root()).to_vec() {
                        if self.equal_subtree_child(target, &tree, child).is_some() {
                            continue;
                        }
                        self.check_arity(target)?;
                        self.graft(target, &tree, child);
                    }
                    Ok(target)
                } else {
                    if let Some(existing) = self.equal_subtree_child(target, &tree, tree.root()) {
                        return Ok(existing);
                    }
                    self.check_arity(target)?;
                    Ok(self.graft(target, &tree, tree.root()))
                }
            }
        }
    }

    fn append_leaf(&mut self, target: NodeId, node: Node) -> QuarryResult<NodeId> {
        if let Some(existing) = self
            .children(target)
            .iter()
            .find(|c| self.node(**c) == &node)
        {
            return Ok(*existing);
        }
        self.promote_null(target);
        self.check_arity(target)?;
        Ok(self.push_node(target, node))
    }

    /// Appends several operands to the same target.
    pub fn merge(
        &mut self,
        target: NodeId,
        operands: Vec<ConditionOperand>,
    ) -> QuarryResult<()> {
        for operand in operands {
            self.append(target, operand)?;
        }
        Ok(())
    }

    /// Whether the node sits under an odd number of `Not` ancestors.
    ///
    /// Computed by walking the parent chain, so it is always current even
    /// after the tree is restructured.
    pub fn negated(&self, id: NodeId) -> bool {
        let mut count = 0usize;
        let mut cursor = self.nodes[id].parent;
        while let Some(parent) = cursor {
            if let Node::Operation {
                kind: OperationKind::Not,
                ..
            } = self.nodes[parent].node
            {
                count += 1;
            }
            cursor = self.nodes[parent].parent;
        }
        count % 2 == 1
    }

    /// Evaluates the tree against a record.
    ///
    /// An empty `And` (or `Null`) matches everything; `Not` inverts its
    /// single operand; literals test equality of the named field.
    pub fn matches(&self, record: &Record) -> QuarryResult<bool> {
        self.matches_node(self.root, record)
    }

    fn matches_node(&self, id: NodeId, record: &Record) -> QuarryResult<bool> {
        match self.node(id) {
            Node::Comparison(comparison) => comparison.matches(record),
            Node::Literal(name, value) => {
                let actual = record.get(name);
                if value.is_null() {
                    Ok(actual.is_null())
                } else {
                    Ok(actual == *value)
                }
            }
            Node::Operation { kind, children } => match kind {
                OperationKind::And | OperationKind::Null => {
                    for child in children {
                        if !self.matches_node(*child, record)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                OperationKind::Or => {
                    for child in children {
                        if self.matches_node(*child, record)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                OperationKind::Not => match children.first() {
                    Some(child) => Ok(!self.matches_node(*child, record)?),
                    // negation of an implicit match-all
                    None => Ok(false),
                },
            },
        }
    }

    /// Soft validity of the whole tree: every conjunct valid, at least one
    /// disjunct valid, with negation parity threaded down to the leaves.
    pub fn is_valid(&self) -> bool {
        self.valid_node(self.root, false)
    }

    fn valid_node(&self, id: NodeId, negated: bool) -> bool {
        match self.node(id) {
            Node::Comparison(comparison) => comparison.is_valid(negated),
            Node::Literal(_, _) => true,
            Node::Operation { kind, children } => match kind {
                OperationKind::And | OperationKind::Null => {
                    children.iter().all(|c| self.valid_node(*c, negated))
                }
                OperationKind::Or => {
                    children.is_empty() || children.iter().any(|c| self.valid_node(*c, negated))
                }
                OperationKind::Not => match children.first() {
                    Some(child) => self.valid_node(*child, !negated),
                    None => true,
                },
            },
        }
    }

    /// Returns a simplified copy.
    ///
    /// Match-all subtrees (empty or `Null` operations) are identities: they
    /// are dropped from `And` and dominate `Or`. Single-operand `And`/`Or`
    /// collapse to their operand, same-kind nesting flattens, `Not(Not(x))`
    /// cancels, and `Not` over match-all is preserved as the match-none
    /// shape.
    pub fn minimized(&self) -> ConditionTree {
        let simplified = self.simplify(self.root);
        let mut out = ConditionTree::new(OperationKind::And);
        let root = out.root();
        match simplified {
            Simplified::All => {}
            Simplified::Op(OperationKind::And, children) => {
                for child in children {
                    emit(&mut out, root, child);
                }
            }
            other => emit(&mut out, root, other),
        }
        out
    }

    /// Simplifies the tree in place.
    pub fn minimize(&mut self) {
        *self = self.minimized();
    }

    fn simplify(&self, id: NodeId) -> Simplified {
        match self.node(id) {
            Node::Comparison(_) | Node::Literal(_, _) => {
                Simplified::Leaf(self.nodes[id].node.clone())
            }
            Node::Operation {
                kind: OperationKind::Not,
                children,
            } => match children.first() {
                // an operand-less Not negates an implicit match-all
                None => Simplified::Op(OperationKind::Not, vec![Simplified::All]),
                Some(child) => match self.simplify(*child) {
                    // double negation cancels
                    Simplified::Op(OperationKind::Not, mut inner) if inner.len() == 1 => {
                        inner.remove(0)
                    }
                    other => Simplified::Op(OperationKind::Not, vec![other]),
                },
            },
            Node::Operation { kind, children } => {
                let or = *kind == OperationKind::Or;
                let effective = if or {
                    OperationKind::Or
                } else {
                    OperationKind::And
                };
                let mut out: Vec<Simplified> = Vec::new();
                for child in children {
                    match self.simplify(*child) {
                        Simplified::All => {
                            // identity for And, dominant for Or
                            if or {
                                return Simplified::All;
                            }
                        }
                        Simplified::Op(k, grand) if k == effective => out.extend(grand),
                        other => out.push(other),
                    }
                }
                match out.len() {
                    0 => Simplified::All,
                    1 => out.remove(0),
                    _ => Simplified::Op(effective, out),
                }
            }
        }
    }

    /// Iterates over every comparison leaf in the tree.
    pub fn comparisons(&self) -> impl Iterator<Item = &Comparison> {
        self.nodes.iter().filter_map(|entry| match &entry.node {
            Node::Comparison(comparison) => Some(comparison),
            _ => None,
        })
    }

    fn kind_of(&self, id: NodeId) -> OperationKind {
        match self.node(id) {
            Node::Operation { kind, .. } => *kind,
            _ => OperationKind::Null,
        }
    }

    fn check_target(&self, target: NodeId) -> QuarryResult<()> {
        if target >= self.nodes.len() {
            return Err(QuarryError::new(
                &format!("No node {} in condition tree", target),
                ErrorKind::InternalError,
            ));
        }
        match self.node(target) {
            Node::Operation { .. } => Ok(()),
            other => {
                log::error!("Cannot append to non-operation node {:?}", other);
                Err(QuarryError::new(
                    "Operands can only be appended to operation nodes",
                    ErrorKind::ConditionError,
                ))
            }
        }
    }

    fn check_arity(&self, target: NodeId) -> QuarryResult<()> {
        if let Node::Operation {
            kind: OperationKind::Not,
            children,
        } = self.node(target)
        {
            if !children.is_empty() {
                return Err(QuarryError::new(
                    "A NOT operation accepts exactly one operand",
                    ErrorKind::ConditionError,
                ));
            }
        }
        Ok(())
    }

    fn promote_null(&mut self, target: NodeId) {
        if let Node::Operation { kind, .. } = &mut self.nodes[target].node {
            if *kind == OperationKind::Null {
                *kind = OperationKind::And;
            }
        }
    }

    fn push_node(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeEntry {
            node,
            parent: Some(parent),
        });
        if let Node::Operation { children, .. } = &mut self.nodes[parent].node {
            children.push(id);
        }
        id
    }

    // Deep-copies `src` of `tree` under `parent` in self.
    fn graft(&mut self, parent: NodeId, tree: &ConditionTree, src: NodeId) -> NodeId {
        match tree.node(src) {
            Node::Operation { kind, children } => {
                let id = self.push_node(
                    parent,
                    Node::Operation {
                        kind: *kind,
                        children: Vec::new(),
                    },
                );
                for child in children {
                    self.graft(id, tree, *child);
                }
                id
            }
            leaf => self.push_node(parent, leaf.clone()),
        }
    }

    fn equal_subtree_child(
        &self,
        target: NodeId,
        tree: &ConditionTree,
        src: NodeId,
    ) -> Option<NodeId> {
        self.children(target)
            .iter()
            .copied()
            .find(|c| self.subtree_eq(*c, tree, src))
    }

    // Structural equality of two subtrees across arenas.
    fn subtree_eq(&self, a: NodeId, other: &ConditionTree, b: NodeId) -> bool {
        match (self.node(a), other.node(b)) {
            (
                Node::Operation {
                    kind: ka,
                    children: ca,
                },
                Node::Operation {
                    kind: kb,
                    children: cb,
                },
            ) => {
                ka == kb
                    && ca.len() == cb.len()
                    && ca
                        .iter()
                        .zip(cb)
                        .all(|(x, y)| self.subtree_eq(*x, other, *y))
            }
            (x, y) => x == y,
        }
    }

    fn fmt_node(&self, id: NodeId, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node(id) {
            Node::Comparison(comparison) => write!(f, "{}", comparison),
            Node::Literal(text, value) => {
                if text.contains('?') {
                    write!(f, "{}", text.replacen('?', &value.to_string(), 1))
                } else {
                    write!(f, "{} = {}", text, value)
                }
            }
            Node::Operation { kind, children } => match kind {
                OperationKind::Not => {
                    write!(f, "NOT(")?;
                    if let Some(child) = children.first() {
                        self.fmt_node(*child, f)?;
                    }
                    write!(f, ")")
                }
                _ => {
                    let rendered: Vec<String> = children
                        .iter()
                        .map(|c| {
                            let inner = NodeDisplay { tree: self, id: *c };
                            match self.node(*c) {
                                Node::Operation { kind: ck, .. }
                                    if *ck != OperationKind::Not && ck != kind =>
                                {
                                    format!("({})", inner)
                                }
                                _ => inner.to_string(),
                            }
                        })
                        .collect();
                    write!(f, "{}", rendered.iter().join(&format!(" {} ", kind.operator())))
                }
            },
        }
    }
}

/// Intermediate shape used by [ConditionTree::minimized].
enum Simplified {
    /// No constraint at all (the match-all identity).
    All,
    Leaf(Node),
    Op(OperationKind, Vec<Simplified>),
}

fn emit(out: &mut ConditionTree, parent: NodeId, simplified: Simplified) {
    match simplified {
        Simplified::All => {
            // only survives under Not, where it encodes match-none
            out.push_node(
                parent,
                Node::Operation {
                    kind: OperationKind::Null,
                    children: Vec::new(),
                },
            );
        }
        Simplified::Leaf(node) => {
            out.push_node(parent, node);
        }
        Simplified::Op(kind, children) => {
            let id = out.push_node(
                parent,
                Node::Operation {
                    kind,
                    children: Vec::new(),
                },
            );
            for child in children {
                emit(out, id, child);
            }
        }
    }
}

struct NodeDisplay<'a> {
    tree: &'a ConditionTree,
    id: NodeId,
}

impl Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.tree.fmt_node(self.id, f)
    }
}

impl Display for ConditionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_node(self.root, f)
    }
}
