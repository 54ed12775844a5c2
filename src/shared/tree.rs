//! Phylogenies used to drive the mutation process.
//!
//! Trees are only consumed here: parsed from Newick, rescaled per region and
//! written back to Newick for the external mutation process.
use crate::shared::gene::Region;
use anyhow::{anyhow, Context, Result};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Parser)]
#[grammar = "shared/newick.pest"]
struct NewickParser;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: Option<String>,
    // length of the edge leading to this node
    pub length: f64,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
}

/// Rooted tree stored as a flat arena, node 0 is not necessarily the root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    /// Parse a single Newick tree (terminated by ';')
    ///```
    /// use vdjsim::shared::tree::Tree;
    /// let t = Tree::parse("((t1:0.1,t2:0.3)n1:0.2,t3:0.4):0.1;").unwrap();
    /// assert_eq!(t.leaf_names(), vec!["t1", "t2", "t3"]);
    /// assert!((t.mean_leaf_height() - 0.5).abs() < 1e-12);
    ///```
    pub fn parse(newick: &str) -> Result<Tree> {
        let mut pairs = NewickParser::parse(Rule::newick, newick.trim())
            .map_err(|e| anyhow!("Invalid newick tree {}:\n{}", newick, e))?;
        let top = pairs
            .next()
            .ok_or(anyhow!("Empty newick tree {}", newick))?;
        let subtree = top
            .into_inner()
            .find(|p| p.as_rule() == Rule::subtree)
            .ok_or(anyhow!("Empty newick tree {}", newick))?;

        let mut tree = Tree {
            nodes: Vec::new(),
            root: 0,
        };
        tree.root = tree.add_pair(subtree, None)?;
        Ok(tree)
    }

    fn add_pair(&mut self, pair: Pair<Rule>, parent: Option<usize>) -> Result<usize> {
        match pair.as_rule() {
            Rule::subtree => {
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or(anyhow!("Empty subtree in newick tree"))?;
                self.add_pair(inner, parent)
            }
            Rule::leaf | Rule::internal => {
                let idx = self.nodes.len();
                self.nodes.push(Node {
                    name: None,
                    length: 0.,
                    children: Vec::new(),
                    parent,
                });
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::subtree => {
                            let child = self.add_pair(inner, Some(idx))?;
                            self.nodes[idx].children.push(child);
                        }
                        Rule::NAME => {
                            self.nodes[idx].name =
                                Some(inner.as_str().trim_matches('\'').to_string());
                        }
                        Rule::LENGTH => {
                            let val = inner.as_str();
                            self.nodes[idx].length = val
                                .parse::<f64>()
                                .with_context(|| format!("Invalid branch length {}", val))?;
                        }
                        _ => {}
                    }
                }
                Ok(idx)
            }
            r => Err(anyhow!("Unexpected rule {:?} in newick tree", r)),
        }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    /// Leaves, in the order they appear in the Newick string
    fn leaves(&self) -> Vec<usize> {
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.children.is_empty() {
                result.push(idx);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        result
    }

    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .map(|idx| self.nodes[idx].name.clone().unwrap_or_default())
            .collect()
    }

    pub fn n_leaves(&self) -> usize {
        self.leaves().len()
    }

    /// Distance from above the root (root edge included) to the node
    fn height(&self, mut idx: usize) -> f64 {
        let mut h = self.nodes[idx].length;
        while let Some(p) = self.nodes[idx].parent {
            h += self.nodes[p].length;
            idx = p;
        }
        h
    }

    /// Mean distance from the top of the root edge to the leaves
    pub fn mean_leaf_height(&self) -> f64 {
        let leaves = self.leaves();
        leaves.iter().map(|&l| self.height(l)).sum::<f64>() / leaves.len() as f64
    }

    /// Multiply every edge length (root edge included) by `factor`
    pub fn scale_edges(&mut self, factor: f64) {
        for n in self.nodes.iter_mut() {
            n.length *= factor;
        }
    }

    /// Linearly rescale the tree so that its mean leaf height becomes `target`
    pub fn rescale(&mut self, target: f64) -> Result<()> {
        if !target.is_finite() || target < 0. {
            return Err(anyhow!("Invalid target height {} for tree rescaling", target));
        }
        let current = self.mean_leaf_height();
        if current == 0. {
            if target == 0. {
                return Ok(());
            }
            return Err(anyhow!(
                "Can't rescale a tree of height 0 to height {}",
                target
            ));
        }
        self.scale_edges(target / current);
        Ok(())
    }

    /// Remove the names of the internal nodes (the mutation process would
    /// otherwise treat them as sequences)
    pub fn strip_internal_labels(&mut self) {
        for n in self.nodes.iter_mut() {
            if !n.children.is_empty() {
                n.name = None;
            }
        }
    }

    /// New tree whose root has two children: this tree and a leaf `name`
    /// hanging at the mean leaf height. The new root edge has length 0.
    pub fn with_anchor_leaf(&self, name: &str) -> Tree {
        let height = self.mean_leaf_height();
        let mut nodes = self.nodes.clone();
        let new_root = nodes.len();
        let anchor = new_root + 1;
        nodes[self.root].parent = Some(new_root);
        nodes.push(Node {
            name: None,
            length: 0.,
            children: vec![self.root, anchor],
            parent: None,
        });
        nodes.push(Node {
            name: Some(name.to_string()),
            length: height,
            children: Vec::new(),
            parent: Some(new_root),
        });
        Tree {
            nodes,
            root: new_root,
        }
    }

    pub fn to_newick(&self) -> String {
        let mut s = String::new();
        self.write_node(self.root, &mut s);
        s.push(';');
        s
    }

    fn write_node(&self, idx: usize, s: &mut String) {
        let node = &self.nodes[idx];
        if !node.children.is_empty() {
            s.push('(');
            for (i, &c) in node.children.iter().enumerate() {
                if i > 0 {
                    s.push(',');
                }
                self.write_node(c, s);
            }
            s.push(')');
        }
        if let Some(name) = &node.name {
            s.push_str(name);
        }
        s.push_str(&format!(":{}", node.length));
    }
}

/// A tree together with the relative mutation depth of each region
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub tree: Tree,
    pub ratios: HashMap<Region, f64>,
}

impl TreeRecord {
    /// Parse a line `<newick>;v:0.98,d:1.8,j:0.87`
    ///```
    /// use vdjsim::shared::tree::TreeRecord;
    /// use vdjsim::shared::gene::Region;
    /// let r = TreeRecord::parse_line("(t1:1,t2:1):0;v:0.98,d:1.8,j:0.87").unwrap();
    /// assert_eq!(r.tree.n_leaves(), 2);
    /// assert_eq!(r.ratio(Region::D), 1.8);
    ///```
    pub fn parse_line(line: &str) -> Result<TreeRecord> {
        let (newick, ratio_str) = line
            .trim()
            .rsplit_once(';')
            .ok_or(anyhow!("Tree record without ';' separator: {}", line))?;
        let tree = Tree::parse(&format!("{};", newick))?;

        let mut ratios = HashMap::new();
        for field in ratio_str.split(',') {
            let (region, value) = field
                .split_once(':')
                .ok_or(anyhow!("Invalid regional ratio '{}' in tree record {}", field, line))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid regional ratio '{}' in tree record", field))?;
            if value < 0. || !value.is_finite() {
                return Err(anyhow!("Negative regional ratio '{}' in tree record", field));
            }
            ratios.insert(Region::from_letter(region.trim())?, value);
        }
        for region in Region::ALL {
            if !ratios.contains_key(&region) {
                return Err(anyhow!(
                    "Missing ratio for region {} in tree record {}",
                    region,
                    line
                ));
            }
        }
        Ok(TreeRecord { tree, ratios })
    }

    pub fn ratio(&self, region: Region) -> f64 {
        self.ratios.get(&region).copied().unwrap_or(1.)
    }
}
