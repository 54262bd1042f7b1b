//! Display hierarchy of a template graph.
//!
//! The hierarchy is for people, not for execution: a dependency shared by
//! several templates appears under each of them.

use serde::Serialize;
use std::collections::HashSet;

use crate::template::TemplateGraph;

/// One node of the display tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    /// Template token
    pub token: String,
    /// Resource type, absent for external tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Item title, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether the token lives outside the graph
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    /// Whether expansion stopped because the token is already on the path
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub circular: bool,
    /// Dependencies
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    fn label(&self) -> String {
        let mut label = self.token.clone();
        if let Some(title) = &self.title {
            label.push_str(&format!(" \"{title}\""));
        }
        if let Some(resource_type) = &self.resource_type {
            label.push_str(&format!(" ({resource_type})"));
        }
        if self.external {
            label.push_str(" [external]");
        }
        if self.circular {
            label.push_str(" (circular reference)");
        }
        label
    }
}

/// Build the display tree: one top-level node per template that no other
/// template depends on, each expanded through its dependency tokens.
#[must_use]
pub fn hierarchy(graph: &TemplateGraph) -> Vec<HierarchyNode> {
    let depended_on: HashSet<&str> = graph
        .iter()
        .flat_map(|(_, template)| template.dependency_tokens.iter().map(String::as_str))
        .collect();

    let mut path = Vec::new();
    graph
        .tokens()
        .filter(|token| !depended_on.contains(token))
        .map(|token| expand(graph, token, &mut path))
        .collect()
}

fn expand<'g>(graph: &'g TemplateGraph, token: &'g str, path: &mut Vec<&'g str>) -> HierarchyNode {
    let Some(template) = graph.get(token) else {
        return HierarchyNode {
            token: token.to_string(),
            resource_type: None,
            title: None,
            external: true,
            circular: false,
            children: Vec::new(),
        };
    };

    let mut node = HierarchyNode {
        token: token.to_string(),
        resource_type: Some(template.resource_type.to_string()),
        title: template.title().map(str::to_string),
        external: false,
        circular: path.contains(&token),
        children: Vec::new(),
    };
    if node.circular {
        return node;
    }

    path.push(token);
    node.children = template.dependency_tokens.iter().map(|dep| expand(graph, dep, path)).collect();
    path.pop();
    node
}

/// Render the hierarchy as an indented tree.
#[must_use]
pub fn render_tree(nodes: &[HierarchyNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        out.push_str(&node.label());
        out.push('\n');
        render_children(&node.children, "", &mut out);
    }
    out
}

fn render_children(children: &[HierarchyNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let connector = if last { "└── " } else { "├── " };
        out.push_str(&format!("{prefix}{connector}{}\n", child.label()));
        let child_prefix = if last { format!("{prefix}    ") } else { format!("{prefix}│   ") };
        render_children(&child.children, &child_prefix, out);
    }
}
