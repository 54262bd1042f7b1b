//! Dependency-respecting build order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{Result, SolutionError};
use crate::template::TemplateGraph;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the current DFS path.
    Gray,
    /// Finished; already in the output.
    Black,
}

/// Tokens ordered so every dependency precedes its dependents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildOrder {
    tokens: Vec<String>,
}

impl BuildOrder {
    /// Tokens in creation order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens in creation order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Position of `token` in the order.
    #[must_use]
    pub fn position(&self, token: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the order is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl From<Vec<String>> for BuildOrder {
    fn from(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

/// Topologically sort `graph`: dependencies first, dependents after.
///
/// Uses a three-color depth-first search with post-order output. Dependency
/// tokens absent from the graph are external and already satisfied. A token
/// found on the current path again is a cycle, reported as
/// [`SolutionError::CircularDependency`] with the path that closes it.
///
/// Independent subgraphs come out in token order, so the result is
/// deterministic for a given graph.
pub fn sort(graph: &TemplateGraph) -> Result<BuildOrder> {
    let mut colors: HashMap<&str, Color> = graph.tokens().map(|t| (t, Color::White)).collect();
    let mut output: Vec<String> = Vec::with_capacity(graph.len());
    let mut path: Vec<&str> = Vec::new();

    for token in graph.tokens() {
        if colors.get(token) == Some(&Color::White) {
            visit(graph, token, &mut colors, &mut path, &mut output)?;
        }
    }

    Ok(BuildOrder { tokens: output })
}

fn visit<'g>(
    graph: &'g TemplateGraph,
    token: &'g str,
    colors: &mut HashMap<&'g str, Color>,
    path: &mut Vec<&'g str>,
    output: &mut Vec<String>,
) -> Result<()> {
    colors.insert(token, Color::Gray);
    path.push(token);

    if let Some(template) = graph.get(token) {
        for dep in &template.dependency_tokens {
            match colors.get(dep.as_str()) {
                Some(Color::White) => visit(graph, dep, colors, path, output)?,
                Some(Color::Gray) => {
                    let start = path.iter().position(|t| *t == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<&str> = path[start..].to_vec();
                    cycle.push(dep);
                    return Err(SolutionError::CircularDependency {
                        token: dep.clone(),
                        cycle: cycle.join(" → "),
                    });
                }
                // finished, or external to the graph
                Some(Color::Black) | None => {}
            }
        }
    }

    path.pop();
    colors.insert(token, Color::Black);
    output.push(token.to_string());
    Ok(())
}
