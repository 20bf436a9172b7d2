//! `{$r part…}`: regular patterns over list elements.
//!
//! Parts are matched left to right by a backtracking search. `$rest` accepts
//! whatever remains. `quantifier * sub` matches a run of elements that each
//! match `sub`, trying the shortest allowed run first, so the first viable
//! split wins. Any other part matches exactly one element.
//!
//! Element matches are tests only: they run against an empty environment and
//! their bindings are dropped.

use crate::ast::value::Value;
use crate::ast::Node;
use crate::patterns::{MatchEnv, PatternMatcher};

/// Inclusive run-length bounds; `max == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: usize,
    pub max: Option<usize>,
}

impl Bounds {
    fn exact(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }
}

/// Reads a quantifier: a count, `maybe`/`some`/`any` (with or without `$`),
/// `lo..hi`, or any of those in parentheses.
///
/// ```rust
/// use makrell_meta::ast::{bin, ident, num, round};
/// use makrell_meta::patterns::regular::{quant_bounds, Bounds};
/// assert_eq!(quant_bounds(&ident("$some")), Some(Bounds { min: 1, max: None }));
/// assert_eq!(
///     quant_bounds(&round(vec![bin(num("2"), "..", num("3"))])),
///     Some(Bounds { min: 2, max: Some(3) })
/// );
/// assert_eq!(quant_bounds(&ident("lots")), None);
/// ```
pub fn quant_bounds(q: &Node) -> Option<Bounds> {
    match q {
        Node::Number { .. } => count(q).map(Bounds::exact),
        Node::Identifier { value, .. } => match value.strip_prefix('$').unwrap_or(value) {
            "maybe" => Some(Bounds { min: 0, max: Some(1) }),
            "some" => Some(Bounds { min: 1, max: None }),
            "any" => Some(Bounds { min: 0, max: None }),
            _ => None,
        },
        Node::Round { nodes, .. } if nodes.len() == 1 => quant_bounds(&nodes[0]),
        Node::Binop {
            left, op, right, ..
        } if op == ".." => Some(Bounds {
            min: count(left)?,
            max: Some(count(right)?),
        }),
        _ => None,
    }
}

fn count(node: &Node) -> Option<usize> {
    let n = node.number_value()?;
    if !n.is_finite() {
        return None;
    }
    Some(if n <= 0.0 { 0 } else { n.ceil() as usize })
}

pub(crate) fn match_regular(
    matcher: &PatternMatcher,
    value: &Value,
    parts: &[Node],
    env: MatchEnv,
) -> Option<MatchEnv> {
    let items = value.as_list()?;
    let search = Search {
        matcher,
        items,
        parts,
    };
    search.step(0, 0).then_some(env)
}

struct Search<'a> {
    matcher: &'a PatternMatcher,
    items: &'a [Value],
    parts: &'a [Node],
}

impl Search<'_> {
    fn matches(&self, item: &Value, part: &Node) -> bool {
        self.matcher
            .match_with_env(item, part, MatchEnv::new())
            .is_some()
    }

    fn step(&self, vi: usize, pi: usize) -> bool {
        let Some(part) = self.parts.get(pi) else {
            return vi == self.items.len();
        };
        if part.is_ident("$rest") {
            return true;
        }

        if let Node::Binop {
            left, op, right, ..
        } = part
        {
            if op == "*" {
                let Some(bounds) = quant_bounds(left) else {
                    return false;
                };
                let remaining = self.items.len() - vi;
                let max_try = bounds.max.map_or(remaining, |max| max.min(remaining));
                // The run grows one element at a time; once an element fails,
                // no longer run can succeed either.
                let mut matched = 0;
                for count in bounds.min..=max_try {
                    while matched < count {
                        if !self.matches(&self.items[vi + matched], right) {
                            return false;
                        }
                        matched += 1;
                    }
                    if self.step(vi + count, pi + 1) {
                        return true;
                    }
                }
                return false;
            }
        }

        match self.items.get(vi) {
            Some(item) if self.matches(item, part) => self.step(vi + 1, pi + 1),
            _ => false,
        }
    }
}
