//! Folds the postfix token stream into a [`Node`] tree (spec.md §4.3).
//!
//! This is a plain postfix/RPN evaluation: atoms push a leaf, `AND`/`OR`
//! pop two operands and merge them (splicing same-occurrence `BoolNode`
//! children for associativity), and `NOT` pops one operand and wraps it in
//! `must_not`. A chained bare-atom `NOT` (`collapses: false`, stacked by the
//! lexer once per `!`) always wraps, so `!!!flutterbat` stays
//! triple-nested. A group-closing `NOT` (`collapses: true`) is
//! double-negation aware: wrapping an operand that's already a sole
//! `must_not` rewrites it to `must` instead of nesting a third level, so
//! `!(!x)` collapses to `must: [x]` the way a negated group does.

use chrono::{DateTime, Utc};

use crate::analyzer;
use crate::error::{CompileResult, ParseError};
use crate::field::FieldMeta;
use crate::leaf::{BoolNode, LeafQuery, Node, Occur};
use crate::lexer::Token;

/// Folds `tokens` into a single query tree, analyzing each atom against
/// `meta` and routing unprefixed atoms to `default_field`. An empty token
/// stream yields [`LeafQuery::MatchNone`].
pub fn fold(
    tokens: Vec<Token>,
    meta: &FieldMeta,
    default_field: &str,
    now: DateTime<Utc>,
) -> CompileResult<Node> {
    let mut stack: Vec<Node> = Vec::new();

    for token in tokens {
        match token {
            Token::Atom { text, boost, fuzz } => {
                let leaf = analyzer::analyze(&text, boost, fuzz, meta, default_field, now)?;
                stack.push(Node::Leaf(leaf));
            }
            Token::Not { collapses } => {
                let top = stack.pop().ok_or(ParseError::MissingOperand)?;
                tracing::trace!(collapses, "applying NOT");
                stack.push(wrap_not(top, collapses));
            }
            Token::And => {
                let b = stack.pop().ok_or(ParseError::MissingOperand)?;
                let a = stack.pop().ok_or(ParseError::MissingOperand)?;
                tracing::trace!("merging AND");
                stack.push(merge(a, b, Occur::Must));
            }
            Token::Or => {
                let b = stack.pop().ok_or(ParseError::MissingOperand)?;
                let a = stack.pop().ok_or(ParseError::MissingOperand)?;
                tracing::trace!("merging OR");
                stack.push(merge(a, b, Occur::Should));
            }
        }
    }

    match stack.len() {
        0 => Ok(Node::Leaf(LeafQuery::MatchNone)),
        1 => Ok(stack.pop().expect("length checked above")),
        _ => Err(ParseError::MissingOperator.into()),
    }
}

/// Wraps `node` in `must_not`. When `collapses` (a group-closing negation),
/// an operand that's already a sole `must_not` is rewritten to `must`
/// instead of gaining a third nesting level — the double-negation collapse
/// spec.md §4.3 requires for negated groups.
fn wrap_not(node: Node, collapses: bool) -> Node {
    if collapses {
        if let Node::Bool(bn) = &node {
            if let Some((Occur::MustNot, kids)) = bn.sole_occupied() {
                return Node::Bool(BoolNode::must(kids.to_vec()));
            }
        }
    }
    Node::Bool(BoolNode::must_not(vec![node]))
}

/// Combines `a` and `b` under `target` (must for AND, should for OR),
/// splicing in either operand's children when it's already a `BoolNode`
/// whose sole occurrence is the same `target` — associativity flattening,
/// so `a AND b AND c` produces one three-child `must`, not nested pairs.
fn merge(a: Node, b: Node, target: Occur) -> Node {
    let mut children = Vec::with_capacity(2);
    for operand in [a, b] {
        match &operand {
            Node::Bool(bn) => match bn.sole_occupied() {
                Some((occur, kids)) if occur == target => children.extend(kids.iter().cloned()),
                _ => children.push(operand),
            },
            Node::Leaf(_) => children.push(operand),
        }
    }
    Node::Bool(match target {
        Occur::Must => BoolNode::must(children),
        Occur::Should => BoolNode::should(children),
        Occur::MustNot => unreachable!("merge is only ever called for AND/OR"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use crate::lexer::lex;

    fn meta() -> FieldMeta {
        FieldMeta::builder()
            .field("author", FieldType::Literal)
            .field("default", FieldType::FullText)
            .build()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn compile_str(src: &str) -> Node {
        let tokens = lex(src).unwrap();
        fold(tokens, &meta(), "default", now()).unwrap()
    }

    #[test]
    fn empty_input_is_match_none() {
        assert_eq!(compile_str(""), Node::Leaf(LeafQuery::MatchNone));
    }

    #[test]
    fn chained_and_flattens_into_one_must() {
        let node = compile_str("a AND b AND c");
        match node {
            Node::Bool(bn) => assert_eq!(bn.must.len(), 3),
            other => panic!("expected bool/must, got {other:?}"),
        }
    }

    #[test]
    fn mixed_and_or_does_not_flatten_across_operators() {
        let node = compile_str("a AND b OR c");
        // (a AND b) OR c -> should:[bool{must:[a,b]}, c]
        match node {
            Node::Bool(bn) => {
                assert_eq!(bn.should.len(), 2);
                assert!(matches!(&bn.should[0], Node::Bool(inner) if inner.must.len() == 2));
            }
            other => panic!("expected bool/should, got {other:?}"),
        }
    }

    #[test]
    fn chained_bare_not_nests_without_collapsing() {
        let node = compile_str("!!!flutterbat");
        let Node::Bool(l1) = node else { panic!("expected bool") };
        assert_eq!(l1.must_not.len(), 1);
        let Node::Bool(l2) = &l1.must_not[0] else { panic!("expected nested bool") };
        assert_eq!(l2.must_not.len(), 1);
        let Node::Bool(l3) = &l2.must_not[0] else { panic!("expected nested bool") };
        assert_eq!(l3.must_not.len(), 1);
        assert!(matches!(l3.must_not[0], Node::Leaf(LeafQuery::Term { .. })));
    }

    #[test]
    fn negated_group_around_a_negated_bare_atom_collapses() {
        let node = compile_str("!(!flutterbat)");
        let Node::Bool(bn) = node else { panic!("expected bool") };
        assert_eq!(bn.must.len(), 1);
        assert!(matches!(bn.must[0], Node::Leaf(LeafQuery::Term { .. })));
    }

    #[test]
    fn double_negated_group_with_no_inner_negation_just_wraps_once() {
        let node = compile_str("!!!(flutterbat)");
        let Node::Bool(bn) = node else { panic!("expected bool") };
        assert_eq!(bn.must_not.len(), 1);
        assert!(matches!(bn.must_not[0], Node::Leaf(LeafQuery::Term { .. })));
    }

    #[test]
    fn missing_operand_is_an_error() {
        let tokens = vec![Token::And];
        assert!(fold(tokens, &meta(), "default", now()).is_err());
    }
}
