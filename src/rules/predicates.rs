use super::{Rule, RuleContext, RuleId, RuleInfo, RuleVerdict, info_for};
use crate::{
    ast::{Kind, Literal, Node},
    error::AppResult
};

/// REGEXP function inside the top-level `WHERE`
pub struct RegexpInWhere;

impl Rule for RegexpInWhere {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::RegexpInWhere)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let triggered = top_where(ctx.root)
            .is_some_and(|clause| clause.find_by(|n: &Node| n.kind.is_regexp()).is_some());
        Ok(RuleVerdict::flag(RuleId::RegexpInWhere, triggered))
    }
}

/// Pattern match written before a more selective predicate
///
/// Predicates are compared by their position in a pre-order flattening of
/// the top-level `WHERE` that stays out of subqueries. A leading `1 = 1` or
/// `TRUE` guard is ignored.
pub struct LikeBeforeMoreSelective;

impl Rule for LikeBeforeMoreSelective {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::LikeBeforeMoreSelective)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let Some(condition) = top_where(ctx.root).and_then(|w| w.children.first()) else {
            return Ok(RuleVerdict::clear(RuleId::LikeBeforeMoreSelective));
        };
        let guard = leading_guard(condition);
        let flat: Vec<&Node> = condition
            .find_all_scoped_by(|_| true)
            .into_iter()
            .filter(|n| !guard.is_some_and(|g| std::ptr::eq(*n, g)))
            .collect();
        let first_pattern = flat.iter().position(|n| n.kind.is_pattern_match());
        let first_selective = flat.iter().position(|n| is_selective(n));
        let triggered = match (first_pattern, first_selective) {
            (Some(pattern), Some(selective)) => pattern < selective,
            _ => false
        };
        Ok(RuleVerdict::flag(
            RuleId::LikeBeforeMoreSelective,
            triggered
        ))
    }
}

fn top_where(root: &Node) -> Option<&Node> {
    root.top_select()?.child(Kind::Where)
}

/// The leftmost conjunct when it is a trivial `1 = 1` or `TRUE`.
fn leading_guard(condition: &Node) -> Option<&Node> {
    let mut node = condition;
    while node.is(Kind::And) {
        node = node.children.first()?;
    }
    let trivial = match node.kind {
        Kind::Literal => node.literal() == Some(&Literal::Boolean(true)),
        Kind::Eq => {
            node.children.len() == 2
                && node
                    .children
                    .iter()
                    .all(|c| c.literal().and_then(Literal::as_count) == Some(1))
        }
        _ => false
    };
    trivial.then_some(node)
}

/// Comparison or membership test that does not wrap a pattern match.
fn is_selective(node: &Node) -> bool {
    matches!(
        node.kind,
        Kind::Eq | Kind::Gt | Kind::GtEq | Kind::Lt | Kind::LtEq | Kind::In
    ) && node
        .find_all_scoped_by(|n: &Node| n.kind.is_pattern_match())
        .is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::triggered;

    #[test]
    fn test_regexp_in_where() {
        let sql = "SELECT a FROM `p.d.t` WHERE REGEXP_CONTAINS(a, r'x')";
        assert!(triggered(&RegexpInWhere, sql));
    }

    #[test]
    fn test_regexp_outside_where() {
        assert!(!triggered(
            &RegexpInWhere,
            "SELECT REGEXP_EXTRACT(a, r'x') FROM t WHERE a = 'v'"
        ));
        assert!(!triggered(&RegexpInWhere, "SELECT a FROM t"));
    }

    #[test]
    fn test_regexp_replace_in_where() {
        let sql = "SELECT a FROM t WHERE REGEXP_REPLACE(a, 'x', '') = 'y'";
        assert!(triggered(&RegexpInWhere, sql));
    }

    #[test]
    fn test_like_before_equality() {
        let sql = "SELECT a FROM t WHERE a LIKE '%x%' AND id = 5";
        assert!(triggered(&LikeBeforeMoreSelective, sql));
    }

    #[test]
    fn test_equality_before_like() {
        let sql = "SELECT a FROM t WHERE id = 5 AND a LIKE '%x%'";
        assert!(!triggered(&LikeBeforeMoreSelective, sql));
    }

    #[test]
    fn test_like_alone() {
        let sql = "SELECT a FROM t WHERE a LIKE '%x%'";
        assert!(!triggered(&LikeBeforeMoreSelective, sql));
    }

    #[test]
    fn test_leading_guard_skipped() {
        let one = "SELECT a FROM t WHERE 1 = 1 AND a LIKE '%x%' AND id > 5";
        let truth = "SELECT a FROM t WHERE TRUE AND a LIKE '%x%' AND id IN (1, 2)";
        assert!(triggered(&LikeBeforeMoreSelective, one));
        assert!(triggered(&LikeBeforeMoreSelective, truth));
    }

    #[test]
    fn test_regexp_counts_as_pattern() {
        let sql = "SELECT a FROM t WHERE REGEXP_CONTAINS(a, 'x') AND b <= 3";
        assert!(triggered(&LikeBeforeMoreSelective, sql));
    }

    #[test]
    fn test_comparison_wrapping_pattern_is_not_selective() {
        let sql = "SELECT a FROM t WHERE REGEXP_CONTAINS(a, 'x') = TRUE AND b = 3";
        assert!(triggered(&LikeBeforeMoreSelective, sql));
    }
}
