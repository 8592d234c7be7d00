use indexmap::IndexMap;

use super::{Evidence, Rule, RuleContext, RuleId, RuleInfo, RuleVerdict, info_for};
use crate::{
    ast::{Kind, Node},
    error::AppResult
};

/// `SELECT *` over a qualified table
pub struct SelectStar;

impl Rule for SelectStar {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::SelectStar)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let mut evidence = Vec::new();
        for select in ctx.root.find_all(Kind::Select) {
            let has_star = select
                .child(Kind::Projection)
                .is_some_and(|p| p.child(Kind::Star).is_some());
            if !has_star || select.contains_scoped(Kind::Count) {
                continue;
            }
            let source = select
                .child(Kind::From)
                .and_then(|from| from.child(Kind::Table))
                .and_then(Node::table)
                .filter(|table| table.is_qualified());
            if let Some(table) = source {
                evidence.push(Evidence::table(table.qualified_name()));
            }
        }
        Ok(RuleVerdict::from_evidence(RuleId::SelectStar, evidence))
    }
}

/// `IN (SELECT ...)` whose subquery neither deduplicates nor groups
pub struct SemiJoinWithoutAggregation;

impl Rule for SemiJoinWithoutAggregation {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::SemiJoinWithoutAggregation)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let triggered = ctx
            .root
            .find_all(Kind::Where)
            .into_iter()
            .flat_map(|clause| clause.find_all(Kind::In))
            .filter_map(|in_node| in_node.child(Kind::Query))
            .any(|subquery| !subquery.contains(Kind::Distinct) && !subquery.contains(Kind::Group));
        Ok(RuleVerdict::flag(RuleId::SemiJoinWithoutAggregation, triggered))
    }
}

/// Top-level `ORDER BY` without `LIMIT`
pub struct OrderWithoutLimit;

impl Rule for OrderWithoutLimit {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::OrderWithoutLimit)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let triggered = ctx
            .root
            .top_query()
            .is_some_and(|q| q.child(Kind::Order).is_some() && q.child(Kind::Limit).is_none());
        Ok(RuleVerdict::flag(RuleId::OrderWithoutLimit, triggered))
    }
}

/// A CTE with a `FROM` of its own read as a source two or more times
pub struct MultipleCteReference;

impl Rule for MultipleCteReference {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::MultipleCteReference)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let mut counts: IndexMap<String, (&str, usize)> = ctx
            .root
            .find_all(Kind::Cte)
            .into_iter()
            .filter(|cte| cte.contains(Kind::From))
            .filter_map(Node::name)
            .map(|name| (name.to_ascii_lowercase(), (name, 0)))
            .collect();
        if counts.is_empty() {
            return Ok(RuleVerdict::clear(RuleId::MultipleCteReference));
        }
        for clause in ctx
            .root
            .find_all_by(|n: &Node| matches!(n.kind, Kind::From | Kind::Join))
        {
            for table in clause.children.iter().filter_map(Node::table) {
                if table.is_qualified() {
                    continue;
                }
                let key = table.name.to_ascii_lowercase();
                if let Some((_, count)) = counts.get_mut(key.as_str()) {
                    *count += 1;
                }
            }
        }
        let evidence = counts
            .values()
            .filter(|(_, count)| *count >= 2)
            .map(|(name, _)| Evidence::cte(*name))
            .collect();
        Ok(RuleVerdict::from_evidence(
            RuleId::MultipleCteReference,
            evidence
        ))
    }
}
