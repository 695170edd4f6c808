//! Name resolver: a single, non-chained tag reference
//!
//! A bare name becomes an `e.id IN (...)` existence test and needs no kind
//! resolution. A comparison needs to know which value column to test, so it
//! registers a kind lookup on the base query and emits a correlated
//! `EXISTS` whose `CASE` dispatches on the tag's ancestors.

use crate::compiler::{CompileContext, Condition};
use crate::sql::{Predicate, TagSubquery};

/// `tag` (or, wrapped in `NOT` by the caller, `not tag`)
pub(crate) fn resolve_has(tag: &str, ctx: &mut CompileContext<'_>) -> Predicate {
    let alias = ctx.next_alias();
    Predicate::EntityIn(TagSubquery::Exists {
        alias,
        tag: tag.to_string(),
    })
}

/// `tag <op> value` or `tag in (...)`
pub(crate) fn resolve_condition(
    tag: &str,
    condition: Condition<'_>,
    ctx: &mut CompileContext<'_>,
) -> Predicate {
    let alias = ctx.next_alias();
    let lookup = ctx.kind_lookup(alias, tag);
    ctx.add_base_lookup(lookup);
    Predicate::Matches {
        alias,
        tag: tag.to_string(),
        dispatch: condition.dispatch(alias),
    }
}
