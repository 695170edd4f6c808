//! Path resolver: `a -> b -> ... -> terminal` reference chains
//!
//! The terminal segment is resolved first (existence or kind-dispatched
//! comparison, with its kind lookup inlined), then each earlier segment wraps
//! the result as "entities whose reference tag points into the inner set",
//! right to left. The outermost layer becomes `e.id IN (...)`.

use crate::ast::Path;
use crate::compiler::{CompileContext, Condition};
use crate::error::{Error, Result};
use crate::sql::{Predicate, TagSubquery};

pub(crate) fn resolve(
    path: &Path,
    condition: Option<Condition<'_>>,
    ctx: &mut CompileContext<'_>,
) -> Result<Predicate> {
    let max = ctx.options().max_path_depth;
    if path.depth() > max {
        return Err(Error::PathTooDeep {
            depth: path.depth(),
            max,
        });
    }

    let Some((terminal, links)) = path.segments.split_last() else {
        return Err(Error::InvalidIdentifier("<empty path>".to_string()));
    };

    let alias = ctx.next_alias();
    let mut subquery = match condition {
        None => TagSubquery::Exists {
            alias,
            tag: terminal.clone(),
        },
        Some(condition) => TagSubquery::Dispatch {
            tag: terminal.clone(),
            lookup: ctx.kind_lookup(alias, terminal),
            dispatch: condition.dispatch(alias),
        },
    };

    for segment in links.iter().rev() {
        let alias = ctx.next_alias();
        // Comparison chains walk the hierarchy of every segment
        if condition.is_some() {
            ctx.add_hierarchy(alias, segment);
        }
        subquery = TagSubquery::Follow {
            alias,
            tag: segment.clone(),
            inner: Box::new(subquery),
        };
    }

    Ok(Predicate::EntityIn(subquery))
}
