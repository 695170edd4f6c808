//! AST compiler
//!
//! Walks an [`Expr`] and produces the predicate tree plus the CTE prologue
//! and base-level kind lookups it depends on. All state lives in a
//! [`CompileContext`] that is created per compilation and threaded through
//! the recursion by mutable borrow, so concurrent compilations share nothing.
//!
//! Alias numbering: every tag reference draws the next number from the
//! context's counter. A name reference takes one number; a path takes one
//! per segment, terminal first. The CTE, lookup and where-clause fragments
//! of one reference all carry the same number.

use crate::ast::{CmpOp, Expr, Literal, Path};
use crate::error::{Error, Result};
use crate::kind::{kinds_for_list, kinds_for_literal};
use crate::sql::{
    CaseDispatch, Comparison, HierarchyCte, KindLookup, KindSource, Predicate, SqlValue,
};
use crate::{name, path};

/// Default upper bound on reference chain length
pub const DEFAULT_MAX_PATH_DEPTH: usize = 16;

/// Compiler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub kind_source: KindSource,
    /// Longest accepted `a->b->...` chain, counted in segments
    pub max_path_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            kind_source: KindSource::Hierarchy,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
        }
    }
}

impl CompileOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_path_depth == 0 {
            return Err(Error::InvalidOptions(
                "max_path_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The comparison half of a `cmp` or `inCmp` term
#[derive(Debug, Clone, Copy)]
pub enum Condition<'a> {
    Compare { op: CmpOp, value: &'a Literal },
    In(&'a [Literal]),
}

impl Condition<'_> {
    /// Kind-dispatching `CASE` for the reference numbered `alias`
    pub fn dispatch(&self, alias: usize) -> CaseDispatch {
        match self {
            Condition::Compare { op, value } => CaseDispatch {
                alias,
                kinds: kinds_for_literal(value).to_vec(),
                comparison: Comparison::Binary {
                    op: *op,
                    value: SqlValue::from(*value),
                },
            },
            Condition::In(values) => CaseDispatch {
                alias,
                kinds: kinds_for_list(values).to_vec(),
                comparison: Comparison::In(values.iter().map(SqlValue::from).collect()),
            },
        }
    }
}

/// Per-compilation state
#[derive(Debug)]
pub struct CompileContext<'o> {
    options: &'o CompileOptions,
    alias_counter: usize,
    ctes: Vec<HierarchyCte>,
    lookups: Vec<KindLookup>,
}

impl<'o> CompileContext<'o> {
    pub fn new(options: &'o CompileOptions) -> Self {
        Self {
            options,
            alias_counter: 0,
            ctes: Vec::new(),
            lookups: Vec::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        self.options
    }

    /// Advance the counter and return the new alias number (first is 1)
    pub fn next_alias(&mut self) -> usize {
        self.alias_counter += 1;
        self.alias_counter
    }

    pub fn alias_count(&self) -> usize {
        self.alias_counter
    }

    /// Register a hierarchy walk for `tag` under `alias`. No-op when kinds
    /// come from the parents view.
    pub fn add_hierarchy(&mut self, alias: usize, tag: &str) {
        if self.options.kind_source == KindSource::Hierarchy {
            self.ctes.push(HierarchyCte {
                alias,
                tag: tag.to_string(),
            });
        }
    }

    /// Kind lookup for `tag`, registering the CTE it reads from if needed
    pub fn kind_lookup(&mut self, alias: usize, tag: &str) -> KindLookup {
        self.add_hierarchy(alias, tag);
        KindLookup {
            alias,
            tag: tag.to_string(),
            source: self.options.kind_source,
        }
    }

    /// Attach a lookup to the base entity query's FROM list
    pub fn add_base_lookup(&mut self, lookup: KindLookup) {
        self.lookups.push(lookup);
    }
}

/// Output of compiling one filter expression
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub ctes: Vec<HierarchyCte>,
    pub lookups: Vec<KindLookup>,
    pub predicate: Predicate,
    pub alias_count: usize,
}

/// Compile a whole expression with fresh state
pub fn compile_expr(expr: &Expr, options: &CompileOptions) -> Result<CompiledFilter> {
    options.validate()?;
    let mut ctx = CompileContext::new(options);
    let predicate = compile(expr, &mut ctx)?;

    tracing::trace!(
        aliases = ctx.alias_counter,
        ctes = ctx.ctes.len(),
        "Compiled filter expression"
    );

    Ok(CompiledFilter {
        ctes: ctx.ctes,
        lookups: ctx.lookups,
        predicate,
        alias_count: ctx.alias_counter,
    })
}

/// Compile one node
pub fn compile(expr: &Expr, ctx: &mut CompileContext<'_>) -> Result<Predicate> {
    match expr {
        Expr::Or { operands } => Ok(Predicate::Or(compile_all(operands, ctx)?)),
        Expr::And { operands } => Ok(Predicate::And(compile_all(operands, ctx)?)),
        Expr::Paren { inner } => Ok(Predicate::Paren(Box::new(compile(inner, ctx)?))),
        Expr::Has { path } => reference(path, None, ctx),
        Expr::Missing { path } => Ok(Predicate::Not(Box::new(reference(path, None, ctx)?))),
        Expr::Cmp { path, op, value } => {
            reference(path, Some(Condition::Compare { op: *op, value }), ctx)
        }
        Expr::InCmp { path, values } => reference(path, Some(Condition::In(values)), ctx),
    }
}

fn compile_all(operands: &[Expr], ctx: &mut CompileContext<'_>) -> Result<Vec<Predicate>> {
    operands.iter().map(|operand| compile(operand, ctx)).collect()
}

fn reference(
    path: &Path,
    condition: Option<Condition<'_>>,
    ctx: &mut CompileContext<'_>,
) -> Result<Predicate> {
    if path.is_chain() {
        return path::resolve(path, condition, ctx);
    }
    let tag = path.terminal();
    Ok(match condition {
        None => name::resolve_has(tag, ctx),
        Some(condition) => name::resolve_condition(tag, condition, ctx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compiled(filter: &str) -> CompiledFilter {
        compile_expr(&parse(filter).unwrap(), &CompileOptions::default()).unwrap()
    }

    #[test]
    fn counter_is_shared_across_operands() {
        let out = compiled("a and b == 1 or c->d == 2");
        // a=1, b=2, d=3, c=4
        assert_eq!(out.alias_count, 4);
        let aliases: Vec<usize> = out.ctes.iter().map(|c| c.alias).collect();
        assert_eq!(aliases, vec![2, 3, 4]);
        assert_eq!(out.lookups.len(), 1);
        assert_eq!(out.lookups[0].alias, 2);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let options = CompileOptions {
            max_path_depth: 0,
            ..CompileOptions::default()
        };
        let err = compile_expr(&parse("a").unwrap(), &options).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn parents_view_emits_no_ctes() {
        let options = CompileOptions {
            kind_source: KindSource::ParentsView,
            ..CompileOptions::default()
        };
        let out = compile_expr(&parse("a == 1 and b->c == 2").unwrap(), &options).unwrap();
        assert!(out.ctes.is_empty());
        assert_eq!(out.alias_count, 3);
    }
}
