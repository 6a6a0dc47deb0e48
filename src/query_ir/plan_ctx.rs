//! Traversal context for lowering.
//!
//! [`PlanCtx`] is threaded by value through every lowering function. It holds:
//! - The graph variable currently bound and the schema type it is bound to
//! - A fresh-name allocator whose counters are scoped to the root lowering call
//! - The nesting depth below the root operation
//! - The read-only schema and translator configuration
//!
//! Descending into a nested selection clones the context with a new bound
//! variable; the parent is never mutated. All clones share the same name
//! counters, so sibling branches can never derive the same variable name.
//!
//! ```text
//! MATCH (this:Movie)                     depth 0, bound `this`
//! CALL { WITH this
//!        MATCH (this)<-[this0]-(this1)   depth 1, bound `this1`
//!        CALL { WITH this1 ... }         depth 2
//! }
//! ```

use serde_json::Value;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::{
    clause_builder::{Expr, Param, Variable},
    config::TranslatorConfig,
    graph_catalog::GraphSchema,
    query_ir::errors::{QueryIrError, QueryIrResult},
};

pub const ROOT_VARIABLE: &str = "this";

#[derive(Debug, Default)]
struct Counters {
    variables: Cell<usize>,
    params: Cell<usize>,
}

/// Allocates variable and parameter names unique within one lowering call
#[derive(Debug, Clone, Default)]
pub struct NameAllocator(Rc<Counters>);

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(cell: &Cell<usize>) -> usize {
        let n = cell.get();
        cell.set(n + 1);
        n
    }

    pub fn fresh(&self, prefix: &str) -> Variable {
        Variable::new(format!("{}{}", prefix, Self::next(&self.0.variables)))
    }

    pub fn fresh_param(&self, value: Value) -> Param {
        Param {
            name: format!("param{}", Self::next(&self.0.params)),
            value,
        }
    }
}

#[derive(Clone)]
pub struct PlanCtx<'a> {
    schema: &'a GraphSchema,
    config: &'a TranslatorConfig,
    names: NameAllocator,
    bound: Variable,
    bound_type: String,
    depth: usize,
}

impl<'a> PlanCtx<'a> {
    /// Context for a root operation over `target`, bound to `this`
    pub fn root(schema: &'a GraphSchema, config: &'a TranslatorConfig, target: &str) -> Self {
        PlanCtx {
            schema,
            config,
            names: NameAllocator::new(),
            bound: Variable::new(ROOT_VARIABLE),
            bound_type: target.to_string(),
            depth: 0,
        }
    }

    pub fn schema(&self) -> &'a GraphSchema {
        self.schema
    }

    pub fn config(&self) -> &'a TranslatorConfig {
        self.config
    }

    pub fn bound(&self) -> &Variable {
        &self.bound
    }

    pub fn bound_type(&self) -> &str {
        &self.bound_type
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// A variable name not used anywhere else in the query
    pub fn fresh(&self, prefix: &str) -> Variable {
        self.names.fresh(prefix)
    }

    /// A parameter reference carrying `value`
    pub fn param(&self, value: impl Into<Value>) -> Expr {
        Expr::Param(self.names.fresh_param(value.into()))
    }

    /// Child context one selection level deeper
    pub fn descend(&self, variable: Variable, type_name: &str) -> QueryIrResult<PlanCtx<'a>> {
        let depth = self.depth + 1;
        if depth > self.config.max_nesting_depth {
            return Err(QueryIrError::NestingTooDeep {
                max_depth: self.config.max_nesting_depth,
            });
        }
        Ok(PlanCtx {
            bound: variable,
            bound_type: type_name.to_string(),
            depth,
            ..self.clone()
        })
    }

    /// Same depth, different binding: a polymorphism branch or an edge
    /// variable viewed through its relationship-property type
    pub fn rebind(&self, variable: Variable, type_name: &str) -> PlanCtx<'a> {
        PlanCtx {
            bound: variable,
            bound_type: type_name.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for PlanCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanCtx")
            .field("bound", &self.bound)
            .field("bound_type", &self.bound_type)
            .field("depth", &self.depth)
            .finish()
    }
}
