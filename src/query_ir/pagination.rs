//! Page windows: offset or cursor requests resolved against entity and
//! global page-size limits into parameterised `SKIP` / `LIMIT`.

use crate::{
    clause_builder::Expr,
    config::TranslatorConfig,
    graph_catalog::{CompositeType, GraphSchema, QueryLimit},
    query_ir::{
        cursor::Cursor,
        errors::{QueryIrError, QueryIrResult},
        plan_ctx::PlanCtx,
        sort::SortSpec,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationSpec {
    Offset {
        skip: Option<u64>,
        take: Option<u64>,
    },
    Cursor {
        first: Option<u64>,
        after: Option<String>,
    },
}

impl PaginationSpec {
    pub fn offset(skip: Option<u64>, take: Option<u64>) -> Self {
        PaginationSpec::Offset { skip, take }
    }

    pub fn cursor(first: Option<u64>, after: Option<&str>) -> Self {
        PaginationSpec::Cursor {
            first,
            after: after.map(str::to_string),
        }
    }
}

/// Resolved SKIP / LIMIT expressions
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Window {
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl Window {
    pub fn is_unbounded(&self) -> bool {
        self.skip.is_none() && self.limit.is_none()
    }
}

/// Page-size limits for reads of `target`: the entity's own limits, each
/// falling back to the configured global one. Abstract targets use the
/// global limits.
pub(crate) fn effective_limit(
    schema: &GraphSchema,
    config: &TranslatorConfig,
    target: &str,
) -> QueryLimit {
    let own = match schema.composite(target) {
        Ok(CompositeType::Entity(entity)) => entity.limit.unwrap_or_default(),
        _ => QueryLimit::default(),
    };
    QueryLimit {
        default: own.default.or(config.default_limit),
        max: own.max.or(config.max_limit),
    }
}

/// Offset of the first row after `cursor`, for a read ordered by `sort`
fn resume_after(cursor: &str, sort: &[SortSpec]) -> QueryIrResult<u64> {
    let invalid = |reason: String| QueryIrError::InvalidCursor {
        cursor: cursor.to_string(),
        reason,
    };
    let decoded = Cursor::decode(cursor)?;
    if !decoded.sort.is_empty() && decoded.sort.len() != sort.len() {
        return Err(invalid(format!(
            "carries {} sort value(s) for an ordering on {} key(s)",
            decoded.sort.len(),
            sort.len()
        )));
    }
    decoded
        .offset
        .checked_add(1)
        .ok_or_else(|| invalid("offset out of range".to_string()))
}

/// Resolve a pagination request into parameterised SKIP and LIMIT
pub(crate) fn resolve_window(
    ctx: &PlanCtx,
    target: &str,
    sort: &[SortSpec],
    pagination: Option<&PaginationSpec>,
) -> QueryIrResult<Window> {
    let (skip, requested) = match pagination {
        None => (0, None),
        Some(PaginationSpec::Offset { skip, take }) => (skip.unwrap_or(0), *take),
        Some(PaginationSpec::Cursor { first, after }) => {
            let skip = match after {
                Some(cursor) => resume_after(cursor, sort)?,
                None => 0,
            };
            (skip, *first)
        }
    };

    let limits = effective_limit(ctx.schema(), ctx.config(), target);
    let limit = match (requested.or(limits.default), limits.max) {
        (Some(take), Some(max)) if take > max => {
            log::warn!(
                "Requested page size {} for {} exceeds the maximum of {}, clamping",
                take,
                target,
                max
            );
            Some(max)
        }
        (limit, _) => limit,
    };

    Ok(Window {
        skip: (skip > 0).then(|| ctx.param(skip)),
        limit: limit.map(|limit| ctx.param(limit)),
    })
}
