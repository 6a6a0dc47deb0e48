use serde_json::Value;

use super::{
    BinaryOperator, Clause, ClauseSequence, Expr, ListQuantifier, MapEntry, NodePattern, OrderItem,
    Pattern, Projection, ProjectionItem, RelationshipPattern, SubqueryKind,
};
use crate::graph_catalog::Direction;

/// Render a clause-builder value as Cypher text
pub trait ToCypher {
    fn to_cypher(&self) -> String;
}

/// Quote an identifier with backticks unless it is a plain name
pub fn escape_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn block(keyword: &str, body: &ClauseSequence) -> String {
    format!("{} {{\n{}\n}}", keyword, indent(&body.to_cypher()))
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // JSON string escaping is a valid Cypher string literal
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let entries = map
                .iter()
                .map(|(k, v)| format!("{}: {}", escape_identifier(k), literal(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{ {} }}", entries)
        }
    }
}

impl ToCypher for BinaryOperator {
    fn to_cypher(&self) -> String {
        match self {
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::Contains => "CONTAINS",
            BinaryOperator::StartsWith => "STARTS WITH",
            BinaryOperator::EndsWith => "ENDS WITH",
            BinaryOperator::In => "IN",
            BinaryOperator::RegexMatch => "=~",
            BinaryOperator::Addition => "+",
            BinaryOperator::Subtraction => "-",
        }
        .to_string()
    }
}

/// Operands that would bind differently without parentheses
fn operand(expr: &Expr) -> String {
    match expr {
        Expr::Binary(..) | Expr::Not(_) | Expr::IsNull(_) | Expr::IsNotNull(_) => {
            format!("({})", expr.to_cypher())
        }
        _ => expr.to_cypher(),
    }
}

fn joined(items: &[Expr], connective: &str) -> String {
    if items.len() == 1 {
        return items[0].to_cypher();
    }
    format!(
        "({})",
        items
            .iter()
            .map(ToCypher::to_cypher)
            .collect::<Vec<_>>()
            .join(connective)
    )
}

impl ToCypher for Expr {
    fn to_cypher(&self) -> String {
        match self {
            Expr::Literal(value) => literal(value),
            Expr::Param(param) => format!("${}", param.name),
            Expr::Variable(variable) => escape_identifier(variable.name()),
            Expr::Property(inner, name) => {
                format!("{}.{}", operand(inner), escape_identifier(name))
            }
            Expr::Index(inner, index) => format!("{}[{}]", operand(inner), index.to_cypher()),
            Expr::Binary(left, op, right) => {
                format!("{} {} {}", operand(left), op.to_cypher(), operand(right))
            }
            Expr::And(items) if items.is_empty() => "true".to_string(),
            Expr::And(items) => joined(items, " AND "),
            Expr::Or(items) if items.is_empty() => "false".to_string(),
            Expr::Or(items) => joined(items, " OR "),
            Expr::Not(inner) => format!("NOT ({})", inner.to_cypher()),
            Expr::IsNull(inner) => format!("{} IS NULL", operand(inner)),
            Expr::IsNotNull(inner) => format!("{} IS NOT NULL", operand(inner)),
            Expr::HasLabels(variable, labels) => {
                let mut rendered = escape_identifier(variable.name());
                for label in labels {
                    rendered.push(':');
                    rendered.push_str(&escape_identifier(label));
                }
                rendered
            }
            Expr::Case(arms) if arms.is_empty() => "null".to_string(),
            Expr::Case(arms) => {
                let mut rendered = String::from("CASE");
                for (condition, value) in arms {
                    rendered.push_str(&format!(
                        " WHEN {} THEN {}",
                        condition.to_cypher(),
                        value.to_cypher()
                    ));
                }
                rendered.push_str(" END");
                rendered
            }
            Expr::Function(name, args) => format!(
                "{}({})",
                name,
                args.iter().map(ToCypher::to_cypher).collect::<Vec<_>>().join(", ")
            ),
            Expr::List(items) => format!(
                "[{}]",
                items.iter().map(ToCypher::to_cypher).collect::<Vec<_>>().join(", ")
            ),
            Expr::Map(entries) => {
                if entries.is_empty() {
                    return "{}".to_string();
                }
                let rendered = entries
                    .iter()
                    .map(|(key, value)| {
                        format!("{}: {}", escape_identifier(key), value.to_cypher())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {} }}", rendered)
            }
            Expr::MapProjection(variable, entries) => {
                let name = escape_identifier(variable.name());
                if entries.is_empty() {
                    return format!("{} {{ }}", name);
                }
                let rendered = entries
                    .iter()
                    .map(|entry| match entry {
                        MapEntry::Property(property) => format!(".{}", escape_identifier(property)),
                        MapEntry::Keyed(key, value) => {
                            format!("{}: {}", escape_identifier(key), value.to_cypher())
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} {{ {} }}", name, rendered)
            }
            Expr::Quantified {
                quantifier,
                variable,
                list,
                predicate,
            } => {
                let function = match quantifier {
                    ListQuantifier::Any => "any",
                    ListQuantifier::All => "all",
                    ListQuantifier::None => "none",
                    ListQuantifier::Single => "single",
                };
                format!(
                    "{}({} IN {} WHERE {})",
                    function,
                    escape_identifier(variable.name()),
                    list.to_cypher(),
                    predicate.to_cypher()
                )
            }
            Expr::Subquery(kind, body) => {
                let keyword = match kind {
                    SubqueryKind::Exists => "EXISTS",
                    SubqueryKind::Count => "COUNT",
                    SubqueryKind::Collect => "COLLECT",
                };
                block(keyword, body)
            }
        }
    }
}

impl ToCypher for NodePattern {
    fn to_cypher(&self) -> String {
        let mut rendered = String::from("(");
        if let Some(variable) = &self.variable {
            rendered.push_str(&escape_identifier(variable.name()));
        }
        for label in &self.labels {
            rendered.push(':');
            rendered.push_str(&escape_identifier(label));
        }
        rendered.push(')');
        rendered
    }
}

impl ToCypher for RelationshipPattern {
    fn to_cypher(&self) -> String {
        let mut inner = String::new();
        if let Some(variable) = &self.variable {
            inner.push_str(&escape_identifier(variable.name()));
        }
        if !self.types.is_empty() {
            inner.push(':');
            inner.push_str(
                &self
                    .types
                    .iter()
                    .map(|t| escape_identifier(t))
                    .collect::<Vec<_>>()
                    .join("|"),
            );
        }
        match self.direction {
            Direction::Outgoing => format!("-[{}]->", inner),
            Direction::Incoming => format!("<-[{}]-", inner),
        }
    }
}

impl ToCypher for Pattern {
    fn to_cypher(&self) -> String {
        let mut rendered = self.start.to_cypher();
        for (relationship, node) in &self.hops {
            rendered.push_str(&relationship.to_cypher());
            rendered.push_str(&node.to_cypher());
        }
        rendered
    }
}

impl ToCypher for ProjectionItem {
    fn to_cypher(&self) -> String {
        match (&self.alias, &self.expr) {
            (Some(alias), Expr::Variable(variable)) if alias == variable => {
                escape_identifier(variable.name())
            }
            (Some(alias), expr) => {
                format!("{} AS {}", expr.to_cypher(), escape_identifier(alias.name()))
            }
            (None, expr) => expr.to_cypher(),
        }
    }
}

impl ToCypher for OrderItem {
    fn to_cypher(&self) -> String {
        format!(
            "{} {}",
            self.expr.to_cypher(),
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}

impl ToCypher for Projection {
    /// Renders the projection body and its ORDER BY / SKIP / LIMIT lines,
    /// without the leading WITH or RETURN keyword.
    fn to_cypher(&self) -> String {
        let mut parts = Vec::new();
        if self.star {
            parts.push("*".to_string());
        }
        parts.extend(self.items.iter().map(ToCypher::to_cypher));

        let mut rendered = String::new();
        if self.distinct {
            rendered.push_str("DISTINCT ");
        }
        rendered.push_str(&parts.join(", "));

        if !self.order_by.is_empty() {
            rendered.push_str("\nORDER BY ");
            rendered.push_str(
                &self
                    .order_by
                    .iter()
                    .map(ToCypher::to_cypher)
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        if let Some(skip) = &self.skip {
            rendered.push_str(&format!("\nSKIP {}", skip.to_cypher()));
        }
        if let Some(limit) = &self.limit {
            rendered.push_str(&format!("\nLIMIT {}", limit.to_cypher()));
        }
        rendered
    }
}

impl ToCypher for Clause {
    fn to_cypher(&self) -> String {
        match self {
            Clause::Match {
                optional,
                pattern,
                predicate,
            } => {
                let mut rendered = format!(
                    "{}MATCH {}",
                    if *optional { "OPTIONAL " } else { "" },
                    pattern.to_cypher()
                );
                if let Some(predicate) = predicate {
                    rendered.push_str(&format!("\nWHERE {}", predicate.to_cypher()));
                }
                rendered
            }
            Clause::With {
                projection,
                predicate,
            } => {
                let mut rendered = format!("WITH {}", projection.to_cypher());
                if let Some(predicate) = predicate {
                    rendered.push_str(&format!("\nWHERE {}", predicate.to_cypher()));
                }
                rendered
            }
            Clause::Unwind { expr, alias } => {
                format!("UNWIND {} AS {}", expr.to_cypher(), escape_identifier(alias.name()))
            }
            Clause::Call(body) => block("CALL", body),
            Clause::UnionAll(branches) => branches
                .iter()
                .map(ToCypher::to_cypher)
                .collect::<Vec<_>>()
                .join("\nUNION ALL\n"),
            Clause::Return(projection) => format!("RETURN {}", projection.to_cypher()),
            Clause::Raw(statement) => statement.trim().to_string(),
        }
    }
}

impl ToCypher for ClauseSequence {
    fn to_cypher(&self) -> String {
        self.clauses()
            .iter()
            .map(ToCypher::to_cypher)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
