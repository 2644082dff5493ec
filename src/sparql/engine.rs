//! SPARQL algebra evaluation
//!
//! An explicit recursive walk over the spargebra algebra tree against
//! a `DatasetView`. Solutions are ordinary sorted maps from variable
//! name to term; blank nodes occurring in patterns act as
//! non-projectable variables keyed `_:label`, which cannot collide
//! with variable names.

use super::results::QueryResults;
use super::{SparqlError, SparqlResult};
use crate::rdf::{DatasetView, NamedNode, Triple};
use oxrdf::{
    Literal as OxLiteral, NamedNode as OxNamedNode, Subject as OxSubject, Term as OxTerm,
};
use rustc_hash::FxHashSet;
use spargebra::algebra::{Expression, Function, GraphPattern, OrderExpression};
use spargebra::term::{GroundTerm, NamedNodePattern, TermPattern, TriplePattern};
use spargebra::Query;
use std::cmp::Ordering;
use std::collections::BTreeMap;

const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
const NUMERIC_DATATYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#integer",
    "http://www.w3.org/2001/XMLSchema#decimal",
    "http://www.w3.org/2001/XMLSchema#double",
    "http://www.w3.org/2001/XMLSchema#float",
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
];

/// One solution mapping. Sorted keys keep iteration deterministic.
pub type Binding = BTreeMap<String, OxTerm>;

/// Graph the current pattern is matched against
#[derive(Debug, Clone)]
enum GraphScope {
    Default,
    Named(OxNamedNode),
}

/// Query evaluator over one dataset view
pub struct QueryEngine<'a> {
    view: &'a DatasetView<'a>,
}

impl<'a> QueryEngine<'a> {
    /// Create an engine bound to a view
    pub fn new(view: &'a DatasetView<'a>) -> Self {
        Self { view }
    }

    /// Evaluate a parsed query
    pub fn evaluate(&self, query: &Query) -> SparqlResult<QueryResults> {
        match query {
            Query::Select { pattern, .. } => {
                let solutions = self.eval_pattern(pattern, &GraphScope::Default)?;
                let variables = projected_variables(pattern)
                    .unwrap_or_else(|| collect_variables(&solutions));
                Ok(QueryResults::Solutions {
                    variables,
                    solutions,
                })
            }
            Query::Ask { pattern, .. } => {
                let solutions = self.eval_pattern(pattern, &GraphScope::Default)?;
                Ok(QueryResults::Boolean(!solutions.is_empty()))
            }
            Query::Construct {
                template, pattern, ..
            } => {
                let solutions = self.eval_pattern(pattern, &GraphScope::Default)?;
                Ok(QueryResults::Graph(self.instantiate(template, &solutions)))
            }
            Query::Describe { pattern, .. } => {
                let solutions = self.eval_pattern(pattern, &GraphScope::Default)?;
                Ok(QueryResults::Graph(self.describe(&solutions)))
            }
        }
    }

    /// Evaluate a pattern and report only whether any solution exists
    pub fn ask(&self, pattern: &GraphPattern) -> SparqlResult<bool> {
        Ok(!self.eval_pattern(pattern, &GraphScope::Default)?.is_empty())
    }

    /// Evaluate a graph pattern, producing raw solutions
    pub fn solutions(&self, pattern: &GraphPattern) -> SparqlResult<Vec<Binding>> {
        self.eval_pattern(pattern, &GraphScope::Default)
    }

    fn eval_pattern(
        &self,
        pattern: &GraphPattern,
        scope: &GraphScope,
    ) -> SparqlResult<Vec<Binding>> {
        match pattern {
            GraphPattern::Bgp { patterns } => self.eval_bgp(patterns, scope),
            GraphPattern::Join { left, right } => {
                let left = self.eval_pattern(left, scope)?;
                let right = self.eval_pattern(right, scope)?;
                Ok(join(&left, &right))
            }
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => {
                let left_solutions = self.eval_pattern(left, scope)?;
                let right_solutions = self.eval_pattern(right, scope)?;
                let mut out = Vec::new();
                for l in &left_solutions {
                    let mut extended = Vec::new();
                    for r in &right_solutions {
                        if let Some(merged) = merge(l, r) {
                            let keep = match expression {
                                Some(e) => self
                                    .eval_expr(e, &merged, scope)
                                    .as_ref()
                                    .and_then(ebv)
                                    .unwrap_or(false),
                                None => true,
                            };
                            if keep {
                                extended.push(merged);
                            }
                        }
                    }
                    if extended.is_empty() {
                        out.push(l.clone());
                    } else {
                        out.append(&mut extended);
                    }
                }
                Ok(out)
            }
            GraphPattern::Filter { expr, inner } => {
                let solutions = self.eval_pattern(inner, scope)?;
                Ok(solutions
                    .into_iter()
                    .filter(|b| {
                        self.eval_expr(expr, b, scope)
                            .as_ref()
                            .and_then(ebv)
                            .unwrap_or(false)
                    })
                    .collect())
            }
            GraphPattern::Union { left, right } => {
                let mut solutions = self.eval_pattern(left, scope)?;
                solutions.extend(self.eval_pattern(right, scope)?);
                Ok(solutions)
            }
            GraphPattern::Graph { name, inner } => match name {
                NamedNodePattern::NamedNode(n) => {
                    self.eval_pattern(inner, &GraphScope::Named(n.clone()))
                }
                NamedNodePattern::Variable(v) => {
                    let mut out = Vec::new();
                    for graph in self.view.named_graph_names() {
                        let ox: OxNamedNode = graph.clone().into();
                        let solutions =
                            self.eval_pattern(inner, &GraphScope::Named(ox.clone()))?;
                        for mut b in solutions {
                            if bind(&mut b, v.as_str(), &OxTerm::NamedNode(ox.clone())) {
                                out.push(b);
                            }
                        }
                    }
                    Ok(out)
                }
            },
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => {
                let solutions = self.eval_pattern(inner, scope)?;
                Ok(solutions
                    .into_iter()
                    .map(|mut b| {
                        if let Some(term) = self.eval_expr(expression, &b, scope) {
                            b.insert(variable.as_str().to_string(), term);
                        }
                        b
                    })
                    .collect())
            }
            GraphPattern::Minus { left, right } => {
                let left_solutions = self.eval_pattern(left, scope)?;
                let right_solutions = self.eval_pattern(right, scope)?;
                Ok(left_solutions
                    .into_iter()
                    .filter(|l| {
                        !right_solutions.iter().any(|r| {
                            let shared = l.keys().any(|k| r.contains_key(k));
                            shared && merge(l, r).is_some()
                        })
                    })
                    .collect())
            }
            GraphPattern::Values {
                variables,
                bindings,
            } => {
                let mut rows = Vec::new();
                for row in bindings {
                    let mut b = Binding::new();
                    for (variable, value) in variables.iter().zip(row) {
                        if let Some(term) = value {
                            b.insert(variable.as_str().to_string(), ground_to_term(term));
                        }
                    }
                    rows.push(b);
                }
                Ok(rows)
            }
            GraphPattern::OrderBy { inner, expression } => {
                let mut solutions = self.eval_pattern(inner, scope)?;
                solutions.sort_by(|a, b| {
                    for order in expression {
                        let (expr, desc) = match order {
                            OrderExpression::Asc(e) => (e, false),
                            OrderExpression::Desc(e) => (e, true),
                        };
                        let ta = self.eval_expr(expr, a, scope);
                        let tb = self.eval_expr(expr, b, scope);
                        let mut cmp = term_cmp(ta.as_ref(), tb.as_ref());
                        if desc {
                            cmp = cmp.reverse();
                        }
                        if cmp != Ordering::Equal {
                            return cmp;
                        }
                    }
                    Ordering::Equal
                });
                Ok(solutions)
            }
            GraphPattern::Project { inner, variables } => {
                let solutions = self.eval_pattern(inner, scope)?;
                Ok(solutions
                    .into_iter()
                    .map(|b| {
                        variables
                            .iter()
                            .filter_map(|v| {
                                b.get(v.as_str())
                                    .map(|t| (v.as_str().to_string(), t.clone()))
                            })
                            .collect()
                    })
                    .collect())
            }
            GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } => {
                let solutions = self.eval_pattern(inner, scope)?;
                let mut seen = FxHashSet::default();
                Ok(solutions
                    .into_iter()
                    .filter(|b| seen.insert(binding_key(b)))
                    .collect())
            }
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => {
                let solutions = self.eval_pattern(inner, scope)?;
                let iter = solutions.into_iter().skip(*start);
                Ok(match length {
                    Some(l) => iter.take(*l).collect(),
                    None => iter.collect(),
                })
            }
            other => Err(SparqlError::Unsupported(format!(
                "graph pattern not supported: {}",
                pattern_name(other)
            ))),
        }
    }

    fn eval_bgp(
        &self,
        patterns: &[TriplePattern],
        scope: &GraphScope,
    ) -> SparqlResult<Vec<Binding>> {
        let triples = self.scope_triples(scope);
        let mut solutions = vec![Binding::new()];
        for pattern in patterns {
            let mut next = Vec::new();
            for solution in &solutions {
                for (s, p, o) in &triples {
                    let mut b = solution.clone();
                    if match_term(&pattern.subject, &subject_term(s), &mut b)
                        && match_named(&pattern.predicate, p, &mut b)
                        && match_term(&pattern.object, o, &mut b)
                    {
                        next.push(b);
                    }
                }
            }
            solutions = next;
            if solutions.is_empty() {
                break;
            }
        }
        Ok(solutions)
    }

    fn scope_triples(&self, scope: &GraphScope) -> Vec<(OxSubject, OxNamedNode, OxTerm)> {
        let triples = match scope {
            GraphScope::Default => self.view.default_graph_triples(),
            GraphScope::Named(n) => {
                // failures here mean the IRI is malformed, which oxrdf
                // already rejected upstream
                match NamedNode::new(n.as_str()) {
                    Ok(graph) => self.view.graph_triples(&graph),
                    Err(_) => Vec::new(),
                }
            }
        };
        triples
            .into_iter()
            .map(|t| (t.subject.into(), t.predicate.into(), t.object.into()))
            .collect()
    }

    fn instantiate(&self, template: &[TriplePattern], solutions: &[Binding]) -> Vec<Triple> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for (index, solution) in solutions.iter().enumerate() {
            for pattern in template {
                let subject = instantiate_term(&pattern.subject, solution, index);
                let predicate = instantiate_named(&pattern.predicate, solution);
                let object = instantiate_term(&pattern.object, solution, index);
                if let (Some(s), Some(p), Some(o)) = (subject, predicate, object) {
                    if let Some(triple) = to_wrapper_triple(s, p, o) {
                        if seen.insert(triple.clone()) {
                            out.push(triple);
                        }
                    }
                }
            }
        }
        out
    }

    fn describe(&self, solutions: &[Binding]) -> Vec<Triple> {
        let mut nodes = FxHashSet::default();
        for solution in solutions {
            for term in solution.values() {
                if let OxTerm::NamedNode(n) = term {
                    nodes.insert(n.clone());
                }
            }
        }

        let mut pool = self.view.default_graph_triples();
        for graph in self.view.named_graph_names() {
            pool.extend(self.view.graph_triples(&graph));
        }

        let mut seen = FxHashSet::default();
        pool.into_iter()
            .filter(|t| match &t.subject {
                crate::rdf::Subject::NamedNode(n) => nodes
                    .iter()
                    .any(|described| described.as_str() == n.as_str()),
                crate::rdf::Subject::BlankNode(_) => false,
            })
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    fn eval_expr(&self, expr: &Expression, b: &Binding, scope: &GraphScope) -> Option<OxTerm> {
        match expr {
            Expression::NamedNode(n) => Some(OxTerm::NamedNode(n.clone())),
            Expression::Literal(l) => Some(OxTerm::Literal(l.clone())),
            Expression::Variable(v) => b.get(v.as_str()).cloned(),
            Expression::Or(l, r) => {
                let l = self.eval_expr(l, b, scope).as_ref().and_then(ebv);
                let r = self.eval_expr(r, b, scope).as_ref().and_then(ebv);
                match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Some(boolean(true)),
                    (Some(false), Some(false)) => Some(boolean(false)),
                    _ => None,
                }
            }
            Expression::And(l, r) => {
                let l = self.eval_expr(l, b, scope).as_ref().and_then(ebv);
                let r = self.eval_expr(r, b, scope).as_ref().and_then(ebv);
                match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Some(boolean(false)),
                    (Some(true), Some(true)) => Some(boolean(true)),
                    _ => None,
                }
            }
            Expression::Equal(l, r) => {
                let l = self.eval_expr(l, b, scope)?;
                let r = self.eval_expr(r, b, scope)?;
                Some(boolean(terms_equal(&l, &r)))
            }
            Expression::SameTerm(l, r) => {
                let l = self.eval_expr(l, b, scope)?;
                let r = self.eval_expr(r, b, scope)?;
                Some(boolean(l == r))
            }
            Expression::Greater(l, r) => self.compare(l, r, b, scope, Ordering::Greater, false),
            Expression::GreaterOrEqual(l, r) => {
                self.compare(l, r, b, scope, Ordering::Greater, true)
            }
            Expression::Less(l, r) => self.compare(l, r, b, scope, Ordering::Less, false),
            Expression::LessOrEqual(l, r) => self.compare(l, r, b, scope, Ordering::Less, true),
            Expression::In(l, candidates) => {
                let l = self.eval_expr(l, b, scope)?;
                for candidate in candidates {
                    if let Some(term) = self.eval_expr(candidate, b, scope) {
                        if terms_equal(&l, &term) {
                            return Some(boolean(true));
                        }
                    }
                }
                Some(boolean(false))
            }
            Expression::Not(inner) => {
                let value = self.eval_expr(inner, b, scope).as_ref().and_then(ebv)?;
                Some(boolean(!value))
            }
            Expression::Bound(v) => Some(boolean(b.contains_key(v.as_str()))),
            Expression::Exists(pattern) => {
                let solutions = self.eval_pattern(pattern, scope).ok()?;
                Some(boolean(solutions.iter().any(|s| merge(b, s).is_some())))
            }
            Expression::If(cond, then, otherwise) => {
                let cond = self.eval_expr(cond, b, scope).as_ref().and_then(ebv)?;
                if cond {
                    self.eval_expr(then, b, scope)
                } else {
                    self.eval_expr(otherwise, b, scope)
                }
            }
            Expression::Coalesce(exprs) => exprs
                .iter()
                .find_map(|candidate| self.eval_expr(candidate, b, scope)),
            Expression::FunctionCall(function, args) => {
                self.eval_function(function, args, b, scope)
            }
            _ => None,
        }
    }

    fn compare(
        &self,
        l: &Expression,
        r: &Expression,
        b: &Binding,
        scope: &GraphScope,
        target: Ordering,
        or_equal: bool,
    ) -> Option<OxTerm> {
        let l = self.eval_expr(l, b, scope)?;
        let r = self.eval_expr(r, b, scope)?;
        let ordering = value_cmp(&l, &r)?;
        Some(boolean(
            ordering == target || (or_equal && ordering == Ordering::Equal),
        ))
    }

    fn eval_function(
        &self,
        function: &Function,
        args: &[Expression],
        b: &Binding,
        scope: &GraphScope,
    ) -> Option<OxTerm> {
        let arg = |i: usize| -> Option<OxTerm> { self.eval_expr(args.get(i)?, b, scope) };
        match function {
            Function::Str => {
                let term = arg(0)?;
                let value = match &term {
                    OxTerm::NamedNode(n) => n.as_str().to_string(),
                    OxTerm::Literal(l) => l.value().to_string(),
                    OxTerm::BlankNode(_) => return None,
                    #[allow(unreachable_patterns)]
                    _ => return None,
                };
                Some(OxTerm::Literal(OxLiteral::new_simple_literal(value)))
            }
            Function::IsIri => Some(boolean(matches!(arg(0)?, OxTerm::NamedNode(_)))),
            Function::IsBlank => Some(boolean(matches!(arg(0)?, OxTerm::BlankNode(_)))),
            Function::IsLiteral => Some(boolean(matches!(arg(0)?, OxTerm::Literal(_)))),
            Function::Contains => {
                let (haystack, needle) = (string_value(&arg(0)?)?, string_value(&arg(1)?)?);
                Some(boolean(haystack.contains(&needle)))
            }
            Function::StrStarts => {
                let (haystack, needle) = (string_value(&arg(0)?)?, string_value(&arg(1)?)?);
                Some(boolean(haystack.starts_with(&needle)))
            }
            Function::StrEnds => {
                let (haystack, needle) = (string_value(&arg(0)?)?, string_value(&arg(1)?)?);
                Some(boolean(haystack.ends_with(&needle)))
            }
            Function::UCase => Some(OxTerm::Literal(OxLiteral::new_simple_literal(
                string_value(&arg(0)?)?.to_uppercase(),
            ))),
            Function::LCase => Some(OxTerm::Literal(OxLiteral::new_simple_literal(
                string_value(&arg(0)?)?.to_lowercase(),
            ))),
            Function::StrLen => Some(OxTerm::Literal(OxLiteral::new_typed_literal(
                string_value(&arg(0)?)?.chars().count().to_string(),
                OxNamedNode::new("http://www.w3.org/2001/XMLSchema#integer").ok()?,
            ))),
            Function::Datatype => match arg(0)? {
                OxTerm::Literal(l) => Some(OxTerm::NamedNode(l.datatype().into_owned())),
                _ => None,
            },
            Function::Lang => match arg(0)? {
                OxTerm::Literal(l) => Some(OxTerm::Literal(OxLiteral::new_simple_literal(
                    l.language().unwrap_or(""),
                ))),
                _ => None,
            },
            _ => None,
        }
    }
}

fn string_value(term: &OxTerm) -> Option<String> {
    match term {
        OxTerm::Literal(l) => Some(l.value().to_string()),
        OxTerm::NamedNode(n) => Some(n.as_str().to_string()),
        _ => None,
    }
}

/// Bind or verify a solution entry. Returns false on clash.
fn bind(b: &mut Binding, key: &str, term: &OxTerm) -> bool {
    match b.get(key) {
        Some(existing) => existing == term,
        None => {
            b.insert(key.to_string(), term.clone());
            true
        }
    }
}

fn match_term(pattern: &TermPattern, term: &OxTerm, b: &mut Binding) -> bool {
    match pattern {
        TermPattern::NamedNode(n) => matches!(term, OxTerm::NamedNode(t) if t == n),
        TermPattern::Literal(l) => matches!(term, OxTerm::Literal(t) if t == l),
        TermPattern::BlankNode(bn) => bind(b, &format!("_:{}", bn.as_str()), term),
        TermPattern::Variable(v) => bind(b, v.as_str(), term),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

fn match_named(pattern: &NamedNodePattern, node: &OxNamedNode, b: &mut Binding) -> bool {
    match pattern {
        NamedNodePattern::NamedNode(n) => n == node,
        NamedNodePattern::Variable(v) => bind(b, v.as_str(), &OxTerm::NamedNode(node.clone())),
    }
}

fn subject_term(s: &OxSubject) -> OxTerm {
    match s {
        OxSubject::NamedNode(n) => OxTerm::NamedNode(n.clone()),
        OxSubject::BlankNode(b) => OxTerm::BlankNode(b.clone()),
        #[allow(unreachable_patterns)]
        _ => panic!("RDF-star triples not supported"),
    }
}

/// Merge two compatible bindings
fn merge(a: &Binding, b: &Binding) -> Option<Binding> {
    let mut merged = a.clone();
    for (k, v) in b {
        match merged.get(k) {
            Some(existing) if existing != v => return None,
            Some(_) => {}
            None => {
                merged.insert(k.clone(), v.clone());
            }
        }
    }
    Some(merged)
}

fn join(left: &[Binding], right: &[Binding]) -> Vec<Binding> {
    let mut out = Vec::new();
    for l in left {
        for r in right {
            if let Some(m) = merge(l, r) {
                out.push(m);
            }
        }
    }
    out
}

fn binding_key(b: &Binding) -> String {
    let mut key = String::new();
    for (k, v) in b {
        key.push_str(k);
        key.push('\u{1}');
        key.push_str(&v.to_string());
        key.push('\u{2}');
    }
    key
}

fn collect_variables(solutions: &[Binding]) -> Vec<String> {
    let mut variables = Vec::new();
    for solution in solutions {
        for key in solution.keys() {
            if !key.starts_with("_:") && !variables.contains(key) {
                variables.push(key.clone());
            }
        }
    }
    variables
}

fn projected_variables(pattern: &GraphPattern) -> Option<Vec<String>> {
    match pattern {
        GraphPattern::Project { variables, .. } => {
            Some(variables.iter().map(|v| v.as_str().to_string()).collect())
        }
        GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Slice { inner, .. } => projected_variables(inner),
        _ => None,
    }
}

fn ground_to_term(term: &GroundTerm) -> OxTerm {
    match term {
        GroundTerm::NamedNode(n) => OxTerm::NamedNode(n.clone()),
        GroundTerm::Literal(l) => OxTerm::Literal(l.clone()),
        #[allow(unreachable_patterns)]
        _ => panic!("RDF-star triples not supported"),
    }
}

fn instantiate_term(pattern: &TermPattern, b: &Binding, solution_index: usize) -> Option<OxTerm> {
    match pattern {
        TermPattern::NamedNode(n) => Some(OxTerm::NamedNode(n.clone())),
        TermPattern::Literal(l) => Some(OxTerm::Literal(l.clone())),
        TermPattern::BlankNode(bn) => {
            // fresh blank node per solution, stable across reruns
            let label = format!("c{}x{}", solution_index, bn.as_str());
            oxrdf::BlankNode::new(label).ok().map(OxTerm::BlankNode)
        }
        TermPattern::Variable(v) => b.get(v.as_str()).cloned(),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn instantiate_named(pattern: &NamedNodePattern, b: &Binding) -> Option<OxNamedNode> {
    match pattern {
        NamedNodePattern::NamedNode(n) => Some(n.clone()),
        NamedNodePattern::Variable(v) => match b.get(v.as_str()) {
            Some(OxTerm::NamedNode(n)) => Some(n.clone()),
            _ => None,
        },
    }
}

fn to_wrapper_triple(s: OxTerm, p: OxNamedNode, o: OxTerm) -> Option<Triple> {
    let subject: crate::rdf::Subject = match s {
        OxTerm::NamedNode(n) => crate::rdf::NamedNode::from(n).into(),
        OxTerm::BlankNode(b) => crate::rdf::BlankNode::from(b).into(),
        OxTerm::Literal(_) => return None,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(Triple::new(
        subject,
        crate::rdf::NamedNode::from(p),
        crate::rdf::Object::from(o),
    ))
}

fn boolean(value: bool) -> OxTerm {
    OxTerm::Literal(OxLiteral::new_typed_literal(
        if value { "true" } else { "false" },
        oxrdf::NamedNode::new_unchecked(XSD_BOOLEAN),
    ))
}

/// Effective boolean value
fn ebv(term: &OxTerm) -> Option<bool> {
    match term {
        OxTerm::Literal(l) => {
            let datatype = l.datatype();
            if datatype.as_str() == XSD_BOOLEAN {
                match l.value() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                }
            } else if NUMERIC_DATATYPES.contains(&datatype.as_str()) {
                l.value().parse::<f64>().ok().map(|v| v != 0.0)
            } else if datatype.as_str() == XSD_STRING || l.language().is_some() {
                Some(!l.value().is_empty())
            } else {
                None
            }
        }
        _ => None,
    }
}

fn is_numeric(l: &OxLiteral) -> bool {
    NUMERIC_DATATYPES.contains(&l.datatype().as_str())
}

fn terms_equal(a: &OxTerm, b: &OxTerm) -> bool {
    if a == b {
        return true;
    }
    if let (OxTerm::Literal(la), OxTerm::Literal(lb)) = (a, b) {
        if is_numeric(la) && is_numeric(lb) {
            if let (Ok(va), Ok(vb)) = (la.value().parse::<f64>(), lb.value().parse::<f64>()) {
                return va == vb;
            }
        }
    }
    false
}

/// Value comparison for FILTER operators; None when incomparable
fn value_cmp(a: &OxTerm, b: &OxTerm) -> Option<Ordering> {
    match (a, b) {
        (OxTerm::Literal(la), OxTerm::Literal(lb)) => {
            if is_numeric(la) && is_numeric(lb) {
                let va = la.value().parse::<f64>().ok()?;
                let vb = lb.value().parse::<f64>().ok()?;
                va.partial_cmp(&vb)
            } else {
                Some(la.value().cmp(lb.value()))
            }
        }
        _ => None,
    }
}

/// Total term ordering for ORDER BY:
/// unbound < blank nodes < IRIs < literals, lexical inside a class,
/// numeric literals by value.
fn term_cmp(a: Option<&OxTerm>, b: Option<&OxTerm>) -> Ordering {
    fn class(term: &OxTerm) -> u8 {
        match term {
            OxTerm::BlankNode(_) => 0,
            OxTerm::NamedNode(_) => 1,
            OxTerm::Literal(_) => 2,
            #[allow(unreachable_patterns)]
            _ => 3,
        }
    }
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let by_class = class(a).cmp(&class(b));
            if by_class != Ordering::Equal {
                return by_class;
            }
            if let (OxTerm::Literal(la), OxTerm::Literal(lb)) = (a, b) {
                if is_numeric(la) && is_numeric(lb) {
                    if let (Ok(va), Ok(vb)) =
                        (la.value().parse::<f64>(), lb.value().parse::<f64>())
                    {
                        if let Some(ordering) = va.partial_cmp(&vb) {
                            return ordering;
                        }
                    }
                }
            }
            a.to_string().cmp(&b.to_string())
        }
    }
}

fn pattern_name(pattern: &GraphPattern) -> &'static str {
    match pattern {
        GraphPattern::Path { .. } => "property path",
        GraphPattern::Group { .. } => "aggregation",
        GraphPattern::Service { .. } => "SERVICE",
        _ => "pattern",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Dataset, Quad};
    use crate::sparql::parser::parse_query;

    fn sample_dataset() -> Dataset {
        let mut ds = Dataset::new();
        let g = NamedNode::new("http://example.org/").unwrap();
        ds.insert(Quad::new(
            NamedNode::new("http://ex.org/a").unwrap(),
            NamedNode::new("http://ex.org/b").unwrap(),
            NamedNode::new("http://ex.org/c").unwrap(),
            g.clone(),
        ));
        ds.insert(Quad::new(
            NamedNode::new("http://ex.org/x").unwrap(),
            NamedNode::new("http://ex.org/y").unwrap(),
            NamedNode::new("http://ex.org/z").unwrap(),
            g,
        ));
        ds
    }

    #[test]
    fn test_select_all_in_graph() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, false);
        let engine = QueryEngine::new(&view);

        let query = parse_query(
            "SELECT ?s ?p ?o WHERE { GRAPH <http://example.org/> { ?s ?p ?o } }",
            None,
        )
        .unwrap();
        match engine.evaluate(&query).unwrap() {
            QueryResults::Solutions {
                variables,
                solutions,
            } => {
                assert_eq!(variables, vec!["s", "p", "o"]);
                assert_eq!(solutions.len(), 2);
            }
            _ => panic!("expected solutions"),
        }
    }

    #[test]
    fn test_graph_variable() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, false);
        let engine = QueryEngine::new(&view);

        let query =
            parse_query("SELECT DISTINCT ?g WHERE { GRAPH ?g { ?s ?p ?o } }", None).unwrap();
        match engine.evaluate(&query).unwrap() {
            QueryResults::Solutions { solutions, .. } => {
                assert_eq!(solutions.len(), 1);
                assert_eq!(
                    solutions[0].get("g").unwrap().to_string(),
                    "<http://example.org/>"
                );
            }
            _ => panic!("expected solutions"),
        }
    }

    #[test]
    fn test_ask_true_false() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, false);
        let engine = QueryEngine::new(&view);

        let hit = parse_query(
            "ASK { GRAPH <http://example.org/> { <http://ex.org/a> <http://ex.org/b> <http://ex.org/c> } }",
            None,
        )
        .unwrap();
        assert!(matches!(
            engine.evaluate(&hit).unwrap(),
            QueryResults::Boolean(true)
        ));

        let miss = parse_query(
            "ASK { GRAPH <http://example.org/> { <http://ex.org/a> <http://ex.org/b> <http://ex.org/missing> } }",
            None,
        )
        .unwrap();
        assert!(matches!(
            engine.evaluate(&miss).unwrap(),
            QueryResults::Boolean(false)
        ));
    }

    #[test]
    fn test_union_default_graph() {
        let ds = sample_dataset();

        let closed = DatasetView::new(&ds, false);
        let engine = QueryEngine::new(&closed);
        let query = parse_query("SELECT ?s WHERE { ?s ?p ?o }", None).unwrap();
        match engine.evaluate(&query).unwrap() {
            QueryResults::Solutions { solutions, .. } => assert!(solutions.is_empty()),
            _ => panic!("expected solutions"),
        }

        let union = DatasetView::new(&ds, true);
        let engine = QueryEngine::new(&union);
        match engine.evaluate(&query).unwrap() {
            QueryResults::Solutions { solutions, .. } => assert_eq!(solutions.len(), 2),
            _ => panic!("expected solutions"),
        }
    }

    #[test]
    fn test_filter_same_term() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, true);
        let engine = QueryEngine::new(&view);

        let query = parse_query(
            "SELECT ?s WHERE { ?s ?p ?o . FILTER sameTerm(?o, <http://ex.org/c>) }",
            None,
        )
        .unwrap();
        match engine.evaluate(&query).unwrap() {
            QueryResults::Solutions { solutions, .. } => {
                assert_eq!(solutions.len(), 1);
                assert_eq!(
                    solutions[0].get("s").unwrap().to_string(),
                    "<http://ex.org/a>"
                );
            }
            _ => panic!("expected solutions"),
        }
    }

    #[test]
    fn test_order_by_and_limit() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, true);
        let engine = QueryEngine::new(&view);

        let query =
            parse_query("SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?s LIMIT 1", None).unwrap();
        match engine.evaluate(&query).unwrap() {
            QueryResults::Solutions { solutions, .. } => {
                assert_eq!(solutions.len(), 1);
                assert_eq!(
                    solutions[0].get("s").unwrap().to_string(),
                    "<http://ex.org/a>"
                );
            }
            _ => panic!("expected solutions"),
        }
    }

    #[test]
    fn test_construct() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, true);
        let engine = QueryEngine::new(&view);

        let query = parse_query(
            "CONSTRUCT { ?s <urn:linked> ?o } WHERE { ?s <http://ex.org/b> ?o }",
            None,
        )
        .unwrap();
        match engine.evaluate(&query).unwrap() {
            QueryResults::Graph(triples) => {
                assert_eq!(triples.len(), 1);
                assert_eq!(triples[0].predicate.as_str(), "urn:linked");
            }
            _ => panic!("expected graph"),
        }
    }

    #[test]
    fn test_optional_keeps_unmatched() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, true);
        let engine = QueryEngine::new(&view);

        let query = parse_query(
            "SELECT ?s ?other WHERE { ?s <http://ex.org/b> ?o . OPTIONAL { ?s <urn:none> ?other } }",
            None,
        )
        .unwrap();
        match engine.evaluate(&query).unwrap() {
            QueryResults::Solutions { solutions, .. } => {
                assert_eq!(solutions.len(), 1);
                assert!(solutions[0].get("other").is_none());
            }
            _ => panic!("expected solutions"),
        }
    }

    #[test]
    fn test_unsupported_pattern() {
        let ds = sample_dataset();
        let view = DatasetView::new(&ds, true);
        let engine = QueryEngine::new(&view);

        let query = parse_query(
            "SELECT ?s WHERE { ?s <http://ex.org/b>+ ?o }",
            None,
        )
        .unwrap();
        assert!(matches!(
            engine.evaluate(&query),
            Err(SparqlError::Unsupported(_))
        ));
    }
}
