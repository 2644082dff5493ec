//! Route handlers
//!
//! The SPARQL handlers speak the SPARQL 1.1 protocol: GET with a
//! `query` parameter, urlencoded POST with `query`/`update` fields,
//! and direct POST with `application/sparql-query` or
//! `application/sparql-update` bodies. Queries must not carry
//! `using-*` parameters and updates must not carry
//! `default-graph-uri`/`named-graph-uri`; mixing the families is
//! rejected before anything executes.

use crate::error::{QuitError, QuitResult};
use crate::repo::MergeMethod;
use crate::sparql::{negotiate, serialize_results, QueryResults, ResultsFormat, UpdateScoping};
use crate::store::{QueryScoping, QuitStore};
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::{DateTime, SecondsFormat};
use oxrdf::{NamedNode as OxNamedNode, Term as OxTerm};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// Decoded SPARQL protocol parameters
#[derive(Debug, Default)]
struct ProtocolRequest {
    query: Option<String>,
    update: Option<String>,
    reference: Option<String>,
    default_graph: Vec<String>,
    named_graph: Vec<String>,
    using_graph: Vec<String>,
    using_named_graph: Vec<String>,
}

impl ProtocolRequest {
    fn absorb(&mut self, key: &str, value: String) {
        match key {
            "query" => self.query = Some(value),
            "update" => self.update = Some(value),
            "ref" => self.reference = Some(value),
            "default-graph-uri" => self.default_graph.push(value),
            "named-graph-uri" => self.named_graph.push(value),
            "using-graph-uri" => self.using_graph.push(value),
            "using-named-graph-uri" => self.using_named_graph.push(value),
            _ => {}
        }
    }
}

fn parse_request(
    method: &Method,
    headers: &HeaderMap,
    raw_query: Option<&str>,
    body: &str,
) -> QuitResult<ProtocolRequest> {
    let mut request = ProtocolRequest::default();
    if let Some(qs) = raw_query {
        for (key, value) in form_urlencoded::parse(qs.as_bytes()) {
            request.absorb(&key, value.into_owned());
        }
    }

    if method == Method::POST {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();
        match content_type.as_str() {
            "application/x-www-form-urlencoded" | "" => {
                for (key, value) in form_urlencoded::parse(body.as_bytes()) {
                    request.absorb(&key, value.into_owned());
                }
            }
            "application/sparql-query" => request.query = Some(body.to_string()),
            "application/sparql-update" => request.update = Some(body.to_string()),
            other => {
                return Err(QuitError::BadRequest(format!(
                    "unsupported content type: {}",
                    other
                )))
            }
        }
    }
    Ok(request)
}

fn parse_graph_list(values: &[String]) -> QuitResult<Vec<OxNamedNode>> {
    values
        .iter()
        .map(|v| {
            OxNamedNode::new(v.clone())
                .map_err(|e| QuitError::BadRequest(format!("invalid graph IRI: {}", e)))
        })
        .collect()
}

async fn handle_sparql(
    store: Arc<QuitStore>,
    refspec: Option<String>,
    method: Method,
    headers: HeaderMap,
    raw_query: Option<String>,
    body: String,
) -> QuitResult<Response> {
    let request = parse_request(&method, &headers, raw_query.as_deref(), &body)?;
    let refspec = refspec.or(request.reference.clone());

    match (&request.query, &request.update) {
        (Some(_), Some(_)) => Err(QuitError::BadRequest(
            "request carries both a query and an update".to_string(),
        )),
        (Some(query), None) => {
            if !request.using_graph.is_empty() || !request.using_named_graph.is_empty() {
                return Err(QuitError::BadRequest(
                    "using-graph-uri is an update parameter".to_string(),
                ));
            }
            let scoping = QueryScoping {
                default: parse_graph_list(&request.default_graph)?,
                named: parse_graph_list(&request.named_graph)?,
            };
            let results = store.query(refspec.as_deref(), query, &scoping)?;
            respond_with_results(&headers, &results)
        }
        (None, Some(update)) => {
            if method == Method::GET {
                return Err(QuitError::BadRequest(
                    "updates must be sent via POST".to_string(),
                ));
            }
            if !request.default_graph.is_empty() || !request.named_graph.is_empty() {
                return Err(QuitError::BadRequest(
                    "default-graph-uri is a query parameter".to_string(),
                ));
            }
            let scoping = UpdateScoping {
                default: parse_graph_list(&request.using_graph)?,
                named: parse_graph_list(&request.using_named_graph)?,
            };
            let scoping = if scoping.is_empty() {
                None
            } else {
                Some(scoping)
            };
            let commit = store.update(refspec.as_deref(), update, scoping.as_ref())?;
            debug!("update done, commit: {:?}", commit);
            Ok(StatusCode::OK.into_response())
        }
        (None, None) => Err(QuitError::BadRequest(
            "neither query nor update given".to_string(),
        )),
    }
}

fn respond_with_results(headers: &HeaderMap, results: &QueryResults) -> QuitResult<Response> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok());
    let (format, content_type) = negotiate(accept, results.is_graph())
        .ok_or_else(|| QuitError::NotAcceptable(accept.unwrap_or("*/*").to_string()))?;
    let body = serialize_results(results, format)
        .map_err(|e| QuitError::IoFailure(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response())
}

/// `/sparql`
pub async fn sparql_handler(
    State(store): State<Arc<QuitStore>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: String,
) -> Result<Response, QuitError> {
    handle_sparql(store, None, method, headers, raw_query, body).await
}

/// `/sparql/{ref}`
pub async fn sparql_ref_handler(
    State(store): State<Arc<QuitStore>>,
    Path(refspec): Path<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: String,
) -> Result<Response, QuitError> {
    handle_sparql(store, Some(refspec), method, headers, raw_query, body).await
}

/// `/provenance`: queries only, never updates
pub async fn provenance_handler(
    State(store): State<Arc<QuitStore>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: String,
) -> Result<Response, QuitError> {
    let request = parse_request(&method, &headers, raw_query.as_deref(), &body)?;
    if request.update.is_some() {
        return Err(QuitError::BadRequest(
            "the provenance endpoint does not accept updates".to_string(),
        ));
    }
    let query = request
        .query
        .ok_or_else(|| QuitError::BadRequest("no query given".to_string()))?;
    let results = store.provenance_query(&query)?;
    respond_with_results(&headers, &results)
}

#[derive(Deserialize)]
pub struct BranchForm {
    pub oldbranch: Option<String>,
    pub newbranch: Option<String>,
}

/// `/branch` with `oldbranch`/`newbranch` form fields
pub async fn branch_form_handler(
    State(store): State<Arc<QuitStore>>,
    Form(form): Form<BranchForm>,
) -> Result<Response, QuitError> {
    let newbranch = form
        .newbranch
        .ok_or_else(|| QuitError::BadRequest("newbranch is required".to_string()))?;
    store.create_branch(form.oldbranch.as_deref(), &newbranch)?;
    Ok(StatusCode::CREATED.into_response())
}

/// `/branch/{from}:{new}`
pub async fn branch_refspec_handler(
    State(store): State<Arc<QuitStore>>,
    Path(refspec): Path<String>,
) -> Result<Response, QuitError> {
    let (from, new) = refspec.split_once(':').ok_or_else(|| {
        QuitError::BadRequest("expected {oldbranch}:{newbranch}".to_string())
    })?;
    store.create_branch(Some(from), new)?;
    Ok(StatusCode::CREATED.into_response())
}

/// `/delete/branch/{name}`
pub async fn delete_branch_handler(
    State(store): State<Arc<QuitStore>>,
    Path(branch): Path<String>,
) -> Result<Response, QuitError> {
    store.delete_branch(&branch)?;
    Ok(StatusCode::OK.into_response())
}

#[derive(Deserialize)]
pub struct MergeForm {
    pub target: String,
    pub branch: String,
    pub method: Option<String>,
}

/// `/merge` with `target`/`branch`/`method` form fields
pub async fn merge_handler(
    State(store): State<Arc<QuitStore>>,
    Form(form): Form<MergeForm>,
) -> Result<Response, QuitError> {
    let method = match form.method.as_deref() {
        None => MergeMethod::ThreeWay,
        Some(name) => name
            .parse::<MergeMethod>()
            .map_err(QuitError::BadRequest)?,
    };
    let commit = store.merge(&form.target, &form.branch, method)?;
    Ok((StatusCode::CREATED, Json(json!({ "commit": commit }))).into_response())
}

/// `/pull/{remote}`
pub async fn pull_handler(
    State(store): State<Arc<QuitStore>>,
    Path(remote): Path<String>,
) -> Result<Response, QuitError> {
    store.pull(&remote, None)?;
    Ok(StatusCode::OK.into_response())
}

/// `/pull/{remote}/{branch}`
pub async fn pull_ref_handler(
    State(store): State<Arc<QuitStore>>,
    Path((remote, branch)): Path<(String, String)>,
) -> Result<Response, QuitError> {
    store.pull(&remote, Some(&branch))?;
    Ok(StatusCode::OK.into_response())
}

/// `/push/{remote}`
pub async fn push_handler(
    State(store): State<Arc<QuitStore>>,
    Path(remote): Path<String>,
) -> Result<Response, QuitError> {
    store.push(&remote, None)?;
    Ok(StatusCode::OK.into_response())
}

/// `/push/{remote}/{branch}`
pub async fn push_ref_handler(
    State(store): State<Arc<QuitStore>>,
    Path((remote, branch)): Path<(String, String)>,
) -> Result<Response, QuitError> {
    store.push(&remote, Some(&branch))?;
    Ok(StatusCode::OK.into_response())
}

/// `/commits`: the log as JSON
pub async fn commits_handler(
    State(store): State<Arc<QuitStore>>,
    headers: HeaderMap,
) -> Result<Response, QuitError> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("*/*");
    let acceptable = accept.split(',').any(|part| {
        let essence = part.split(';').next().unwrap_or("").trim();
        matches!(essence, "*/*" | "application/json" | "application/*")
    });
    if !acceptable {
        return Err(QuitError::NotAcceptable(accept.to_string()));
    }
    let commits = store.commits()?;
    Ok(Json(commits).into_response())
}

/// `/blame/{ref}`: per-quad last-touching commit metadata as SPARQL
/// results JSON
pub async fn blame_handler(
    State(store): State<Arc<QuitStore>>,
    Path(refspec): Path<String>,
) -> Result<Response, QuitError> {
    let rows = store.blame(&refspec)?;

    let variables = ["s", "p", "o", "context", "hex", "name", "email", "date"];
    let mut solutions = Vec::new();
    for row in rows {
        let mut binding: BTreeMap<String, OxTerm> = BTreeMap::new();
        binding.insert("s".to_string(), row.quad.subject.clone().into());
        binding.insert(
            "p".to_string(),
            OxTerm::NamedNode(row.quad.predicate.inner().clone()),
        );
        binding.insert("o".to_string(), row.quad.object.clone().into());
        binding.insert(
            "context".to_string(),
            OxTerm::NamedNode(row.quad.graph.inner().clone()),
        );
        binding.insert(
            "hex".to_string(),
            OxTerm::Literal(oxrdf::Literal::new_simple_literal(&row.commit.id)),
        );
        binding.insert(
            "name".to_string(),
            OxTerm::Literal(oxrdf::Literal::new_simple_literal(&row.commit.author.name)),
        );
        binding.insert(
            "email".to_string(),
            OxTerm::Literal(oxrdf::Literal::new_simple_literal(
                &row.commit.author.email,
            )),
        );
        let date = DateTime::from_timestamp(row.commit.committed_at, 0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());
        binding.insert(
            "date".to_string(),
            OxTerm::Literal(oxrdf::Literal::new_typed_literal(
                date,
                OxNamedNode::new(XSD_DATETIME)
                    .map_err(|e| QuitError::IoFailure(e.to_string()))?,
            )),
        );
        solutions.push(binding);
    }

    let results = QueryResults::Solutions {
        variables: variables.iter().map(|v| v.to_string()).collect(),
        solutions,
    };
    let body = serialize_results(&results, ResultsFormat::SparqlJson)
        .map_err(|e| QuitError::IoFailure(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/sparql-results+json")],
        body,
    )
        .into_response())
}
