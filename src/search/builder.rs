//! Turning parsed query nodes into a backend query
//!
//! Top-level nodes are ANDed, the members of a group ORed. Terms and phrases
//! test the searchable text of a video; keywords are resolved to a related
//! object and test the matching field.

use log::{debug, warn};

use super::backend::{BackendQuery, QueryBackend};
use super::filters::FilterTarget;
use super::tokenizer::Node;
use crate::db::KeywordResolver;
use crate::error::Result;

pub struct QueryBuilder<'a> {
    resolver: KeywordResolver<'a>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(resolver: KeywordResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &KeywordResolver<'a> {
        &self.resolver
    }

    /// Compile `nodes` within `scope` into a runnable query
    pub fn build<'b, B: QueryBackend<'b>>(
        &self,
        nodes: &[Node],
        scope: B::Predicate,
        backend: &B,
    ) -> Result<BackendQuery<'b>> {
        let mut clauses = vec![scope];
        if let Some(predicate) = self.predicate(nodes, backend)? {
            clauses.push(predicate);
        }
        let query = backend.finish(backend.and(clauses));
        debug!("[Builder] {} query: {:?}", backend.kind(), query);
        Ok(query)
    }

    /// AND of the constraints in `nodes`; `None` when nothing constrains
    pub fn predicate<'b, B: QueryBackend<'b>>(&self, nodes: &[Node], backend: &B) -> Result<Option<B::Predicate>> {
        let mut clauses = Vec::new();
        for node in nodes {
            if let Some(predicate) = self.node(node, backend)? {
                clauses.push(predicate);
            }
        }
        if clauses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(backend.and(clauses)))
        }
    }

    fn node<'b, B: QueryBackend<'b>>(&self, node: &Node, backend: &B) -> Result<Option<B::Predicate>> {
        let (predicate, negated) = match node {
            Node::Term { text, negated } | Node::Phrase { text, negated } => {
                (backend.text(text)?, *negated)
            }
            Node::Keyword { key, value, negated } => (self.keyword(key, value, backend)?, *negated),
            Node::OrGroup(children) => {
                let mut members = Vec::new();
                for child in children {
                    if let Some(predicate) = self.node(child, backend)? {
                        members.push(predicate);
                    }
                }
                let group = if members.is_empty() { None } else { Some(backend.or(members)) };
                (group, false)
            }
        };
        Ok(match predicate {
            Some(p) if negated => Some(backend.not(p)),
            other => other,
        })
    }

    fn keyword<'b, B: QueryBackend<'b>>(&self, key: &str, value: &str, backend: &B) -> Result<Option<B::Predicate>> {
        let Some(target) = FilterTarget::for_keyword(key) else {
            warn!("[Builder] Ignoring unknown keyword '{}'", key);
            return Ok(None);
        };
        match self.resolver.resolve(target.related(), value.trim())? {
            Some(id) => Ok(Some(target.predicate(backend, &[id])?)),
            None => {
                warn!("[Builder] No {:?} matches '{}'", target.related(), value);
                Ok(None)
            }
        }
    }
}
