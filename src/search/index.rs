use std::collections::HashMap;

use crate::registry::{ServerEntry, ServerRegistry, ToolEntry};

use super::tokenizer::tokenize;

/// Term-frequency saturation.
pub const K1: f64 = 1.5;
/// Document-length normalization strength.
pub const B: f64 = 0.75;

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc_id: usize,
    weight: f64,
}

/// Immutable BM25 index with per-posting scores computed at build time.
///
/// Doc ids are the positions of the texts handed to [`SearchIndex::build`].
#[derive(Debug, Default)]
pub struct SearchIndex {
    postings: HashMap<String, Vec<Posting>>,
    doc_count: usize,
}

impl SearchIndex {
    pub fn build<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let documents: Vec<Vec<String>> = texts
            .into_iter()
            .map(|text| tokenize(text.as_ref()))
            .collect();
        let doc_count = documents.len();
        let total_terms: usize = documents.iter().map(Vec::len).sum();
        let avg_len = if doc_count == 0 || total_terms == 0 {
            1.0
        } else {
            total_terms as f64 / doc_count as f64
        };

        let mut frequencies: HashMap<String, Vec<(usize, u32, usize)>> = HashMap::new();
        for (doc_id, terms) in documents.iter().enumerate() {
            let mut counts: HashMap<&str, u32> = HashMap::new();
            for term in terms {
                *counts.entry(term.as_str()).or_default() += 1;
            }
            for (term, tf) in counts {
                frequencies
                    .entry(term.to_string())
                    .or_default()
                    .push((doc_id, tf, terms.len()));
            }
        }

        let postings = frequencies
            .into_iter()
            .map(|(term, mut docs)| {
                docs.sort_unstable_by_key(|(doc_id, _, _)| *doc_id);
                let idf = idf(doc_count, docs.len());
                let list = docs
                    .into_iter()
                    .map(|(doc_id, tf, doc_len)| Posting {
                        doc_id,
                        weight: idf * saturate(tf, doc_len, avg_len),
                    })
                    .collect();
                (term, list)
            })
            .collect();

        Self {
            postings,
            doc_count,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    /// Add the contribution of `term` to every document containing it.
    pub(crate) fn accumulate(&self, term: &str, scores: &mut [f64]) {
        let Some(postings) = self.postings.get(term) else {
            return;
        };
        for posting in postings {
            if let Some(score) = scores.get_mut(posting.doc_id) {
                *score += posting.weight;
            }
        }
    }
}

/// Lucene-style IDF; stays positive even for terms present in every document.
fn idf(doc_count: usize, doc_freq: usize) -> f64 {
    let n = doc_count as f64;
    let df = doc_freq as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

fn saturate(tf: u32, doc_len: usize, avg_len: f64) -> f64 {
    let tf = f64::from(tf);
    let norm = 1.0 - B + B * (doc_len as f64 / avg_len);
    tf * (K1 + 1.0) / (tf + K1 * norm)
}

/// Text indexed for a server: its name and (possibly synthesized) description.
pub fn server_document(server: &ServerEntry) -> String {
    format!("{}\n{}", server.name, server.description)
}

/// Text indexed for a tool, optionally prefixed with its owning server's name.
pub fn tool_document(tool: &ToolEntry, qualify_with_server: bool) -> String {
    if qualify_with_server {
        format!("{}\n{}\n{}", tool.server_name, tool.name, tool.description)
    } else {
        format!("{}\n{}", tool.name, tool.description)
    }
}

/// The server-level and tool-level indices of one registry.
#[derive(Debug)]
pub struct RegistryIndices {
    pub servers: SearchIndex,
    pub tools: SearchIndex,
}

impl RegistryIndices {
    pub fn build(registry: &ServerRegistry, qualify_tool_text: bool) -> Self {
        let servers = SearchIndex::build(registry.servers().iter().map(server_document));
        let tools = SearchIndex::build(
            registry
                .tools()
                .map(|tool| tool_document(tool, qualify_tool_text)),
        );
        Self { servers, tools }
    }
}
