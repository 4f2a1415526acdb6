use std::collections::HashMap;

use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, PhraseQuery, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{Index, Term};

use crate::schema::{IndexSchema, TYPE_TRACK};
use crate::LibraryError;

const FUZZY_DISTANCE: u8 = 1;

/// Compiles a structured request into one boolean query restricted to track
/// documents. Field values are tokenized with the index's own analyzer for
/// the target field; `exact` selects phrase matching over a fuzzy
/// conjunction. Multiple values for a field OR together, fields AND
/// together. Returns `None` when no recognized field is present, so callers
/// short-circuit to an empty result instead of matching the whole corpus.
pub(crate) fn compile(
    index: &Index,
    fields: &IndexSchema,
    query: &HashMap<String, Vec<String>>,
    exact: bool,
) -> Result<Option<BooleanQuery>, LibraryError> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(
        Occur::Must,
        Box::new(TermQuery::new(
            Term::from_field_text(fields.doc_type, TYPE_TRACK),
            IndexRecordOption::Basic,
        )),
    )];
    let mut recognized = false;

    for (name, values) in query {
        let field = match name.as_str() {
            "uri" => fields.uri,
            "track_name" => fields.name,
            "album" => fields.album,
            "artist" => fields.artists,
            "any" => fields.content,
            _ => continue,
        };
        if values.is_empty() {
            continue;
        }
        recognized = true;

        let mut alternatives: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for value in values {
            if name == "uri" {
                // The key field is matched verbatim, never tokenized or
                // fuzzed.
                alternatives.push((
                    Occur::Should,
                    Box::new(TermQuery::new(
                        Term::from_field_text(field, value),
                        IndexRecordOption::Basic,
                    )),
                ));
                continue;
            }
            let terms = tokenize(index, field, value)?;
            if terms.is_empty() {
                continue;
            }
            alternatives.push((Occur::Should, field_clause(terms, exact)));
        }
        // A recognized field whose values all tokenized to nothing still
        // constrains the query, matching no documents.
        clauses.push((Occur::Must, Box::new(BooleanQuery::new(alternatives))));
    }

    if !recognized {
        return Ok(None);
    }
    Ok(Some(BooleanQuery::new(clauses)))
}

fn field_clause(mut terms: Vec<Term>, exact: bool) -> Box<dyn Query> {
    if exact {
        // A phrase needs at least two positions; a lone token is a plain term.
        if terms.len() == 1 {
            Box::new(TermQuery::new(terms.remove(0), IndexRecordOption::Basic))
        } else {
            Box::new(PhraseQuery::new(terms))
        }
    } else {
        let fuzzy: Vec<(Occur, Box<dyn Query>)> = terms
            .into_iter()
            .map(|term| {
                (
                    Occur::Must,
                    Box::new(FuzzyTermQuery::new(term, FUZZY_DISTANCE, true)) as Box<dyn Query>,
                )
            })
            .collect();
        Box::new(BooleanQuery::new(fuzzy))
    }
}

fn tokenize(index: &Index, field: Field, value: &str) -> Result<Vec<Term>, LibraryError> {
    let mut analyzer = index
        .tokenizer_for_field(field)
        .map_err(LibraryError::Storage)?;
    let mut terms = Vec::new();
    let mut stream = analyzer.token_stream(value);
    stream.process(&mut |token| {
        terms.push(Term::from_field_text(field, &token.text));
    });
    Ok(terms)
}
