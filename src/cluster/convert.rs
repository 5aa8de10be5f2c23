//! Conversions between model types and their wire shapes.

use crate::models::{Document, Keyword, TermQuery};

use super::proto;

pub fn keyword_to_proto(keyword: &Keyword) -> proto::Keyword {
    proto::Keyword {
        field: keyword.field.clone(),
        word: keyword.word.clone(),
    }
}

pub fn keyword_from_proto(keyword: proto::Keyword) -> Keyword {
    Keyword {
        field: keyword.field,
        word: keyword.word,
    }
}

pub fn doc_to_proto(doc: Document) -> proto::Document {
    proto::Document {
        doc_id: doc.doc_id,
        int_id: doc.int_id,
        bits: doc.bits,
        keywords: doc.keywords.iter().map(keyword_to_proto).collect(),
        payload: doc.payload,
    }
}

pub fn doc_from_proto(doc: proto::Document) -> Document {
    Document {
        doc_id: doc.doc_id,
        int_id: doc.int_id,
        bits: doc.bits,
        keywords: doc.keywords.into_iter().map(keyword_from_proto).collect(),
        payload: doc.payload,
    }
}

pub fn query_to_proto(query: &TermQuery) -> proto::TermQuery {
    proto::TermQuery {
        keyword: query.keyword.as_ref().map(keyword_to_proto),
        must: query.must.iter().map(query_to_proto).collect(),
        should: query.should.iter().map(query_to_proto).collect(),
    }
}

pub fn query_from_proto(query: proto::TermQuery) -> TermQuery {
    TermQuery {
        keyword: query.keyword.map(keyword_from_proto),
        must: query.must.into_iter().map(query_from_proto).collect(),
        should: query.should.into_iter().map(query_from_proto).collect(),
    }
}
