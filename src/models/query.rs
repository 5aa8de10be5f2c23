use std::fmt;

use serde::{Deserialize, Serialize};

use super::document::Keyword;

/// Boolean query tree. A node carries exactly one of: a leaf keyword, a
/// `must` list (AND), or a `should` list (OR). An empty query matches
/// nothing; the `and`/`or` builders prune empty sub-queries.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TermQuery {
    pub keyword: Option<Keyword>,
    pub must: Vec<TermQuery>,
    pub should: Vec<TermQuery>,
}

impl TermQuery {
    /// Leaf query for one (field, word) pair.
    pub fn from_keyword(field: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            keyword: Some(Keyword::new(field, word)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keyword.is_none() && self.must.is_empty() && self.should.is_empty()
    }

    /// Combine this query with others under AND. Empty queries are pruned;
    /// if nothing survives, `self` is returned unchanged.
    pub fn and(self, queries: Vec<TermQuery>) -> TermQuery {
        if queries.is_empty() {
            return self;
        }
        let mut array = Vec::with_capacity(1 + queries.len());
        if !self.is_empty() {
            array.push(self.clone());
        }
        array.extend(queries.into_iter().filter(|q| !q.is_empty()));
        if array.is_empty() {
            return self;
        }
        TermQuery {
            must: array,
            ..Default::default()
        }
    }

    /// Combine this query with others under OR. Empty queries are pruned;
    /// if nothing survives, `self` is returned unchanged.
    pub fn or(self, queries: Vec<TermQuery>) -> TermQuery {
        if queries.is_empty() {
            return self;
        }
        let mut array = Vec::with_capacity(1 + queries.len());
        if !self.is_empty() {
            array.push(self.clone());
        }
        array.extend(queries.into_iter().filter(|q| !q.is_empty()));
        if array.is_empty() {
            return self;
        }
        TermQuery {
            should: array,
            ..Default::default()
        }
    }
}

impl fmt::Display for TermQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, list: &[TermQuery], sep: char) -> fmt::Result {
            if list.len() == 1 {
                return write!(f, "{}", list[0]);
            }
            write!(f, "(")?;
            let rendered: Vec<String> = list
                .iter()
                .map(|q| q.to_string())
                .filter(|s| !s.is_empty())
                .collect();
            write!(f, "{}", rendered.join(&sep.to_string()))?;
            write!(f, ")")
        }

        if let Some(kw) = &self.keyword {
            write!(f, "{}", kw.to_term())
        } else if !self.must.is_empty() {
            join(f, &self.must, '&')
        } else if !self.should.is_empty() {
            join(f, &self.should, '|')
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_query() {
        let q = TermQuery::from_keyword("content", "go");
        assert!(!q.is_empty());
        assert_eq!(q.to_string(), "content\u{1}go");
    }

    #[test]
    fn test_and_prunes_empty() {
        let q = TermQuery::from_keyword("content", "go").and(vec![
            TermQuery::default(),
            TermQuery::from_keyword("content", "db"),
        ]);
        assert_eq!(q.must.len(), 2);
        assert!(q.keyword.is_none());
    }

    #[test]
    fn test_or_prunes_empty_children() {
        let q = TermQuery::from_keyword("a", "b").or(vec![TermQuery::default()]);
        // Only the receiver survives, wrapped in a SHOULD node.
        assert_eq!(q.should.len(), 1);
    }

    #[test]
    fn test_expression_rendering() {
        let q = TermQuery::from_keyword("c", "x").and(vec![TermQuery::from_keyword("c", "y")
            .or(vec![TermQuery::from_keyword("c", "z")])]);
        assert_eq!(q.to_string(), "(c\u{1}x&(c\u{1}y|c\u{1}z))");
    }
}
