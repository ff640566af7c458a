//! Tag and property filters.

use std::fmt;

use super::QueryError;

/// Disjunction of tag conjunctions.
///
/// `TagFilter::all(["a", "b"]).or_all(["c"])` matches features tagged with
/// both `a` and `b`, or with `c`. It renders as `a+b,c`, the Hub syntax for
/// the `tags` parameter.
///
/// ```
/// use geohub_core::TagFilter;
///
/// assert_eq!(TagFilter::any(["red", "blue"]).to_string(), "red,blue");
/// assert_eq!(TagFilter::all(["a", "b"]).or_all(["c"]).to_string(), "a+b,c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagFilter {
    groups: Vec<Vec<String>>,
}

impl TagFilter {
    /// Match features carrying any of `tags`.
    pub fn any<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: tags.into_iter().map(|tag| vec![tag.into()]).collect(),
        }
    }

    /// Match features carrying all of `tags`.
    pub fn all<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().or_all(tags)
    }

    /// Add an alternative group whose tags must all be present.
    #[must_use]
    pub fn or_all<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.push(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Groups of the filter; features match if any group matches.
    #[must_use]
    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Check that every group and tag is usable.
    ///
    /// # Errors
    ///
    /// Fails for an empty filter, an empty group, or a tag that is empty or
    /// contains `,` or `+`.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.groups.is_empty() || self.groups.iter().any(Vec::is_empty) {
            return Err(QueryError::EmptyTagFilter);
        }
        for tag in self.groups.iter().flatten() {
            if tag.is_empty() || tag.contains([',', '+']) {
                return Err(QueryError::InvalidTag { tag: tag.clone() });
            }
        }
        Ok(())
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, group) in self.groups.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            f.write_str(&group.join("+"))?;
        }
        Ok(())
    }
}

/// Comparison applied by a [`PropertyPredicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOp {
    /// Equal to any of the values.
    Eq,
    /// Not equal to any of the values.
    NotEq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl PropertyOp {
    /// Long-form operator understood by the Hub, `None` for equality.
    #[must_use]
    pub const fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Eq => None,
            Self::NotEq => Some("ne"),
            Self::Gt => Some("gt"),
            Self::Gte => Some("gte"),
            Self::Lt => Some("lt"),
            Self::Lte => Some("lte"),
        }
    }
}

/// Server-side filter on a feature property.
///
/// Paths are addressed relative to `properties` unless they already start
/// with `p.` (properties) or `f.` (feature root, e.g. `f.id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPredicate {
    path: String,
    op: PropertyOp,
    values: Vec<String>,
}

impl PropertyPredicate {
    /// Compare `path` against `values` with `op`.
    pub fn new<I, S>(path: impl Into<String>, op: PropertyOp, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            op,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `path` equals `value`.
    pub fn eq(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(path, PropertyOp::Eq, [value])
    }

    /// Fully qualified path, e.g. `p.population`.
    #[must_use]
    pub fn qualified_path(&self) -> String {
        if self.path.starts_with("p.") || self.path.starts_with("f.") {
            self.path.clone()
        } else {
            format!("p.{}", self.path)
        }
    }

    /// Query parameter `(key, value)` pair for this predicate.
    #[must_use]
    pub fn to_param(&self) -> (String, String) {
        let values = self.values.join(",");
        let value = match self.op.keyword() {
            None => values,
            Some(keyword) => format!("{keyword}={values}"),
        };
        (self.qualified_path(), value)
    }

    /// Check the path and values are present.
    ///
    /// # Errors
    ///
    /// Fails for an empty path or an empty value list.
    pub fn validate(&self) -> Result<(), QueryError> {
        let bare = self
            .path
            .strip_prefix("p.")
            .or_else(|| self.path.strip_prefix("f."))
            .unwrap_or(&self.path);
        if bare.trim().is_empty() {
            return Err(QueryError::EmptyPropertyPath);
        }
        if self.values.is_empty() {
            return Err(QueryError::EmptyPropertyValues {
                path: self.qualified_path(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn any_renders_alternatives() {
        let filter = TagFilter::any(["a", "b", "c"]);
        assert_eq!(filter.to_string(), "a,b,c");
        assert_eq!(filter.groups().len(), 3);
    }

    #[rstest]
    fn all_renders_conjunction() {
        assert_eq!(TagFilter::all(["x", "y"]).to_string(), "x+y");
    }

    #[rstest]
    #[case(TagFilter::default(), QueryError::EmptyTagFilter)]
    #[case(TagFilter::all(Vec::<String>::new()), QueryError::EmptyTagFilter)]
    #[case(TagFilter::any([""]), QueryError::InvalidTag { tag: String::new() })]
    #[case(TagFilter::any(["a,b"]), QueryError::InvalidTag { tag: "a,b".to_owned() })]
    #[case(TagFilter::all(["ok", "a+b"]), QueryError::InvalidTag { tag: "a+b".to_owned() })]
    fn invalid_filters_are_rejected(#[case] filter: TagFilter, #[case] expected: QueryError) {
        assert_eq!(filter.validate(), Err(expected));
    }

    #[rstest]
    #[case(PropertyPredicate::eq("name", "Berlin"), ("p.name", "Berlin"))]
    #[case(PropertyPredicate::eq("p.name", "Berlin"), ("p.name", "Berlin"))]
    #[case(PropertyPredicate::eq("f.id", "abc"), ("f.id", "abc"))]
    #[case(PropertyPredicate::new("pop", PropertyOp::Gte, ["1000"]), ("p.pop", "gte=1000"))]
    #[case(PropertyPredicate::new("kind", PropertyOp::NotEq, ["a", "b"]), ("p.kind", "ne=a,b"))]
    #[case(PropertyPredicate::new("kind", PropertyOp::Eq, ["a", "b"]), ("p.kind", "a,b"))]
    fn predicates_render_params(
        #[case] predicate: PropertyPredicate,
        #[case] expected: (&str, &str),
    ) {
        assert_eq!(predicate.validate(), Ok(()));
        let (key, value) = predicate.to_param();
        assert_eq!((key.as_str(), value.as_str()), expected);
    }

    #[rstest]
    fn predicate_needs_path_and_values() {
        assert_eq!(
            PropertyPredicate::eq("p.", "x").validate(),
            Err(QueryError::EmptyPropertyPath)
        );
        assert_eq!(
            PropertyPredicate::new("pop", PropertyOp::Lt, Vec::<String>::new()).validate(),
            Err(QueryError::EmptyPropertyValues {
                path: "p.pop".to_owned()
            })
        );
    }
}
