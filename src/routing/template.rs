//! Path templates.
//!
//! A template is a `/`-separated list of segments:
//! - `items`: literal, matches identical text only
//! - `{id}`: parameter, matches one non-empty segment
//! - `{*rest}`: wildcard, last segment only, matches the remainder (possibly empty)
//!
//! Empty segments are ignored on both sides, so `/a//b/` and `/a/b` are the same path.

use thiserror::Error;

/// A single template segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

/// Reasons a template fails to parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("must start with '/'")]
    MissingLeadingSlash,

    #[error("segment '{0}' is not a literal or a well-formed {{name}} parameter")]
    MalformedSegment(String),

    #[error("parameter '{0}' appears more than once")]
    DuplicateParam(String),

    #[error("wildcard '{{*{0}}}' must be the last segment")]
    WildcardNotLast(String),
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl PathTemplate {
    /// Parse a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !raw.starts_with('/') {
            return Err(TemplateError::MissingLeadingSlash);
        }

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for part in split_path(raw) {
            let segment = parse_segment(part)?;
            if let Some(Segment::Wildcard(name)) = segments.last() {
                return Err(TemplateError::WildcardNotLast(name.clone()));
            }
            if let Segment::Param(name) | Segment::Wildcard(name) = &segment {
                if names.contains(&name.as_str()) {
                    return Err(TemplateError::DuplicateParam(name.clone()));
                }
            }
            if let Some(name) = param_name(part) {
                names.push(name);
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            trailing_slash: raw.len() > 1 && raw.ends_with('/'),
        })
    }

    /// The template as written in the config.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of every capturing segment, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) | Segment::Wildcard(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Canonical form with parameter names erased, used for duplicate detection.
    pub fn shape(&self) -> String {
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            match segment {
                Segment::Literal(text) => shape.push_str(text),
                Segment::Param(_) => shape.push_str("{}"),
                Segment::Wildcard(_) => shape.push_str("{*}"),
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }

    /// Number of literal segments before the first parameter or wildcard.
    pub fn literal_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Number of capturing segments (a wildcard counts as one).
    pub fn param_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| !matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard(_)))
    }

    /// Fill the template from captured parameters.
    ///
    /// Parameters missing from `params` render as empty and are skipped; the
    /// route table rejects downstream templates that reference unknown names.
    pub fn render(&self, params: &PathParams) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            let value = match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Param(name) | Segment::Wildcard(name) => params.get(name).unwrap_or(""),
            };
            let value = value.trim_matches('/');
            if value.is_empty() {
                continue;
            }
            out.push('/');
            out.push_str(value);
        }
        if out.is_empty() || self.trailing_slash {
            out.push('/');
        }
        out
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parameters captured while matching a request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split a path into its non-empty segments.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn parse_segment(part: &str) -> Result<Segment, TemplateError> {
    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        let (wildcard, name) = match inner.strip_prefix('*') {
            Some(name) => (true, name),
            None => (false, inner),
        };
        if !is_valid_name(name) {
            return Err(TemplateError::MalformedSegment(part.to_string()));
        }
        return Ok(if wildcard {
            Segment::Wildcard(name.to_string())
        } else {
            Segment::Param(name.to_string())
        });
    }
    if part.contains(['{', '}']) {
        return Err(TemplateError::MalformedSegment(part.to_string()));
    }
    Ok(Segment::Literal(part.to_string()))
}

fn param_name(part: &str) -> Option<&str> {
    let inner = part.strip_prefix('{')?.strip_suffix('}')?;
    Some(inner.strip_prefix('*').unwrap_or(inner))
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literals_params_and_wildcard() {
        let t = PathTemplate::parse("/api/{version}/files/{*rest}").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Literal("api".into()),
                Segment::Param("version".into()),
                Segment::Literal("files".into()),
                Segment::Wildcard("rest".into()),
            ]
        );
        assert_eq!(t.literal_prefix_len(), 1);
        assert_eq!(t.param_count(), 2);
        assert!(t.has_wildcard());
        assert_eq!(t.param_names().collect::<Vec<_>>(), vec!["version", "rest"]);
    }

    #[test]
    fn rejects_malformed_templates() {
        assert_eq!(
            PathTemplate::parse("api/items"),
            Err(TemplateError::MissingLeadingSlash)
        );
        for bad in ["/items/{}", "/items/{id", "/items/id}", "/items/x{id}", "/items/{a-b}", "/{*}"] {
            assert!(
                matches!(PathTemplate::parse(bad), Err(TemplateError::MalformedSegment(_))),
                "{bad} should be malformed"
            );
        }
        assert_eq!(
            PathTemplate::parse("/{id}/{id}"),
            Err(TemplateError::DuplicateParam("id".into()))
        );
        assert_eq!(
            PathTemplate::parse("/{*rest}/tail"),
            Err(TemplateError::WildcardNotLast("rest".into()))
        );
    }

    #[test]
    fn shape_ignores_parameter_names() {
        let a = PathTemplate::parse("/users/{id}").unwrap();
        let b = PathTemplate::parse("/users/{uid}/").unwrap();
        assert_eq!(a.shape(), b.shape());
        assert_eq!(PathTemplate::parse("/").unwrap().shape(), "/");
    }

    #[test]
    fn renders_downstream_paths() {
        let mut params = PathParams::new();
        params.push("id", "42");
        params.push("rest", "a/b/c");

        let t = PathTemplate::parse("/items/{id}").unwrap();
        assert_eq!(t.render(&params), "/items/42");

        let t = PathTemplate::parse("/blobs/{*rest}").unwrap();
        assert_eq!(t.render(&params), "/blobs/a/b/c");

        let t = PathTemplate::parse("/collection/").unwrap();
        assert_eq!(t.render(&params), "/collection/");

        let t = PathTemplate::parse("/").unwrap();
        assert_eq!(t.render(&params), "/");
    }

    #[test]
    fn empty_wildcard_renders_without_dangling_slash() {
        let mut params = PathParams::new();
        params.push("rest", "");
        let t = PathTemplate::parse("/static/{*rest}").unwrap();
        assert_eq!(t.render(&params), "/static");
    }
}
