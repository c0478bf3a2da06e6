//! Auth-exempt endpoint matching
//!
//! A 401 from login, registration, OTP, password reset or the refresh call
//! itself means "bad credentials", not "expired token", so it must never
//! trigger a refresh. Matching is segment-wise against path templates:
//!
//! - the base URL's path prefix is stripped from the request path
//! - the query string and a trailing slash are ignored
//! - literal segments match exactly, `:name` matches one non-empty segment

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// One compiled path template (e.g. `/auth/verify-otp/:id`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPattern {
    template: String,
    segments: Vec<Segment>,
}

impl EndpointPattern {
    #[must_use]
    pub fn new(template: &str) -> Self {
        let segments = split_segments(strip_query(template))
            .map(|segment| match segment.strip_prefix(':') {
                Some(_) => Segment::Param,
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self { template: template.to_string(), segments }
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match an already normalised path
    fn matches_segments(&self, path: &[&str]) -> bool {
        self.segments.len() == path.len()
            && self.segments.iter().zip(path).all(|(pattern, actual)| match pattern {
                Segment::Literal(literal) => literal == actual,
                Segment::Param => !actual.is_empty(),
            })
    }
}

/// Set of endpoints whose 401 responses are propagated unchanged
#[derive(Debug, Clone, Default)]
pub struct ExemptSet {
    base_path: Vec<String>,
    patterns: Vec<EndpointPattern>,
}

impl ExemptSet {
    /// Compile `templates` relative to the base URL's path
    pub fn new<I, S>(base_url: &Url, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            base_path: split_segments(base_url.path()).map(str::to_string).collect(),
            patterns: templates.into_iter().map(|t| EndpointPattern::new(t.as_ref())).collect(),
        }
    }

    /// Whether `path` (relative, base-prefixed, or absolute URL) is exempt
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let path = match Url::parse(path) {
            Ok(url) => url.path().to_string(),
            Err(_) => strip_query(path).to_string(),
        };

        let segments: Vec<&str> = split_segments(&path).collect();
        let relative = self.strip_base(&segments);

        self.patterns.iter().any(|pattern| pattern.matches_segments(relative))
    }

    #[must_use]
    pub fn patterns(&self) -> &[EndpointPattern] {
        &self.patterns
    }

    fn strip_base<'a, 'b>(&self, segments: &'a [&'b str]) -> &'a [&'b str] {
        let prefixed = !self.base_path.is_empty()
            && segments.len() >= self.base_path.len()
            && self.base_path.iter().zip(segments).all(|(base, actual)| base == actual);
        if prefixed {
            &segments[self.base_path.len()..]
        } else {
            segments
        }
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or_default()
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exempt(base: &str, templates: &[&str]) -> ExemptSet {
        ExemptSet::new(&Url::parse(base).unwrap(), templates.iter().copied())
    }

    #[test]
    fn exact_and_trailing_slash() {
        let set = exempt("http://shop.test/api", &["/auth/login"]);
        assert!(set.matches("/auth/login"));
        assert!(set.matches("/auth/login/"));
        assert!(set.matches("auth/login"));
        assert!(!set.matches("/auth/login/extra"));
        assert!(!set.matches("/auth/logout"));
    }

    #[test]
    fn base_path_prefix_and_query_are_ignored() {
        let set = exempt("http://shop.test/api/", &["/auth/refresh-token"]);
        assert!(set.matches("/api/auth/refresh-token"));
        assert!(set.matches("/auth/refresh-token?source=web"));
        assert!(set.matches("http://shop.test/api/auth/refresh-token"));
        assert!(!set.matches("/v2/auth/refresh-token"));
    }

    #[test]
    fn param_segments_match_any_value() {
        let set = exempt("http://shop.test", &["/auth/reset-password/:token"]);
        assert!(set.matches("/auth/reset-password/abc123"));
        assert!(!set.matches("/auth/reset-password"));
        assert!(!set.matches("/auth/reset-password/abc/def"));
    }

    #[test]
    fn substring_does_not_match() {
        let set = exempt("http://shop.test", &["/auth/login"]);
        assert!(!set.matches("/users/auth/login-history"));
        assert!(!set.matches("/products"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        assert!(!ExemptSet::default().matches("/auth/login"));
    }
}
