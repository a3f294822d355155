//! Request target: a parsed URI plus a rewritable path-segment view.

use http::Uri;

/// The target of a request.
///
/// URI parsing itself is delegated to [`http::Uri`]; this type adds the
/// decomposed path-segment list that the router consumes and rewrites.
/// An absolute path keeps its leading empty segment, so `/hello.txt`
/// decomposes to `["", "hello.txt"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    uri: Uri,
    segments: Vec<String>,
}

impl Target {
    /// Parses the raw target text from a request line.
    pub fn parse(raw: &str) -> Result<Self, http::uri::InvalidUri> {
        let uri: Uri = raw.parse()?;
        let segments = split_path(uri.path());
        Ok(Self { uri, segments })
    }

    /// Host component of the target, when the target is in absolute
    /// form. Origin-form targets (`/path`) have no host.
    pub fn host(&self) -> Option<&str> {
        self.uri.host()
    }

    /// Path segments, including the leading empty segment of an
    /// absolute path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Replaces the path segments. Used by the dispatcher to hand a
    /// resource handler only the residual path below its mount point.
    pub fn set_segments(&mut self, segments: Vec<String>) {
        self.segments = segments;
    }

    /// The current path, re-joined from the segments.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// The underlying parsed URI, as received (unaffected by segment
    /// rewrites).
    pub fn as_uri(&self) -> &Uri {
        &self.uri
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            uri: Uri::from_static("/"),
            segments: split_path("/"),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

fn split_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('/').map(str::to_string).collect()
}
