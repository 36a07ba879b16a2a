// Target location resolution.
//
// A target may carry a location URL copied from the remote app. Two URL
// shapes are recognised (host, query and fragment are ignored):
//
//   document: /{workspace}/v/dc/{doc}[/{page}]
//   space:    /{workspace}/v/s/{space}   or   /{workspace}/v/o/s/{space}
//
// URL-derived identifiers only back-fill fields the caller left unset.
// An unparseable URL resolves to nothing; missing identifiers surface later,
// when the job runs.

use url::Url;

use crate::types::TargetLocation;

/// Identifiers recovered from a location URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlShape {
    Document { workspace_id: String, doc_id: String, page_id: Option<String> },
    Space { workspace_id: String, space_id: String },
}

/// Fully merged identifiers for a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub workspace_id: Option<String>,
    pub space_id: Option<String>,
    pub doc_id: Option<String>,
    pub parent_page_id: Option<String>,
}

/// Where the page tree goes once identifiers are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Add pages to an existing document, optionally beneath a page.
    Append { doc_id: String, parent_page_id: Option<String> },
    /// Create a new document inside a space.
    Create { space_id: String },
    /// Neither a document nor a space is known.
    Unresolved,
}

impl ResolvedTarget {
    pub fn placement(&self) -> Placement {
        match (&self.doc_id, &self.space_id) {
            (Some(doc_id), _) => Placement::Append {
                doc_id: doc_id.clone(),
                parent_page_id: self.parent_page_id.clone(),
            },
            (None, Some(space_id)) => Placement::Create { space_id: space_id.clone() },
            (None, None) => Placement::Unresolved,
        }
    }
}

impl TargetLocation {
    /// Merge explicit identifiers with those parsed from `url`.
    pub fn resolve(&self) -> ResolvedTarget {
        let mut resolved = ResolvedTarget {
            workspace_id: self.workspace_id.clone(),
            space_id: self.space_id.clone(),
            doc_id: self.doc_id.clone(),
            parent_page_id: self.parent_page_id.clone(),
        };

        match self.url.as_deref().and_then(parse_location_url) {
            Some(UrlShape::Document { workspace_id, doc_id, page_id }) => {
                resolved.workspace_id.get_or_insert(workspace_id);
                resolved.doc_id.get_or_insert(doc_id);
                if resolved.parent_page_id.is_none() {
                    resolved.parent_page_id = page_id;
                }
            }
            Some(UrlShape::Space { workspace_id, space_id }) => {
                resolved.workspace_id.get_or_insert(workspace_id);
                resolved.space_id.get_or_insert(space_id);
            }
            None => {}
        }

        resolved
    }
}

/// Parse a location URL into one of the recognised shapes.
pub fn parse_location_url(raw: &str) -> Option<UrlShape> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let url = Url::parse(raw).or_else(|_| Url::parse(&format!("https://{raw}"))).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let view_index = segments.iter().position(|segment| *segment == "v")?;
    let workspace_id = segments.get(view_index.checked_sub(1)?)?.to_string();
    let rest = &segments[view_index + 1..];

    match rest {
        ["dc", doc_id, tail @ ..] => Some(UrlShape::Document {
            workspace_id,
            doc_id: doc_id.to_string(),
            page_id: tail.first().map(|page| page.to_string()),
        }),
        ["s", space_id, ..] | ["o", "s", space_id, ..] => {
            Some(UrlShape::Space { workspace_id, space_id: space_id.to_string() })
        }
        _ => None,
    }
}
