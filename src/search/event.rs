//! Records of the streamed search endpoint.

use serde::Deserialize;

use crate::api::SearchResult;

/// One `data:` record of `POST /api/search/progress`, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The search began over `total_sites` sites.
    Start {
        /// Number of sites that will be searched.
        total_sites: u32,
    },
    /// One more site finished.
    Progress {
        /// 1-based index of the site just searched.
        current_site: u32,
        /// Number of sites in this search.
        total_sites: u32,
        /// Server status text.
        #[serde(default)]
        message: Option<String>,
    },
    /// All sites were searched.
    Complete {
        /// Combined results, possibly empty.
        #[serde(default)]
        results: Vec<SearchResult>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_variants() {
        let start: ProgressEvent = serde_json::from_str(r#"{"type":"start","total_sites":3}"#).unwrap();
        assert_eq!(start, ProgressEvent::Start { total_sites: 3 });

        let progress: ProgressEvent = serde_json::from_str(
            r#"{"type":"progress","current_site":1,"total_sites":3,"message":"Searching 1 of 3 sites..."}"#,
        )
        .unwrap();
        assert!(matches!(
            progress,
            ProgressEvent::Progress { current_site: 1, total_sites: 3, message: Some(_) }
        ));

        let complete: ProgressEvent = serde_json::from_str(r#"{"type":"complete"}"#).unwrap();
        assert_eq!(complete, ProgressEvent::Complete { results: Vec::new() });
    }

    #[test]
    fn test_progress_event_rejects_unknown_type() {
        assert!(serde_json::from_str::<ProgressEvent>(r#"{"type":"heartbeat"}"#).is_err());
    }
}
