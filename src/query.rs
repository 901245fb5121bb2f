//! Plugin query endpoint for annotation writes from the visualization GUI.
//!
//! One request kind is supported: `set_annotations`, which overwrites a
//! session's annotation bundle wholesale. Paths arrive either as
//! `rtcshare://`-scheme references or `$dir`-relative shorthand that
//! expands against the configured directory before scheme validation.
//! Anything else is rejected with no partial write.

use crate::annotations::AnnotationBundle;
use crate::error::{ChitterError, Result};
use serde::Deserialize;
use serde_json::json;
use std::path::{Component, Path};

const SCHEME: &str = "rtcshare://";
const DIR_PLACEHOLDER: &str = "$dir";

#[derive(Debug, Deserialize)]
struct SetAnnotationsRequest {
    project_path: String,
    session_id: String,
    annotations: AnnotationBundle,
}

/// Handle one JSON query against a share root.
///
/// `dir` is the scheme-qualified directory `$dir` expands to. Returns the
/// response document on success.
pub fn handle_query(
    query: &serde_json::Value,
    dir: &str,
    share_root: &Path,
) -> Result<serde_json::Value> {
    let query_type = query
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    if query_type != "set_annotations" {
        return Err(ChitterError::UnexpectedQueryType {
            query_type: query_type.to_string(),
        });
    }
    let request: SetAnnotationsRequest = serde_json::from_value(query.clone())?;

    let project_path = match request.project_path.strip_prefix(DIR_PLACEHOLDER) {
        Some(rest) => format!("{dir}/{}", rest.trim_start_matches('/')),
        None => request.project_path.clone(),
    };
    let relpath = project_path
        .strip_prefix(SCHEME)
        .ok_or_else(|| ChitterError::MalformedQueryPath {
            path: request.project_path.clone(),
        })?;

    let relpath = Path::new(relpath.trim_start_matches('/'));
    // The share root is a boundary: no parent traversal, no absolute paths.
    let escapes = relpath
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ChitterError::MalformedQueryPath {
            path: request.project_path.clone(),
        });
    }

    // The session id names one directory under the project; anything that
    // is not a single normal path component can escape the share root.
    let mut session_components = Path::new(&request.session_id).components();
    if !matches!(
        (session_components.next(), session_components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(ChitterError::MalformedQueryPath {
            path: request.session_id.clone(),
        });
    }

    let session_dir = share_root.join(relpath).join(&request.session_id);
    if !session_dir.is_dir() {
        return Err(ChitterError::NotADirectory { path: session_dir });
    }
    request.annotations.save(&session_dir)?;
    Ok(json!({"success": true}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn annotations_json() -> serde_json::Value {
        json!({
            "samplingFrequency": 1000.0,
            "vocalizations": [
                {"vocalizationId": "auto-0", "startFrame": 5, "endFrame": 40, "labels": ["auto"]}
            ]
        })
    }

    fn share_with_session() -> (TempDir, String) {
        let share = TempDir::new().unwrap();
        fs::create_dir_all(share.path().join("proj").join("s1")).unwrap();
        (share, "proj".to_string())
    }

    #[test]
    fn set_annotations_overwrites_bundle() {
        let (share, proj) = share_with_session();
        let query = json!({
            "type": "set_annotations",
            "project_path": format!("rtcshare://{proj}"),
            "session_id": "s1",
            "annotations": annotations_json(),
        });
        let response = handle_query(&query, "rtcshare://base", share.path()).unwrap();
        assert_eq!(response, json!({"success": true}));

        let written = AnnotationBundle::load(&share.path().join("proj").join("s1")).unwrap();
        assert_eq!(written.sampling_frequency, 1000.0);
        assert_eq!(written.vocalizations.len(), 1);
        assert_eq!(written.vocalizations[0].vocalization_id, "auto-0");
    }

    #[test]
    fn dir_placeholder_expands_before_scheme_check() {
        let (share, _) = share_with_session();
        let query = json!({
            "type": "set_annotations",
            "project_path": "$dir/proj",
            "session_id": "s1",
            "annotations": annotations_json(),
        });
        let response = handle_query(&query, "rtcshare://", share.path()).unwrap();
        assert_eq!(response["success"], true);
        assert!(share.path().join("proj/s1/annotations.json").exists());
    }

    #[test]
    fn rejects_foreign_scheme_without_writing() {
        let (share, _) = share_with_session();
        let query = json!({
            "type": "set_annotations",
            "project_path": "file:///etc",
            "session_id": "s1",
            "annotations": annotations_json(),
        });
        let err = handle_query(&query, "rtcshare://base", share.path()).unwrap_err();
        assert!(matches!(err, ChitterError::MalformedQueryPath { .. }));
        assert!(!share.path().join("proj/s1/annotations.json").exists());
    }

    #[test]
    fn rejects_parent_traversal() {
        let (share, _) = share_with_session();
        let query = json!({
            "type": "set_annotations",
            "project_path": "rtcshare://../outside",
            "session_id": "s1",
            "annotations": annotations_json(),
        });
        let err = handle_query(&query, "rtcshare://base", share.path()).unwrap_err();
        assert!(matches!(err, ChitterError::MalformedQueryPath { .. }));
    }

    #[test]
    fn rejects_traversal_in_session_id() {
        let outer = TempDir::new().unwrap();
        let share = outer.path().join("share");
        fs::create_dir_all(share.join("proj").join("s1")).unwrap();
        // An existing directory outside the share root that a traversing
        // session id would resolve to.
        fs::create_dir(outer.path().join("victim")).unwrap();
        let query = json!({
            "type": "set_annotations",
            "project_path": "rtcshare://proj",
            "session_id": "../../victim",
            "annotations": annotations_json(),
        });
        let err = handle_query(&query, "rtcshare://base", &share).unwrap_err();
        assert!(matches!(err, ChitterError::MalformedQueryPath { .. }));
        assert!(!outer.path().join("victim").join("annotations.json").exists());
    }

    #[test]
    fn rejects_session_id_with_separator() {
        let (share, proj) = share_with_session();
        let query = json!({
            "type": "set_annotations",
            "project_path": format!("rtcshare://{proj}"),
            "session_id": "s1/nested",
            "annotations": annotations_json(),
        });
        let err = handle_query(&query, "rtcshare://base", share.path()).unwrap_err();
        assert!(matches!(err, ChitterError::MalformedQueryPath { .. }));
    }

    #[test]
    fn rejects_unknown_query_type() {
        let share = TempDir::new().unwrap();
        let query = json!({"type": "get_annotations"});
        let err = handle_query(&query, "rtcshare://base", share.path()).unwrap_err();
        assert!(matches!(
            err,
            ChitterError::UnexpectedQueryType { query_type } if query_type == "get_annotations"
        ));
    }

    #[test]
    fn rejects_missing_session_dir() {
        let (share, proj) = share_with_session();
        let query = json!({
            "type": "set_annotations",
            "project_path": format!("rtcshare://{proj}"),
            "session_id": "ghost",
            "annotations": annotations_json(),
        });
        let err = handle_query(&query, "rtcshare://base", share.path()).unwrap_err();
        assert!(matches!(err, ChitterError::NotADirectory { .. }));
    }
}
