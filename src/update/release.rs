use serde::Deserialize;
use tracing::debug;

use super::error::{Result, UpdateError};

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// The subset of a release-listing response the launcher relies on.
///
/// Shaped after the GitHub "latest release" payload; every other field in
/// the document is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(default)]
    pub tag_name: Option<String>,
    pub assets: Vec<Asset>,
}

impl ReleaseMetadata {
    /// Parse a metadata document. Anything without an `assets` array fails.
    pub fn parse(document: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(document)?;
        debug!(
            tag = metadata.tag_name.as_deref().unwrap_or("<untagged>"),
            assets = metadata.assets.len(),
            "Parsed release metadata"
        );
        Ok(metadata)
    }

    /// Download URL of the asset called exactly `name`.
    pub fn asset_url(&self, name: &str) -> Result<&str> {
        resolve_asset_url(self, name)
    }
}

/// Locate the download URL of `asset_name` in `metadata`.
///
/// Names are matched exactly. A release carrying the same name twice is
/// rejected rather than resolved by position.
pub fn resolve_asset_url<'a>(metadata: &'a ReleaseMetadata, asset_name: &str) -> Result<&'a str> {
    debug!(asset = asset_name, "Parsing asset url");

    let mut matches = metadata.assets.iter().filter(|asset| asset.name == asset_name);
    let asset = matches.next().ok_or_else(|| UpdateError::AssetNotFound {
        name: asset_name.to_string(),
    })?;

    let extra = matches.count();
    if extra > 0 {
        return Err(UpdateError::DuplicateAsset {
            name: asset_name.to_string(),
            count: extra + 1,
        });
    }

    debug!(url = %asset.download_url, "Parsed asset url");
    Ok(&asset.download_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::ErrorKind;

    const LATEST: &str = r#"{
        "url": "https://api.github.com/repos/acme/tool/releases/1",
        "tag_name": "v2.0.0",
        "draft": false,
        "assets": [
            {
                "name": "tool-win.exe",
                "size": 1024,
                "browser_download_url": "https://github.com/acme/tool/releases/download/v2.0.0/tool-win.exe"
            },
            {
                "name": "tool-win.exe.sig",
                "size": 300,
                "browser_download_url": "https://github.com/acme/tool/releases/download/v2.0.0/tool-win.exe.sig"
            }
        ]
    }"#;

    #[test]
    fn test_resolves_exact_names() {
        let metadata = ReleaseMetadata::parse(LATEST).unwrap();
        assert_eq!(metadata.tag_name.as_deref(), Some("v2.0.0"));

        assert_eq!(
            metadata.asset_url("tool-win.exe").unwrap(),
            "https://github.com/acme/tool/releases/download/v2.0.0/tool-win.exe"
        );
        assert_eq!(
            resolve_asset_url(&metadata, "tool-win.exe.sig").unwrap(),
            "https://github.com/acme/tool/releases/download/v2.0.0/tool-win.exe.sig"
        );
    }

    #[test]
    fn test_missing_asset_names_the_asset() {
        let metadata = ReleaseMetadata::parse(LATEST).unwrap();

        for name in ["tool-linux", "TOOL-WIN.EXE", "tool-win", ""] {
            let err = metadata.asset_url(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Resolution);
            assert_eq!(err.to_string(), format!("Asset {name} not found"));
        }
    }

    #[test]
    fn test_duplicate_asset_is_rejected() {
        let metadata = ReleaseMetadata {
            tag_name: None,
            assets: vec![
                Asset {
                    name: "tool".to_string(),
                    download_url: "https://a/tool".to_string(),
                },
                Asset {
                    name: "tool".to_string(),
                    download_url: "https://b/tool".to_string(),
                },
            ],
        };

        let err = metadata.asset_url("tool").unwrap_err();
        assert!(matches!(err, UpdateError::DuplicateAsset { count: 2, .. }));
    }

    #[test]
    fn test_empty_asset_list_resolves_nothing() {
        let metadata = ReleaseMetadata::parse(r#"{"assets": []}"#).unwrap();
        assert!(metadata.tag_name.is_none());
        assert!(matches!(metadata.asset_url("tool"), Err(UpdateError::AssetNotFound { .. })));
    }

    #[test]
    fn test_malformed_documents_fail_to_parse() {
        for document in [
            "not json",
            "[]",
            r#"{"message": "Not Found"}"#,
            r#"{"assets": {}}"#,
            r#"{"assets": [{"name": "tool"}]}"#,
        ] {
            let err = ReleaseMetadata::parse(document).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "document: {document}");
        }
    }
}
