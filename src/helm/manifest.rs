//! Inventory extraction from rendered release manifests
//!
//! A Helm manifest is a multi-document YAML stream. Inventory only needs
//! the identity of each rendered object: apiVersion, kind, namespace, name.
//! Documents without an identity (comments-only, null docs) are skipped.

use serde::Deserialize;

use crate::crd::HelmResourceStatus;

#[derive(Debug, Deserialize)]
struct ManifestDoc {
    #[serde(rename = "apiVersion")]
    api_version: Option<String>,
    kind: Option<String>,
    metadata: Option<ManifestMeta>,
}

#[derive(Debug, Deserialize)]
struct ManifestMeta {
    name: Option<String>,
    namespace: Option<String>,
}

/// Parse a rendered manifest into the child-resource inventory.
///
/// Unparseable documents are skipped rather than failing the whole
/// manifest: inventory is reporting, not enforcement.
pub fn parse_manifest(manifest: &str, default_namespace: &str) -> Vec<HelmResourceStatus> {
    let mut entries = Vec::new();

    for document in serde_yaml::Deserializer::from_str(manifest) {
        let doc = match ManifestDoc::deserialize(document) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable manifest document");
                continue;
            }
        };

        let (Some(api_version), Some(kind), Some(meta)) =
            (doc.api_version, doc.kind, doc.metadata)
        else {
            continue;
        };
        let Some(name) = meta.name else {
            continue;
        };

        entries.push(HelmResourceStatus {
            api_version,
            kind,
            namespace: meta
                .namespace
                .unwrap_or_else(|| default_namespace.to_string()),
            name,
        });
    }

    entries
}
