//! Address derivation for self-describing manifests.

use serde::Deserialize;

use crate::address::{DEFAULT_API_PATH, DEFAULT_NAMESPACE, ResourceAddress};
use crate::error::ReconcilerError;
use crate::models::Encoding;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestHeader {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: ManifestMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
}

pub(crate) fn address_of(
    content: &[u8],
    encoding: Encoding,
) -> Result<ResourceAddress, ReconcilerError> {
    let header: ManifestHeader = match encoding {
        Encoding::Json => serde_json::from_slice(content)
            .map_err(|e| ReconcilerError::InvalidDocument(e.to_string()))?,
        Encoding::Yaml => {
            let text = std::str::from_utf8(content)
                .map_err(|e| ReconcilerError::InvalidDocument(e.to_string()))?;
            serde_saphyr::from_str(text)
                .map_err(|e| ReconcilerError::InvalidDocument(e.to_string()))?
        }
    };

    if header.kind.is_empty() {
        return Err(ReconcilerError::InvalidDocument(
            "kind is not specified".to_owned(),
        ));
    }
    if header.metadata.name.is_empty() {
        return Err(ReconcilerError::InvalidDocument(
            "metadata.name is not specified".to_owned(),
        ));
    }

    let namespace = if header.metadata.namespace.is_empty() {
        DEFAULT_NAMESPACE.to_owned()
    } else {
        header.metadata.namespace
    };

    Ok(ResourceAddress::new(
        api_path_for(&header.api_version),
        namespace,
        collection_for_kind(&header.kind),
        header.metadata.name,
    ))
}

fn api_path_for(api_version: &str) -> String {
    let api_version = api_version.trim_matches('/');
    if api_version.is_empty() || api_version == "v1" {
        DEFAULT_API_PATH.to_owned()
    } else {
        format!("apis/{api_version}")
    }
}

/// Lowercased plural of a kind, e.g. `NetworkPolicy` -> `networkpolicies`.
fn collection_for_kind(kind: &str) -> String {
    let lower = kind.to_ascii_lowercase();

    if lower == "endpoints" {
        return lower;
    }
    if let Some(stem) = lower.strip_suffix('y')
        && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
    {
        return format!("{stem}ies");
    }
    if lower.ends_with('s') || lower.ends_with('x') {
        return format!("{lower}es");
    }
    format!("{lower}s")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn yaml_manifest_in_core_group() {
        let yaml = "apiVersion: v1\nkind: Service\nmetadata:\n  name: db\n  namespace: data\nspec: {}\n";
        let addr = address_of(yaml.as_bytes(), Encoding::Yaml).unwrap();
        assert_eq!(addr.resource_path(), "api/v1/namespaces/data/services/db");
    }

    #[test]
    fn json_manifest_in_named_group_defaults_namespace() {
        let json = r#"{"apiVersion":"apps/v1","kind":"Deployment","metadata":{"name":"web"}}"#;
        let addr = address_of(json.as_bytes(), Encoding::Json).unwrap();
        assert_eq!(
            addr.resource_path(),
            "apis/apps/v1/namespaces/default/deployments/web"
        );
    }

    #[test]
    fn namespace_manifest_is_global() {
        let yaml = "kind: Namespace\nmetadata:\n  name: team-a\n";
        let addr = address_of(yaml.as_bytes(), Encoding::Yaml).unwrap();
        assert_eq!(addr.resource_path(), "api/v1/namespaces/team-a");
    }

    #[test]
    fn missing_kind_or_name_is_rejected() {
        let no_kind = "metadata:\n  name: x\n";
        let no_name = "kind: Pod\nmetadata: {}\n";
        assert!(matches!(
            address_of(no_kind.as_bytes(), Encoding::Yaml),
            Err(ReconcilerError::InvalidDocument(m)) if m.contains("kind")
        ));
        assert!(matches!(
            address_of(no_name.as_bytes(), Encoding::Yaml),
            Err(ReconcilerError::InvalidDocument(m)) if m.contains("name")
        ));
    }

    #[test]
    fn kind_pluralization() {
        assert_eq!(collection_for_kind("Pod"), "pods");
        assert_eq!(collection_for_kind("NetworkPolicy"), "networkpolicies");
        assert_eq!(collection_for_kind("Ingress"), "ingresses");
        assert_eq!(collection_for_kind("Gateway"), "gateways");
        assert_eq!(collection_for_kind("Endpoints"), "endpoints");
    }
}
