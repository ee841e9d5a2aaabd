//! Lambda-backed custom resources bundled with request-driven services.

use std::collections::BTreeMap;

use crate::ports::{ArtifactUploader, NamedBinary};

/// A custom resource handler shipped inside the binary.
#[derive(Debug, Clone, Copy)]
pub struct CustomResource {
    /// Logical name referenced by the stack.
    pub name: &'static str,
    dir: &'static str,
    source: &'static str,
}

impl CustomResource {
    /// Object key of the zipped handler.
    pub fn artifact_key(&self) -> String {
        format!("manual/scripts/custom-resources/{}/index.zip", self.dir)
    }

    fn files(&self) -> Vec<NamedBinary> {
        vec![NamedBinary {
            name: "index.js".to_string(),
            content: self.source.as_bytes().to_vec(),
        }]
    }
}

/// Handlers a request-driven service with an alias needs.
pub const REQUEST_DRIVEN_CUSTOM_RESOURCES: &[CustomResource] = &[
    CustomResource {
        name: "CustomDomainFunction",
        dir: "custom-domain",
        source: include_str!("../custom-resources/custom-domain/index.js"),
    },
    CustomResource {
        name: "DNSDelegationFunction",
        dir: "dns-delegation",
        source: include_str!("../custom-resources/dns-delegation/index.js"),
    },
];

/// Zip and upload every request-driven handler, returning URLs by resource name.
pub async fn upload_request_driven<U>(uploader: &U, bucket: &str) -> anyhow::Result<BTreeMap<String, String>>
where
    U: ArtifactUploader + ?Sized,
{
    let mut urls = BTreeMap::new();
    for resource in REQUEST_DRIVEN_CUSTOM_RESOURCES {
        let url = uploader
            .zip_and_upload(bucket, &resource.artifact_key(), &resource.files())
            .await?;
        tracing::debug!(resource = resource.name, url = %url, "uploaded custom resource");
        urls.insert(resource.name.to_string(), url);
    }
    Ok(urls)
}
