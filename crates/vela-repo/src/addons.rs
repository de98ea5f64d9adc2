//! Addon registries
//!
//! An HTTP registry serves an `index.yaml` listing every addon version and
//! its files; the files of a version live under `<url>/<name>/<version>/`.
//! A local registry is a directory with one sub-directory per addon holding
//! `metadata.yaml`, an optional `template.yaml` and `resources/`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use vela_core::{AddonFile, AddonMeta, AddonPackage};
use walkdir::WalkDir;

use crate::error::{RepoError, Result};
use crate::fetch::HttpFetcher;
use crate::registry::{Registry, RegistryConfig};

pub const INDEX_FILE: &str = "index.yaml";
pub const METADATA_FILE: &str = "metadata.yaml";
pub const TEMPLATE_FILE: &str = "template.yaml";
pub const RESOURCES_DIR: &str = "resources";

/// Registry index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonIndex {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Versions by addon name
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<AddonEntry>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

/// One version of an addon in an index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddonEntry {
    #[serde(default)]
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub description: String,

    /// Paths relative to the version directory
    #[serde(default)]
    pub files: Vec<String>,
}

/// Order versions by semver, non-semver versions last
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| Version::parse(v.trim_start_matches('v')).ok();
    match (parse(a), parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

impl AddonIndex {
    pub fn from_bytes(url: &str, data: &[u8]) -> Result<Self> {
        let mut index: AddonIndex = serde_yaml::from_slice(data).map_err(|e| RepoError::IndexParseError {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        for (name, versions) in index.entries.iter_mut() {
            for entry in versions.iter_mut() {
                if entry.name.is_empty() {
                    entry.name = name.clone();
                }
            }
            versions.sort_by(|a, b| compare_versions(&b.version, &a.version));
        }
        Ok(index)
    }

    /// Latest entry of an addon, or the given version
    pub fn select(&self, registry: &str, name: &str, version: Option<&str>) -> Result<&AddonEntry> {
        let versions = self
            .entries
            .get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RepoError::AddonNotFound {
                name: name.to_string(),
                registry: registry.to_string(),
            })?;
        match version {
            None => Ok(&versions[0]),
            Some(wanted) => {
                let wanted = wanted.trim_start_matches('v');
                versions
                    .iter()
                    .find(|e| e.version.trim_start_matches('v') == wanted)
                    .ok_or_else(|| RepoError::AddonVersionNotFound {
                        name: name.to_string(),
                        version: wanted.to_string(),
                        registry: registry.to_string(),
                        available: versions.iter().map(|e| e.version.as_str()).collect::<Vec<_>>().join(", "),
                    })
            }
        }
    }
}

/// An addon as listed by a registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddonSummary {
    pub name: String,
    pub registry: String,
    pub description: String,
    /// Newest first
    pub versions: Vec<String>,
}

/// Reads addons from one registry
pub struct RegistryClient {
    registry: Registry,
    http: HttpFetcher,
}

impl RegistryClient {
    pub fn new(registry: Registry) -> Result<Self> {
        let http = HttpFetcher::new()?.with_token(registry.token.clone());
        Ok(Self { registry, http })
    }

    pub fn name(&self) -> &str {
        &self.registry.name
    }

    fn base_url(&self) -> &str {
        self.registry.url.trim_end_matches('/')
    }

    async fn index(&self) -> Result<AddonIndex> {
        let url = format!("{}/{}", self.base_url(), INDEX_FILE);
        let data = self.http.get(&url).await?;
        AddonIndex::from_bytes(&url, &data)
    }

    /// Addons available in the registry, sorted by name
    pub async fn list(&self) -> Result<Vec<AddonSummary>> {
        match self.registry.local_path() {
            Some(dir) => list_local(&self.registry.name, &dir),
            None => {
                let index = self.index().await?;
                Ok(index
                    .entries
                    .iter()
                    .filter(|(_, versions)| !versions.is_empty())
                    .map(|(name, versions)| AddonSummary {
                        name: name.clone(),
                        registry: self.registry.name.clone(),
                        description: versions[0].description.clone(),
                        versions: versions.iter().map(|e| e.version.clone()).collect(),
                    })
                    .collect())
            }
        }
    }

    /// Fetch an addon package, the latest version unless one is given
    pub async fn fetch(&self, name: &str, version: Option<&str>) -> Result<AddonPackage> {
        let mut package = match self.registry.local_path() {
            Some(dir) => read_local(&self.registry.name, &dir.join(name), name, version)?,
            None => self.fetch_http(name, version).await?,
        };
        package.registry = self.registry.name.clone();
        if package.meta.name.is_empty() {
            package.meta.name = name.to_string();
        }
        tracing::debug!(addon = %name, version = %package.meta.version, registry = %package.registry, "fetched addon");
        Ok(package)
    }

    async fn fetch_http(&self, name: &str, version: Option<&str>) -> Result<AddonPackage> {
        let index = self.index().await?;
        let entry = index.select(&self.registry.name, name, version)?;
        let base = format!("{}/{}/{}", self.base_url(), name, entry.version);

        let mut files = Vec::new();
        for path in &entry.files {
            let data = self.http.get(&format!("{}/{}", base, path)).await?;
            files.push(AddonFile {
                path: path.clone(),
                content: String::from_utf8_lossy(&data).into_owned(),
            });
        }
        let mut package = package_from_files(name, files)?;
        if package.meta.version.is_empty() {
            package.meta.version = entry.version.clone();
        }
        Ok(package)
    }
}

/// Fetch an addon from the named registry, or from the first registry that has it
pub async fn fetch_addon(
    config: &RegistryConfig,
    name: &str,
    version: Option<&str>,
    registry: Option<&str>,
) -> Result<AddonPackage> {
    if let Some(registry) = registry {
        return RegistryClient::new(config.get(registry)?.clone())?.fetch(name, version).await;
    }
    let mut last_error = None;
    for registry in &config.registries {
        match RegistryClient::new(registry.clone())?.fetch(name, version).await {
            Ok(package) => return Ok(package),
            Err(e) if e.is_not_found() => {
                tracing::debug!(addon = %name, registry = %registry.name, "not in registry: {}", e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_error.unwrap_or_else(|| RepoError::AddonNotFound {
        name: name.to_string(),
        registry: "<none>".to_string(),
    }))
}

fn package_from_files(name: &str, files: Vec<AddonFile>) -> Result<AddonPackage> {
    let mut meta = None;
    let mut template = None;
    let mut resources = Vec::new();
    for file in files {
        match file.path.as_str() {
            METADATA_FILE => meta = Some(AddonMeta::from_yaml(&file.content)?),
            TEMPLATE_FILE => template = Some(file),
            path if path.starts_with(&format!("{}/", RESOURCES_DIR)) && is_yaml(path) => resources.push(file),
            path => tracing::debug!(addon = %name, %path, "ignoring addon file"),
        }
    }
    let meta = meta.ok_or_else(|| RepoError::InvalidAddon {
        name: name.to_string(),
        message: format!("missing {}", METADATA_FILE),
    })?;
    resources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(AddonPackage {
        meta,
        registry: String::new(),
        template,
        resources,
    })
}

fn is_yaml(path: &str) -> bool {
    path.ends_with(".yaml") || path.ends_with(".yml")
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| RepoError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn read_local(registry: &str, dir: &Path, name: &str, version: Option<&str>) -> Result<AddonPackage> {
    if !dir.join(METADATA_FILE).is_file() {
        return Err(RepoError::AddonNotFound {
            name: name.to_string(),
            registry: registry.to_string(),
        });
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| RepoError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(AddonFile {
            content: read_file(entry.path())?,
            path,
        });
    }
    let package = package_from_files(name, files)?;
    if let Some(wanted) = version {
        let wanted = wanted.trim_start_matches('v');
        if package.meta.version.trim_start_matches('v') != wanted {
            return Err(RepoError::AddonVersionNotFound {
                name: name.to_string(),
                version: wanted.to_string(),
                registry: registry.to_string(),
                available: package.meta.version.clone(),
            });
        }
    }
    Ok(package)
}

fn list_local(registry: &str, dir: &Path) -> Result<Vec<AddonSummary>> {
    let entries = std::fs::read_dir(dir).map_err(|source| RepoError::Read {
        path: dir.display().to_string(),
        source,
    })?;
    let mut addons = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let metadata = path.join(METADATA_FILE);
        if !metadata.is_file() {
            continue;
        }
        let meta = AddonMeta::from_yaml(&read_file(&metadata)?)?;
        let name = if meta.name.is_empty() {
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        } else {
            meta.name.clone()
        };
        addons.push(AddonSummary {
            name,
            registry: registry.to_string(),
            description: meta.description,
            versions: vec![meta.version],
        });
    }
    addons.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(addons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INDEX: &str = r#"
apiVersion: v1
entries:
  fluxcd:
    - version: 2.1.0
      description: Extended workload to do continuous and progressive delivery
      files: [metadata.yaml, template.yaml]
    - version: 2.3.0
      description: Extended workload to do continuous and progressive delivery
      files: [metadata.yaml, template.yaml, resources/helm.yaml, README.md]
  velaux:
    - version: v1.9.4
      description: KubeVela User Experience
      files: [metadata.yaml]
"#;

    const META: &str = "name: fluxcd\nversion: 2.3.0\ndescription: flux\n";

    async fn registry_server() -> MockServer {
        let server = MockServer::start().await;
        let files = [
            ("/index.yaml", INDEX),
            ("/fluxcd/2.3.0/metadata.yaml", META),
            ("/fluxcd/2.3.0/template.yaml", "kind: Application\n"),
            ("/fluxcd/2.3.0/resources/helm.yaml", "kind: HelmRepository\n"),
            ("/fluxcd/2.3.0/README.md", "# flux\n"),
        ];
        for (route, body) in files {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }
        server
    }

    #[test]
    fn test_index_sorted_newest_first() {
        let index = AddonIndex::from_bytes("mem", INDEX.as_bytes()).unwrap();
        let flux = &index.entries["fluxcd"];
        assert_eq!(flux[0].version, "2.3.0");
        assert_eq!(flux[0].name, "fluxcd");

        assert_eq!(index.select("r", "fluxcd", None).unwrap().version, "2.3.0");
        assert_eq!(index.select("r", "fluxcd", Some("v2.1.0")).unwrap().version, "2.1.0");
        assert_eq!(index.select("r", "velaux", Some("1.9.4")).unwrap().version, "v1.9.4");

        let err = index.select("r", "fluxcd", Some("9.9.9")).unwrap_err();
        assert!(err.to_string().contains("available: 2.3.0, 2.1.0"));
        assert!(index.select("r", "nope", None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("v1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("latest", "0.1.0"), Ordering::Less);
    }

    #[tokio::test]
    async fn test_http_registry() {
        let server = registry_server().await;
        let client = RegistryClient::new(Registry::new("test", server.uri()).unwrap()).unwrap();

        let addons = client.list().await.unwrap();
        assert_eq!(addons.len(), 2);
        assert_eq!(addons[0].name, "fluxcd");
        assert_eq!(addons[0].versions, vec!["2.3.0", "2.1.0"]);

        let package = client.fetch("fluxcd", None).await.unwrap();
        assert_eq!(package.registry, "test");
        assert_eq!(package.meta.version, "2.3.0");
        assert!(package.template.is_some());
        assert_eq!(package.resources.len(), 1);
        assert_eq!(package.resources[0].path, "resources/helm.yaml");
    }

    #[tokio::test]
    async fn test_fetch_from_any_registry() {
        let server = registry_server().await;
        let empty = TempDir::new().unwrap();
        let config = RegistryConfig {
            registries: vec![
                Registry::new("local", empty.path().to_str().unwrap()).unwrap(),
                Registry::new("remote", server.uri()).unwrap(),
            ],
        };

        let package = fetch_addon(&config, "fluxcd", None, None).await.unwrap();
        assert_eq!(package.registry, "remote");

        let err = fetch_addon(&config, "fluxcd", None, Some("local")).await.unwrap_err();
        assert!(matches!(err, RepoError::AddonNotFound { .. }));
        let err = fetch_addon(&config, "fluxcd", None, Some("missing")).await.unwrap_err();
        assert!(matches!(err, RepoError::RegistryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_local_registry() {
        let dir = TempDir::new().unwrap();
        let addon = dir.path().join("redis");
        std::fs::create_dir_all(addon.join("resources").join("nested")).unwrap();
        std::fs::write(addon.join("metadata.yaml"), "name: redis\nversion: 0.1.0\ndescription: cache\n").unwrap();
        std::fs::write(addon.join("resources").join("b.yaml"), "kind: B\n").unwrap();
        std::fs::write(addon.join("resources").join("nested").join("a.yml"), "kind: A\n").unwrap();
        std::fs::write(addon.join("resources").join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir_all(dir.path().join("not-an-addon")).unwrap();

        let client = RegistryClient::new(Registry::new("local", dir.path().to_str().unwrap()).unwrap()).unwrap();
        let addons = client.list().await.unwrap();
        assert_eq!(addons.len(), 1);
        assert_eq!(addons[0].versions, vec!["0.1.0"]);

        let package = client.fetch("redis", Some("v0.1.0")).await.unwrap();
        assert!(package.template.is_none());
        let paths: Vec<_> = package.resources.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["resources/b.yaml", "resources/nested/a.yml"]);

        assert!(client.fetch("redis", Some("0.2.0")).await.is_err());
    }

    #[test]
    fn test_missing_metadata() {
        let err = package_from_files(
            "broken",
            vec![AddonFile {
                path: TEMPLATE_FILE.to_string(),
                content: String::new(),
            }],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid addon broken: missing metadata.yaml");
    }
}
