//! Reading input files from local paths, URLs or stdin

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use url::Url;

use crate::error::{RepoError, Result};

/// Reference naming standard input
pub const STDIN: &str = "-";

/// Where an input comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    Url(Url),
    Path(PathBuf),
}

impl Source {
    pub fn parse(reference: &str) -> Result<Self> {
        if reference == STDIN {
            return Ok(Source::Stdin);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = Url::parse(reference).map_err(|e| RepoError::InvalidConfig {
                message: format!("invalid URL {}: {}", reference, e),
            })?;
            return Ok(Source::Url(url));
        }
        Ok(Source::Path(PathBuf::from(reference)))
    }
}

/// HTTP client shared by file fetching and registries
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("vela/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::NetworkError { message: e.to_string() })?;
        Ok(Self { client, token: None })
    }

    /// Send `token` as a bearer token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(%url, "fetching");
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Like `get`, `None` on 404
    pub async fn get_opt(&self, url: &str) -> Result<Option<Vec<u8>>> {
        match self.get(url).await {
            Ok(data) => Ok(Some(data)),
            Err(RepoError::HttpError { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Read the content of a file reference
pub async fn read_source(reference: &str) -> Result<Vec<u8>> {
    match Source::parse(reference)? {
        Source::Stdin => {
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            Ok(data)
        }
        Source::Url(url) => HttpFetcher::new()?.get(url.as_str()).await,
        Source::Path(path) => tokio::fs::read(&path).await.map_err(|source| RepoError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Read several file references in order
pub async fn read_sources(references: &[String]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::with_capacity(references.len());
    for reference in references {
        files.push((reference.clone(), read_source(reference).await?));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_source() {
        assert_eq!(Source::parse("-").unwrap(), Source::Stdin);
        assert!(matches!(Source::parse("https://example.com/app.yaml").unwrap(), Source::Url(_)));
        assert_eq!(
            Source::parse("./app.yaml").unwrap(),
            Source::Path(PathBuf::from("./app.yaml"))
        );
    }

    #[tokio::test]
    async fn test_read_local_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.yaml");
        std::fs::write(&file, "kind: Application\n").unwrap();

        let data = read_source(file.to_str().unwrap()).await.unwrap();
        assert_eq!(data, b"kind: Application\n");

        let err = read_source(dir.path().join("missing.yaml").to_str().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[tokio::test]
    async fn test_read_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("kind: Application\n"))
            .mount(&server)
            .await;

        let files = read_sources(&[format!("{}/app.yaml", server.uri())]).await.unwrap();
        assert_eq!(files[0].1, b"kind: Application\n");

        let err = read_source(&format!("{}/other.yaml", server.uri())).await.unwrap_err();
        assert!(matches!(err, RepoError::HttpError { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap().with_token(Some("s3cret".to_string()));
        assert_eq!(fetcher.get(&format!("{}/private", server.uri())).await.unwrap(), b"ok");
        assert!(
            HttpFetcher::new()
                .unwrap()
                .get_opt(&format!("{}/private", server.uri()))
                .await
                .unwrap()
                .is_none()
        );
    }
}
