//! External plate lookup, consulted when the local registry has no record.
//!
//! Resolvers are best-effort and non-authoritative: callers treat any error
//! as "not found".

use std::{collections::HashMap, sync::Mutex, time::Duration};

use {
    async_trait::async_trait,
    carlink_common::Tag,
    reqwest::StatusCode,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{Error, Result};

/// What an external source knows about a plate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalPlate {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub allow_direct: bool,
}

#[async_trait]
pub trait ExternalResolver: Send + Sync {
    async fn lookup(&self, tag: &Tag) -> Result<Option<ExternalPlate>>;
}

/// Resolver used when no external source is configured.
pub struct NoopResolver;

#[async_trait]
impl ExternalResolver for NoopResolver {
    async fn lookup(&self, _tag: &Tag) -> Result<Option<ExternalPlate>> {
        Ok(None)
    }
}

/// Fixed lookup table. Plates listed in `failing` return an error.
#[derive(Default)]
pub struct StaticResolver {
    plates: Mutex<HashMap<Tag, ExternalPlate>>,
    failing: Mutex<Vec<Tag>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plate(self, tag: Tag, plate: ExternalPlate) -> Self {
        self.plates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tag, plate);
        self
    }

    pub fn with_failure(self, tag: Tag) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tag);
        self
    }
}

#[async_trait]
impl ExternalResolver for StaticResolver {
    async fn lookup(&self, tag: &Tag) -> Result<Option<ExternalPlate>> {
        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(tag)
        {
            return Err(Error::message(format!("static resolver: lookup of {tag} failed")));
        }
        let plates = self.plates.lock().unwrap_or_else(|e| e.into_inner());
        Ok(plates.get(tag).cloned())
    }
}

/// HTTP JSON resolver: `GET {base_url}/plates/{tag}`.
///
/// `200` with an [`ExternalPlate`] body is a hit, `404` a miss; anything else
/// is an error.
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl HttpResolver {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<Secret<String>>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url_for(&self, tag: &Tag) -> String {
        format!("{}/plates/{}", self.base_url, tag)
    }
}

#[async_trait]
impl ExternalResolver for HttpResolver {
    async fn lookup(&self, tag: &Tag) -> Result<Option<ExternalPlate>> {
        let url = self.url_for(tag);
        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%tag, %status, "external resolver responded");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::message(format!(
                "external resolver returned {status} for {tag}"
            )));
        }
        Ok(Some(response.json::<ExternalPlate>().await?))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Tag {
        Tag::parse(s).unwrap()
    }

    fn resolver(server: &mockito::Server, key: Option<&str>) -> HttpResolver {
        HttpResolver::new(
            format!("{}/", server.url()),
            key.map(|k| Secret::new(k.to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn http_hit_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/plates/AB123")
            .match_header("authorization", "Bearer secret-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"display_name":"Ivan","allow_direct":true}"#)
            .create_async()
            .await;

        let found = resolver(&server, Some("secret-key"))
            .lookup(&tag("ab 123"))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(
            found,
            Some(ExternalPlate {
                display_name: Some("Ivan".into()),
                phone: None,
                allow_direct: true,
            })
        );
    }

    #[tokio::test]
    async fn http_404_is_miss() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/plates/ZZ9")
            .with_status(404)
            .create_async()
            .await;

        let found = resolver(&server, None).lookup(&tag("ZZ9")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn http_server_error_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/plates/ZZ9")
            .with_status(503)
            .create_async()
            .await;

        assert!(resolver(&server, None).lookup(&tag("ZZ9")).await.is_err());
    }

    #[tokio::test]
    async fn http_garbage_body_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/plates/ZZ9")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        assert!(resolver(&server, None).lookup(&tag("ZZ9")).await.is_err());
    }

    #[tokio::test]
    async fn static_resolver_hits_misses_and_fails() {
        let resolver = StaticResolver::new()
            .with_plate(tag("A1"), ExternalPlate::default())
            .with_failure(tag("B2"));
        assert!(resolver.lookup(&tag("A1")).await.unwrap().is_some());
        assert!(resolver.lookup(&tag("C3")).await.unwrap().is_none());
        assert!(resolver.lookup(&tag("B2")).await.is_err());
        assert!(NoopResolver.lookup(&tag("A1")).await.unwrap().is_none());
    }
}
