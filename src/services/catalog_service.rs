//! Read access to the remote photo catalog.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    errors::CatalogError,
    models::{CatalogItem, PhotoRecord},
};

/// A paginated collection of photo records.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Total number of records. Zero is reported as [`CatalogError::Empty`].
    async fn count(&self) -> Result<usize, CatalogError>;

    async fn page(&self, offset: usize, limit: usize) -> Result<Vec<CatalogItem>, CatalogError>;
}

/// Number of pages needed to cover `count` items.
pub fn page_count(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1))
}

/// JSON catalog served over HTTP.
///
/// - `GET {base}/count` → `{"total": n}`
/// - `GET {base}?skip={offset}&limit={limit}` → `{"data": [..]}`
#[derive(Clone, Debug)]
pub struct HttpCatalog {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
struct CountResponse {
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Deserialize)]
struct PageResponse {
    #[serde(default)]
    data: Vec<PhotoRecord>,
}

impl HttpCatalog {
    pub fn new(client: Client, base: &str) -> Result<Self, CatalogError> {
        let base = Url::parse(base).map_err(|e| CatalogError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(CatalogError::InvalidUrl(base.to_string()));
        }
        Ok(Self { client, base })
    }

    fn count_url(&self) -> Result<Url, CatalogError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("count");
        Ok(url)
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn count(&self) -> Result<usize, CatalogError> {
        let response = self.client.get(self.count_url()?).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }
        let body: CountResponse = response.json().await?;
        match body.total {
            Some(total) if total > 0 => Ok(total as usize),
            _ => Err(CatalogError::Empty),
        }
    }

    async fn page(&self, offset: usize, limit: usize) -> Result<Vec<CatalogItem>, CatalogError> {
        let response = self
            .client
            .get(self.base.clone())
            .query(&[("skip", offset), ("limit", limit)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }
        let body: PageResponse = response.json().await?;
        Ok(body.data.into_iter().map(CatalogItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(250, 100), 3);
        assert_eq!(page_count(200, 100), 2);
        assert_eq!(page_count(1, 100), 1);
        assert_eq!(page_count(0, 100), 0);
    }

    #[tokio::test]
    async fn counts_and_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 2})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/photo"))
            .and(query_param("skip", "0"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"_id": "1", "cat_id": "tom", "photo_compressed": "https://b.cos.r.myqcloud.com/a.jpg"},
                    {"_id": "2", "cat_id": "tom"}
                ]
            })))
            .mount(&server)
            .await;

        let catalog = HttpCatalog::new(Client::new(), &format!("{}/photo", server.uri())).unwrap();
        assert_eq!(catalog.count().await.unwrap(), 2);

        let items = catalog.page(0, 100).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].file_name(), "a.jpg");
        assert!(items[1].object_path.is_empty());
    }

    #[tokio::test]
    async fn zero_or_missing_total_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 0})))
            .mount(&server)
            .await;

        let catalog = HttpCatalog::new(Client::new(), &format!("{}/photo", server.uri())).unwrap();
        assert!(matches!(catalog.count().await, Err(CatalogError::Empty)));
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let catalog = HttpCatalog::new(Client::new(), &format!("{}/photo", server.uri())).unwrap();
        assert!(matches!(catalog.page(0, 10).await, Err(CatalogError::Status(503))));
    }
}
