//! HTTP client testing utilities

use std::time::Duration;

use reqwest::{Client, Method, Response};

pub struct TestClient {
    pub client: Client,
}

impl TestClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        TestClient { client }
    }

    /// Client for servers with self-signed certificates
    pub fn new_insecure() -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTPS client");

        TestClient { client }
    }

    pub async fn get(&self, url: &str) -> Result<Response, Box<dyn std::error::Error>> {
        Ok(self.client.get(url).send().await?)
    }

    pub async fn request(
        &self,
        method: Method,
        url: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        Ok(self.client.request(method, url).send().await?)
    }

    pub async fn options(&self, url: &str) -> Result<Response, Box<dyn std::error::Error>> {
        self.request(Method::OPTIONS, url).await
    }

    /// GET and return the body bytes as sent, still gzip-encoded when applicable
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let response = self.get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
