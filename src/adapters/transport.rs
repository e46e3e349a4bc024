//! HTTP form submission over reqwest.

use async_trait::async_trait;
use reqwest::multipart::Form;
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::Result;
use crate::submission::ports::FormTransport;
use crate::submission::{FormMethod, FormRequest};

/// Build the shared HTTP client from configuration.
pub fn http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Sends forms the way a browser would.
///
/// POST forms go out as `multipart/form-data`; GET forms carry their fields
/// in the query string. A single attempt is made per request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport using `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FormTransport for ReqwestTransport {
    async fn send(&self, request: &FormRequest) -> Result<()> {
        let builder = match request.method {
            FormMethod::Post => {
                let form = request
                    .fields
                    .iter()
                    .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()));
                self.client.post(&request.url).multipart(form)
            }
            FormMethod::Get => self.client.get(&request.url).query(&request.fields),
        };

        let response = builder.send().await?.error_for_status()?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status().as_u16(),
            "Form accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mocks::serve_once;
    use crate::error::LeadformError;

    fn request(method: FormMethod, url: String) -> FormRequest {
        FormRequest {
            method,
            url,
            fields: vec![
                ("email".to_string(), "a@b.com".to_string()),
                ("g-recaptcha-response".to_string(), "tok".to_string()),
            ],
        }
    }

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(http_client(&HttpConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_post_sends_multipart() {
        let (base, captured) = serve_once(200, "").await;

        transport()
            .send(&request(FormMethod::Post, format!("{}/subscribe", base)))
            .await
            .unwrap();

        let captured = captured.await.unwrap();
        assert!(captured.head.starts_with("POST /subscribe "));
        assert!(captured
            .head
            .to_ascii_lowercase()
            .contains("content-type: multipart/form-data"));
        let body = String::from_utf8_lossy(&captured.body);
        assert!(body.contains("name=\"email\""));
        assert!(body.contains("a@b.com"));
        assert!(body.contains("name=\"g-recaptcha-response\""));
    }

    #[tokio::test]
    async fn test_get_sends_query() {
        let (base, captured) = serve_once(204, "").await;

        transport()
            .send(&request(FormMethod::Get, format!("{}/subscribe", base)))
            .await
            .unwrap();

        let captured = captured.await.unwrap();
        assert!(captured
            .head
            .starts_with("GET /subscribe?email=a%40b.com&g-recaptcha-response=tok "));
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let (base, _captured) = serve_once(500, "boom").await;

        let result = transport()
            .send(&request(FormMethod::Post, format!("{}/subscribe", base)))
            .await;

        assert!(matches!(result, Err(LeadformError::Http(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = transport()
            .send(&request(FormMethod::Post, format!("http://{}/subscribe", addr)))
            .await;

        assert!(result.is_err());
    }
}
