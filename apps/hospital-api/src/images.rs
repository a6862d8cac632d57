//! Cliente do serviço externo de imagens (avatares)
//!
//! O serviço segue a API de upload assinado do Cloudinary: cada requisição
//! leva `api_key`, `timestamp` e uma assinatura SHA-256 dos parâmetros
//! ordenados concatenados ao segredo.

use async_trait::async_trait;
use chrono::Utc;
use hospital_db::models::ImageRef;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::ImageHostConfig;

/// Formatos de imagem aceitos para avatares
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Falha de comunicação com o serviço de imagens: {0}")]
    Transport(String),

    #[error("Serviço de imagens recusou a operação: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ImageError {
    fn from(error: reqwest::Error) -> Self {
        ImageError::Transport(error.to_string())
    }
}

/// Arquivo recebido em um formulário multipart
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn is_allowed_type(&self) -> bool {
        ALLOWED_IMAGE_TYPES.contains(&self.content_type.as_str())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: &ImageUpload) -> Result<ImageRef, ImageError>;
    async fn destroy(&self, public_id: &str) -> Result<(), ImageError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct CloudinaryClient {
    http: reqwest::Client,
    config: ImageHostConfig,
}

impl CloudinaryClient {
    pub fn new(config: ImageHostConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    /// Assinatura: SHA-256 de `k1=v1&k2=v2...` (chaves ordenadas) seguido do segredo
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        format!("{:x}", Sha256::digest(format!("{}{}", joined, self.config.api_secret)))
    }

    async fn rejection(response: reqwest::Response) -> ImageError {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => ImageError::Rejected(body.error.message),
            Err(_) => ImageError::Rejected(format!("status {}", status)),
        }
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, image: &ImageUpload) -> Result<ImageRef, ImageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("timestamp", timestamp.as_str())]);

        let file = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = reqwest::multipart::Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", file);

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::rejection(response).await;
            error!("Upload de imagem falhou: {}", err);
            return Err(err);
        }

        let body: UploadResponse = response.json().await?;
        debug!("Imagem enviada: {}", body.public_id);
        Ok(ImageRef {
            public_id: body.public_id,
            url: body.secure_url,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), ImageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", public_id),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::rejection(response).await;
            error!("Remoção da imagem {} falhou: {}", public_id, err);
            return Err(err);
        }

        // "not found" também encerra o ciclo de vida da imagem
        let body: DestroyResponse = response.json().await?;
        debug!("Imagem {} removida: {}", public_id, body.result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CloudinaryClient {
        CloudinaryClient::new(ImageHostConfig {
            api_base: server.uri(),
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        })
    }

    fn png() -> ImageUpload {
        ImageUpload {
            file_name: "avatar.png".to_string(),
            content_type: "image/png".to_string(),
            // ASCII: o corpo multipart precisa ser UTF-8 para `body_string_contains`
            bytes: b"conteudo-png".to_vec(),
        }
    }

    #[test]
    fn test_allowed_types() {
        assert!(png().is_allowed_type());
        let gif = ImageUpload {
            content_type: "image/gif".to_string(),
            ..png()
        };
        assert!(!gif.is_allowed_type());
    }

    #[test]
    fn test_signature_is_order_independent() {
        let client = CloudinaryClient::new(ImageHostConfig {
            api_base: "http://localhost".to_string(),
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        });
        let a = client.sign(&[("timestamp", "1"), ("public_id", "x")]);
        let b = client.sign(&[("public_id", "x"), ("timestamp", "1")]);

        assert_eq!(a, b);
        assert_eq!(
            a,
            format!("{:x}", Sha256::digest("public_id=x&timestamp=1secret"))
        );
    }

    #[tokio::test]
    async fn test_upload_returns_image_ref() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .and(body_string_contains("signature_algorithm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "avatars/abc",
                "secure_url": "https://cdn.example/avatars/abc.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let image = assert_ok!(client(&server).upload(&png()).await);
        assert_eq!(image.public_id, "avatars/abc");
        assert_eq!(image.url, "https://cdn.example/avatars/abc.png");
    }

    #[tokio::test]
    async fn test_upload_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Invalid Signature"}})),
            )
            .mount(&server)
            .await;

        let err = assert_err!(client(&server).upload(&png()).await);
        assert!(matches!(err, ImageError::Rejected(msg) if msg == "Invalid Signature"));
    }

    #[tokio::test]
    async fn test_destroy_posts_public_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .and(body_string_contains("public_id=avatars%2Fabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        assert_ok!(client(&server).destroy("avatars/abc").await);
    }
}
