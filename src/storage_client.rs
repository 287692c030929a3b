// Supabase Storage client: object upload and public URLs
use async_trait::async_trait;
use reqwest::Client;

use crate::config::SupabaseConfig;
use crate::providers::{ObjectStorage, ProviderError};

const PROVIDER: &str = "supabase storage";

#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseStorage {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProviderError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            bucket,
            urlencoding::encode(object_name)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::new(PROVIDER, Some(status.as_u16()), error_text));
        }

        tracing::info!(bucket, object = object_name, "uploaded object");
        Ok(())
    }

    fn public_url(&self, bucket: &str, object_name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            bucket,
            urlencoding::encode(object_name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_encodes_object_name() {
        let storage = SupabaseStorage::new(&SupabaseConfig {
            url: "https://proj.supabase.co/".into(),
            service_role_key: "key".into(),
        });
        assert_eq!(
            storage.public_url("audio", "final clip.mp3"),
            "https://proj.supabase.co/storage/v1/object/public/audio/final%20clip.mp3"
        );
    }
}
