use super::cache::{RateLimiter, TtlCache, PROJECT_TTL};
use super::{CatalogError, ProjectRecord, RemoteCatalog, RemoteFileRecord};
use crate::config::CurseForgeSettings;
use crate::error::{LauncherError, Result};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CDN, если API не отдаёт `downloadUrl`
const FORGECDN_BASE: &str = "https://edge.forgecdn.net/files";

/// ID алгоритма SHA-1 в CurseForge
const HASH_ALGO_SHA1: u32 = 1;

#[derive(Debug, Deserialize)]
pub struct CurseForgeResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeMod {
    pub id: u64,
    pub name: String,
    /// 6 = моды, 12 = ресурспаки
    #[serde(default)]
    pub class_id: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeFile {
    pub id: u64,
    #[serde(default)]
    pub mod_id: u64,
    pub file_name: String,
    #[serde(default)]
    pub file_length: u64,
    pub download_url: Option<String>,
    #[serde(default)]
    pub hashes: Vec<CurseForgeHash>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurseForgeHash {
    pub value: String,
    pub algo: u32, // 1=SHA1, 2=MD5
}

impl CurseForgeFile {
    /// Прямая ссылка на скачивание. Проекты, запретившие стороннюю
    /// раздачу, приходят без неё, но файлы всё равно лежат на CDN.
    pub fn resolved_url(&self) -> String {
        match self.download_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => format!(
                "{}/{}/{}/{}",
                FORGECDN_BASE,
                self.id / 1000,
                self.id % 1000,
                self.file_name
            ),
        }
    }

    pub fn sha1(&self) -> Option<String> {
        self.hashes
            .iter()
            .find(|h| h.algo == HASH_ALGO_SHA1)
            .map(|h| h.value.to_lowercase())
    }

    pub fn into_record(self) -> RemoteFileRecord {
        RemoteFileRecord {
            url: self.resolved_url(),
            sha1: self.sha1(),
            parent_project_class: None,
            file_length: self.file_length,
            file_name: self.file_name,
        }
    }
}

impl From<CurseForgeMod> for ProjectRecord {
    fn from(m: CurseForgeMod) -> Self {
        ProjectRecord {
            id: m.id,
            name: m.name,
            class_id: m.class_id,
        }
    }
}

fn status_error(status: StatusCode, url: &str, body: &str) -> CatalogError {
    if status == StatusCode::NOT_FOUND {
        CatalogError::NotFound(url.to_string())
    } else {
        CatalogError::Transient(format!(
            "CurseForge API returned HTTP {}: {}",
            status,
            truncate_chars(body, 200)
        ))
    }
}

fn parse_id(kind: &str, raw: &str) -> std::result::Result<u64, CatalogError> {
    raw.trim()
        .parse()
        .map_err(|_| CatalogError::NotFound(format!("invalid CurseForge {} id '{}'", kind, raw)))
}

/// Клиент CurseForge API
pub struct CurseForgeCatalog {
    client: Client,
    api_base: String,
    projects: TtlCache<u64, CurseForgeMod>,
    limiter: RateLimiter,
}

impl CurseForgeCatalog {
    pub fn new(settings: &CurseForgeSettings, timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        match settings.api_key.as_deref() {
            Some(key) => {
                let value = key.parse().map_err(|_| {
                    LauncherError::InvalidConfig("Invalid CurseForge API key format".to_string())
                })?;
                headers.insert("x-api-key", value);
            }
            None => log::warn!("No CurseForge API key configured, requests will likely be rejected"),
        }

        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                LauncherError::InvalidConfig(format!(
                    "Failed to create CurseForge HTTP client: {}",
                    e
                ))
            })?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            projects: TtlCache::new(PROJECT_TTL, 500),
            limiter: RateLimiter::new(10.0, 5.0),
        })
    }

    /// Запрос JSON к CurseForge API; 404 превращается в `NotFound`
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> std::result::Result<T, CatalogError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            log::error!("CurseForge API request failed for {}: {}", url, e);
            CatalogError::Transient(format!("CurseForge API request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("CurseForge API HTTP {} (URL: {})", status, url);
            return Err(status_error(status, url, &body));
        }

        let text = response.text().await.map_err(|e| {
            log::error!("Failed to read CurseForge response body: {}", e);
            CatalogError::Transient(format!("Failed to read CurseForge response: {}", e))
        })?;

        serde_json::from_str(&text).map_err(|e| {
            log::error!("Failed to parse CurseForge JSON: {}", e);
            log::debug!("Response body (first 500 chars): {}", truncate_chars(&text, 500));
            CatalogError::Transient(format!("Invalid JSON from CurseForge API: {} (URL: {})", e, url))
        })
    }

    /// Получение конкретного файла
    pub async fn get_file(
        &self,
        mod_id: u64,
        file_id: u64,
    ) -> std::result::Result<CurseForgeFile, CatalogError> {
        let url = format!("{}/mods/{}/files/{}", self.api_base, mod_id, file_id);
        self.limiter.wait().await;
        let response: CurseForgeResponse<CurseForgeFile> = self.fetch_json(&url).await?;
        Ok(response.data)
    }

    /// Получение мода по ID (с кешированием и rate limiting)
    pub async fn get_mod(&self, mod_id: u64) -> std::result::Result<CurseForgeMod, CatalogError> {
        self.projects
            .get_or_fetch(mod_id, &self.limiter, || async {
                let url = format!("{}/mods/{}", self.api_base, mod_id);
                let response: CurseForgeResponse<CurseForgeMod> = self.fetch_json(&url).await?;
                Ok(response.data)
            })
            .await
    }

    /// Поиск по строковым ID (так их хранят другие лаунчеры)
    pub async fn get_mod_file(
        &self,
        project_id: &str,
        file_id: &str,
    ) -> std::result::Result<RemoteFileRecord, CatalogError> {
        let project_id = parse_id("project", project_id)?;
        let file_id = parse_id("file", file_id)?;
        self.lookup_file(project_id, file_id).await
    }

    pub async fn get_mod_by_id(
        &self,
        project_id: &str,
    ) -> std::result::Result<ProjectRecord, CatalogError> {
        let project_id = parse_id("project", project_id)?;
        self.lookup_project(project_id).await
    }
}

#[async_trait]
impl RemoteCatalog for CurseForgeCatalog {
    async fn lookup_file(
        &self,
        project_id: u64,
        file_id: u64,
    ) -> std::result::Result<RemoteFileRecord, CatalogError> {
        let file = self.get_file(project_id, file_id).await?;
        Ok(file.into_record())
    }

    async fn lookup_project(
        &self,
        project_id: u64,
    ) -> std::result::Result<ProjectRecord, CatalogError> {
        Ok(self.get_mod(project_id).await?.into())
    }
}
