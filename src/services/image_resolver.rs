//! 图片解析服务 - 业务能力层
//!
//! 把页面中的图片地址转换为可内嵌的 data URL。
//! 下载、解码、重新编码任一步失败都不会报错，而是退化为原始地址。

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::{ImageFormat, ImageReader};
use regex::Regex;
use std::io::Cursor;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::ImageError;
use crate::utils::logging::truncate_text;

static ACCEPTED_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(https?:|data:)").expect("静态正则"));

/// 图片下载能力
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// 下载原始字节
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

/// 基于 reqwest 的下载实现
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quiz_export/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::fetch_failed(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::fetch_failed(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// 可直接内嵌的数据
    Embedded {
        data_url: String,
        width: u32,
        height: u32,
    },
    /// 转换失败，只能引用原始地址
    Degraded { url: String },
}

/// 图片解析器
///
/// 每个地址只尝试一次，不重试
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    page_base: Option<Url>,
}

impl ImageResolver {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, page_base: Option<Url>) -> Self {
        Self { fetcher, page_base }
    }

    /// 补全协议相对（`//host/x`）与根相对（`/x`）地址
    pub fn normalize(&self, url: &str) -> String {
        let url = url.trim();
        let Some(base) = &self.page_base else {
            return url.to_string();
        };

        if url.starts_with("//") {
            format!("{}:{}", base.scheme(), url)
        } else if url.starts_with('/') {
            format!("{}{}", base.origin().ascii_serialization(), url)
        } else {
            url.to_string()
        }
    }

    /// 解析一张图片
    ///
    /// 只有地址本身无效时返回错误（不会发起任何请求）；其他失败一律退化为原始地址
    pub async fn resolve(&self, url: &str) -> Result<Resolved, ImageError> {
        let normalized = self.normalize(url);
        if normalized.is_empty() || !ACCEPTED_SCHEME.is_match(&normalized) {
            return Err(ImageError::InvalidUrl {
                url: url.to_string(),
            });
        }

        if normalized[..5].eq_ignore_ascii_case("data:") {
            let (width, height) = data_url_dimensions(&normalized);
            return Ok(Resolved::Embedded {
                data_url: normalized,
                width,
                height,
            });
        }

        match self.fetch_and_encode(&normalized).await {
            Ok((data_url, width, height)) => {
                debug!("成功获取图片: {}", truncate_text(url, 50));
                Ok(Resolved::Embedded {
                    data_url,
                    width,
                    height,
                })
            }
            Err(e) => {
                warn!("获取图片失败，保留原始地址: {}", e);
                Ok(Resolved::Degraded {
                    url: url.to_string(),
                })
            }
        }
    }

    async fn fetch_and_encode(&self, url: &str) -> Result<(String, u32, u32), ImageError> {
        let bytes = self.fetcher.fetch(url).await?;
        let owned_url = url.to_string();

        tokio::task::spawn_blocking(move || reencode_png(&owned_url, &bytes))
            .await
            .map_err(|e| ImageError::decode_failed(url, e))?
    }
}

/// 解码任意支持的格式并重新编码为 PNG data URL
pub fn reencode_png(url: &str, bytes: &[u8]) -> Result<(String, u32, u32), ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ImageError::decode_failed(url, e))?;
    let (width, height) = (decoded.width(), decoded.height());

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ImageError::decode_failed(url, e))?;

    let data_url = format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(&png)
    );
    Ok((data_url, width, height))
}

/// 从 base64 data URL 的图片头读取尺寸，读不到时为 0
fn data_url_dimensions(data_url: &str) -> (u32, u32) {
    let Some((meta, payload)) = data_url.split_once(',') else {
        return (0, 0);
    };
    if !meta.to_ascii_lowercase().ends_with(";base64") {
        return (0, 0);
    }

    general_purpose::STANDARD
        .decode(payload.trim())
        .ok()
        .and_then(|bytes| {
            ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .ok()?
                .into_dimensions()
                .ok()
        })
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录调用次数，按预设返回
    struct FakeFetcher {
        calls: AtomicUsize,
        payload: Result<Vec<u8>, ()>,
    }

    impl FakeFetcher {
        fn ok(bytes: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                payload: Ok(bytes),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                payload: Err(()),
            })
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload
                .clone()
                .map_err(|_| ImageError::fetch_failed(url, "connection refused"))
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn base() -> Option<Url> {
        Some(Url::parse("https://mooc.example.com/exam/review").unwrap())
    }

    #[test]
    fn test_normalize_relative_forms() {
        let resolver = ImageResolver::new(FakeFetcher::failing(), base());
        assert_eq!(resolver.normalize("//cdn.x.com/a.png"), "https://cdn.x.com/a.png");
        assert_eq!(resolver.normalize("/img/a.png"), "https://mooc.example.com/img/a.png");
        assert_eq!(resolver.normalize("http://a/b.png"), "http://a/b.png");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_fast_without_fetch() {
        let fetcher = FakeFetcher::failing();
        let resolver = ImageResolver::new(fetcher.clone(), None);

        for bad in ["", "   ", "ftp://a/b.png", "javascript:alert(1)", "img/a.png"] {
            let result = resolver.resolve(bad).await;
            assert!(matches!(result, Err(ImageError::InvalidUrl { .. })), "{bad}");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_data_url_returned_unchanged_without_fetch() {
        let fetcher = FakeFetcher::failing();
        let resolver = ImageResolver::new(fetcher.clone(), base());
        let data_url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png_bytes(3, 2))
        );

        let resolved = resolver.resolve(&data_url).await.unwrap();
        assert_eq!(
            resolved,
            Resolved::Embedded {
                data_url: data_url.clone(),
                width: 3,
                height: 2
            }
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetched_image_is_reencoded_as_png() {
        let fetcher = FakeFetcher::ok(png_bytes(4, 5));
        let resolver = ImageResolver::new(fetcher.clone(), base());

        match resolver.resolve("/img/a.png").await.unwrap() {
            Resolved::Embedded {
                data_url,
                width,
                height,
            } => {
                assert!(data_url.starts_with("data:image/png;base64,"));
                assert_eq!((width, height), (4, 5));
            }
            other => panic!("应当内嵌成功: {:?}", other),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_original_url() {
        let resolver = ImageResolver::new(FakeFetcher::failing(), base());
        let resolved = resolver.resolve("https://a.com/x.png").await.unwrap();
        assert_eq!(
            resolved,
            Resolved::Degraded {
                url: "https://a.com/x.png".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_undecodable_bytes_degrade() {
        let resolver = ImageResolver::new(FakeFetcher::ok(b"not an image".to_vec()), base());
        let resolved = resolver.resolve("https://a.com/x.png").await.unwrap();
        assert!(matches!(resolved, Resolved::Degraded { .. }));
    }
}
