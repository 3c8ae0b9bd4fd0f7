//! In-memory stand-ins for the external services.

use parking_lot::Mutex;

use crate::generator::{GenerationError, GenerationRequest, TextGenerator};
use crate::storage::{ObjectStore, StorageError, StoredObject};
use crate::youtube::{
    PlatformError, PlatformVideo, SearchQuery, VideoDetails, VideoPlatform, VideoStatistics,
};

#[derive(Default)]
pub struct FakePlatform {
    videos: Vec<PlatformVideo>,
    search_results: Vec<PlatformVideo>,
    fail: bool,
    queries: Mutex<Vec<SearchQuery>>,
}

impl FakePlatform {
    pub fn with_video(video: PlatformVideo) -> Self {
        Self {
            videos: vec![video],
            ..Self::default()
        }
    }

    pub fn with_search(results: Vec<PlatformVideo>) -> Self {
        Self {
            search_results: results,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last_query(&self) -> Option<SearchQuery> {
        self.queries.lock().last().cloned()
    }
}

impl VideoPlatform for FakePlatform {
    fn search(&self, query: &SearchQuery) -> Result<Vec<PlatformVideo>, PlatformError> {
        self.queries.lock().push(query.clone());
        if self.fail {
            return Err(PlatformError::Http {
                status: 403,
                body: "quotaExceeded".into(),
            });
        }
        Ok(self.search_results.clone())
    }

    fn video_details(&self, video_id: &str) -> Result<Option<VideoDetails>, PlatformError> {
        if self.fail {
            return Err(PlatformError::Transport("connection refused".into()));
        }
        Ok(self
            .videos
            .iter()
            .find(|video| video.video_id == video_id)
            .map(|video| VideoDetails {
                video: video.clone(),
                statistics: VideoStatistics {
                    duration: Some("PT12M3S".into()),
                    view_count: Some(1000),
                    like_count: Some(50),
                    comment_count: Some(7),
                },
            }))
    }
}

pub struct FakeGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

impl TextGenerator for FakeGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().push(request.prompt.clone());
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(GenerationError::Http {
                status: 429,
                body: "RESOURCE_EXHAUSTED".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Default)]
pub struct FakeObjectStore {
    fail: bool,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl FakeObjectStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }
}

impl ObjectStore for FakeObjectStore {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Http {
                status: 413,
                body: "Payload too large".into(),
            });
        }
        let mut uploads = self.uploads.lock();
        if uploads
            .iter()
            .any(|upload| upload.bucket == bucket && upload.path == path)
        {
            return Err(StorageError::Http {
                status: 409,
                body: "The resource already exists".into(),
            });
        }
        uploads.push(RecordedUpload {
            bucket: bucket.to_string(),
            path: path.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        });
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://cdn.test/{bucket}/{path}")
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        if self.fail {
            return Err(StorageError::Transport("offline".into()));
        }
        Ok(self
            .uploads
            .lock()
            .iter()
            .filter(|upload| upload.bucket == bucket && upload.path.starts_with(prefix))
            .map(|upload| StoredObject {
                name: upload.path.clone(),
                updated_at: None,
            })
            .collect())
    }
}
