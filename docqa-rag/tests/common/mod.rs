//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::{Embedder, GenerationRequest, Generator, ProviderError};
use lopdf::content::{Content, Operation};
use lopdf::{Document as PdfDocument, Object, Stream, dictionary};
use tokio::sync::Notify;

/// Deterministic embedder: one dimension per vocabulary word (occurrence
/// count) plus a constant bias dimension so no vector is all zeros.
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self { vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect() }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.vocabulary.len() + 1];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let word = word.to_lowercase();
            if let Some(i) = self.vocabulary.iter().position(|w| *w == word) {
                v[i] += 1.0;
            }
        }
        v[self.vocabulary.len()] = 1.0;
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Fails with a scripted error for the first `failures` calls, then delegates.
pub struct FlakyEmbedder {
    inner: KeywordEmbedder,
    failures: u32,
    error: ProviderError,
    pub calls: AtomicU32,
}

impl FlakyEmbedder {
    pub fn new(failures: u32, error: ProviderError) -> Self {
        Self { inner: KeywordEmbedder::new(&["alpha"]), failures, error, calls: AtomicU32::new(0) }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(self.error.clone());
        }
        self.inner.embed(texts).await
    }
}

/// Sleeps for a fixed delay on every call.
pub struct SlowEmbedder {
    pub delay: Duration,
    pub calls: AtomicU32,
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(texts.iter().map(|_| vec![1.0]).collect())
    }
}

/// Encodes the numeric value of each text into the vector and sleeps
/// inversely to it, so later batches finish first.
pub struct ReorderingEmbedder;

#[async_trait]
impl Embedder for ReorderingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let value: u64 = texts[0].parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(500u64.saturating_sub(value * 10))).await;
        Ok(texts.iter().map(|t| vec![t.parse::<f32>().unwrap_or(-1.0)]).collect())
    }
}

/// Blocks inside `embed` until released, announcing when it has started.
pub struct GatedEmbedder {
    inner: KeywordEmbedder,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedEmbedder {
    pub fn new() -> Self {
        Self {
            inner: KeywordEmbedder::new(&["alpha"]),
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl Embedder for GatedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.embed(texts).await
    }
}

/// Records every request and answers with a fixed reply.
pub struct RecordingGenerator {
    reply: String,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), requests: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.prompt.clone()).collect()
    }

    pub fn last(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }
}

/// Always fails with the given error.
pub struct FailingGenerator(pub ProviderError);

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
        Err(self.0.clone())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Never finishes within any reasonable deadline.
pub struct StalledGenerator;

#[async_trait]
impl Generator for StalledGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok("too late".to_string())
    }
}

/// Build a PDF with one page per string, each page showing that string.
pub fn synthetic_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode content")));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}
