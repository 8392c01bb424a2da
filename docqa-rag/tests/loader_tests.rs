//! Deadline handling of the asynchronous document loader.

mod common;

use std::time::{Duration, Instant};

use common::synthetic_pdf;
use docqa_rag::{Document, DocumentFormat, DocumentLoader, RagError};

fn large_pdf() -> Vec<u8> {
    let pages: Vec<String> = (0..400).map(|i| format!("Page {i} mentions ALPHA and BETA.")).collect();
    let pages: Vec<&str> = pages.iter().map(String::as_str).collect();
    synthetic_pdf(&pages)
}

#[tokio::test]
async fn parsing_past_the_deadline_is_a_load_error() {
    let loader = DocumentLoader::new(Duration::ZERO);
    let doc = Document::new("big.pdf", DocumentFormat::Pdf, large_pdf());

    let started = Instant::now();
    let err = loader.load(doc).await.unwrap_err();

    match err {
        RagError::Load { document, message } => {
            assert_eq!(document, "big.pdf");
            assert!(message.contains("parsing exceeded"), "{message}");
        }
        other => panic!("expected a load error, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn large_pdf_loads_within_a_generous_deadline() {
    let loader = DocumentLoader::new(Duration::from_secs(60));
    let segments = loader
        .load(Document::new("big.pdf", DocumentFormat::Pdf, large_pdf()))
        .await
        .unwrap();

    assert_eq!(segments.len(), 400);
    assert_eq!(segments[399].label.as_deref(), Some("page 400"));
    assert!(segments[0].text.contains("Page 0 mentions ALPHA"));
}
