//! End-to-end pipeline tests over the library API.
//!
//! Exercises ingest → retrieve → answer with deterministic stand-ins for
//! the embedding and generation backends, so no model download or network
//! access is needed. Storage behavior is covered against both the
//! in-memory store and the SQLite store over a temp directory.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use docqa::answer::{compose_answer, NO_CONTEXT_ANSWER};
use docqa::config::ChunkingConfig;
use docqa::embedding::Embedder;
use docqa::error::PipelineError;
use docqa::generate::Generator;
use docqa::ingest::ingest_document;
use docqa::retrieve::retrieve_context;
use docqa::store::memory::InMemoryStore;
use docqa::store::sqlite::SqliteVectorStore;
use docqa::store::{MetadataFilter, VectorStore};

const RUST_DOC: &str = "Rust is a systems programming language. Ownership and borrowing \
let the rust compiler guarantee memory safety without a garbage collector. Rust ships \
with cargo for builds and dependency management.";

const PYTHON_DOC: &str = "Python is an interpreted language. Generators and comprehensions \
make python concise, and the interpreter manages memory with reference counting and a \
cycle collector.";

/// Embeds text along keyword axes so similarity rankings are predictable:
/// mentions of "rust" push along x, mentions of "python" along y.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let rust = lower.matches("rust").count() as f32;
                let python = lower.matches("python").count() as f32;
                vec![rust, python, 1.0]
            })
            .collect())
    }

    fn dims(&self) -> usize {
        3
    }
}

/// Generator that records every prompt and returns a canned answer.
struct RecordingGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn recorded_prompt(&self) -> String {
        self.prompts.lock().unwrap().first().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

fn chunking() -> ChunkingConfig {
    ChunkingConfig {
        size: 60,
        overlap: 10,
    }
}

fn write_doc(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Minimal docx (ZIP) whose word/document.xml carries a single text run.
fn minimal_docx(text: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn ingest_then_ask_returns_grounded_answer() {
    let dir = TempDir::new().unwrap();
    let rust_path = write_doc(&dir, "rust.txt", RUST_DOC);
    let python_path = write_doc(&dir, "python.md", PYTHON_DOC);

    let store = InMemoryStore::new();
    ingest_document(&store, &KeywordEmbedder, &chunking(), "rust.txt", &rust_path)
        .await
        .unwrap();
    ingest_document(&store, &KeywordEmbedder, &chunking(), "python.md", &python_path)
        .await
        .unwrap();

    let question = "What guarantees memory safety in rust?";
    let chunks = retrieve_context(&store, &KeywordEmbedder, question, 3, &[])
        .await
        .unwrap();
    assert!(!chunks.is_empty());
    assert!(
        RUST_DOC.contains(&chunks[0]),
        "top chunk should come from the rust document, got: {}",
        chunks[0]
    );

    let generator = RecordingGenerator::new("The borrow checker.");
    let answer = compose_answer(&generator, question, &chunks).await;
    assert_eq!(answer, "The borrow checker.");

    let prompt = generator.recorded_prompt();
    assert!(prompt.starts_with("Based ONLY on the following context:"));
    assert!(prompt.contains(&chunks[0]));
    assert!(prompt.contains(question));
    assert!(prompt.ends_with("Answer:"));
}

#[tokio::test]
async fn query_scoped_to_one_document_only_sees_its_chunks() {
    let dir = TempDir::new().unwrap();
    let rust_path = write_doc(&dir, "rust.txt", RUST_DOC);
    let python_path = write_doc(&dir, "python.md", PYTHON_DOC);

    let store = InMemoryStore::new();
    ingest_document(&store, &KeywordEmbedder, &chunking(), "rust.txt", &rust_path)
        .await
        .unwrap();
    ingest_document(&store, &KeywordEmbedder, &chunking(), "python.md", &python_path)
        .await
        .unwrap();

    // A rust question scoped to the python document must stay inside it
    let chunks = retrieve_context(
        &store,
        &KeywordEmbedder,
        "rust memory safety",
        5,
        &["python.md".to_string()],
    )
    .await
    .unwrap();

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(
            PYTHON_DOC.contains(chunk),
            "chunk escaped the document scope: {}",
            chunk
        );
    }
}

#[tokio::test]
async fn unsupported_upload_leaves_index_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "malware.exe", "not a document");

    let store = InMemoryStore::new();
    let err = ingest_document(&store, &KeywordEmbedder, &chunking(), "malware.exe", &path)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert!(err
        .to_string()
        .starts_with("Invalid file type. Supported formats:"));
    assert!(store.distinct_filenames().await.unwrap().is_empty());
}

#[tokio::test]
async fn docx_upload_flows_through_extraction() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("guide.docx");
    fs::write(
        &path,
        minimal_docx("Rust ownership keeps memory safe without garbage collection."),
    )
    .unwrap();

    let store = InMemoryStore::new();
    let outcome = ingest_document(&store, &KeywordEmbedder, &chunking(), "guide.docx", &path)
        .await
        .unwrap();
    assert_eq!(outcome.chunks, 1);
    assert!(store
        .distinct_filenames()
        .await
        .unwrap()
        .contains("guide.docx"));

    let chunks = retrieve_context(&store, &KeywordEmbedder, "rust memory", 3, &[])
        .await
        .unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks[0].contains("ownership"));
}

#[tokio::test]
async fn empty_index_answers_with_sentinel_without_generation() {
    let store = InMemoryStore::new();
    let chunks = retrieve_context(&store, &KeywordEmbedder, "anything at all", 5, &[])
        .await
        .unwrap();
    assert!(chunks.is_empty());

    let generator = RecordingGenerator::new("must not appear");
    let answer = compose_answer(&generator, "anything at all", &chunks).await;
    assert_eq!(answer, NO_CONTEXT_ANSWER);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sqlite_index_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("qa.db");
    let rust_path = write_doc(&dir, "rust.txt", RUST_DOC);

    let store = SqliteVectorStore::open(&db_path, "rag_collection").await.unwrap();
    ingest_document(&store, &KeywordEmbedder, &chunking(), "rust.txt", &rust_path)
        .await
        .unwrap();
    store.close().await;

    let reopened = SqliteVectorStore::open(&db_path, "rag_collection").await.unwrap();
    let names = reopened.distinct_filenames().await.unwrap();
    assert!(names.contains("rust.txt"));

    let chunks = retrieve_context(&reopened, &KeywordEmbedder, "rust ownership", 3, &[])
        .await
        .unwrap();
    assert!(!chunks.is_empty());
    assert!(RUST_DOC.contains(&chunks[0]));
}

#[tokio::test]
async fn reingest_overwrites_chunks_in_place() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "notes.txt", "rust first draft of the notes");

    let db_path = dir.path().join("qa.db");
    let store = SqliteVectorStore::open(&db_path, "rag_collection").await.unwrap();

    let first = ingest_document(&store, &KeywordEmbedder, &chunking(), "notes.txt", &path)
        .await
        .unwrap();

    fs::write(&path, "rust final draft of the notes").unwrap();
    let second = ingest_document(&store, &KeywordEmbedder, &chunking(), "notes.txt", &path)
        .await
        .unwrap();
    assert_eq!(first.chunks, second.chunks);

    let probe = KeywordEmbedder.embed_one("rust").await.unwrap();
    let hits = store.query(&probe, 50, &MetadataFilter::All).await.unwrap();
    assert_eq!(hits.len(), second.chunks);
    let all_text: String = hits.iter().map(|h| h.text.as_str()).collect();
    assert!(all_text.contains("final draft"));
    assert!(!all_text.contains("first draft"));

    store.close().await;
}
