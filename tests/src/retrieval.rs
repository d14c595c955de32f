use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use vigil_kernel::{
    DocumentInfo, GatewayError, GatewayResult, Passage, RetrievalGateway, VectorStoreControl,
};

/// A mock retrieval subsystem with an in-memory document list.
///
/// Queries return the documents whose id occurs in the query text.
#[derive(Clone, Default)]
pub struct MockRetrievalGateway {
    documents: Arc<RwLock<Vec<DocumentInfo>>>,
    failure: Arc<RwLock<Option<GatewayError>>>,
    panic_on_list: Arc<AtomicBool>,
    reinitializations: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
}

impl MockRetrievalGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, id: &str, chunk_count: usize) {
        self.documents.write().push(DocumentInfo {
            id: id.to_string(),
            source: Some(format!("{id}.md")),
            chunk_count,
        });
    }

    /// Fail every call with `error` until cleared with `None`.
    pub fn set_failure(&self, error: Option<GatewayError>) {
        *self.failure.write() = error;
    }

    pub fn set_panic_on_list(&self, panic: bool) {
        self.panic_on_list.store(panic, Ordering::SeqCst);
    }

    pub fn reinitialize_count(&self) -> usize {
        self.reinitializations.load(Ordering::SeqCst)
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> GatewayResult<()> {
        match self.failure.read().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RetrievalGateway for MockRetrievalGateway {
    fn name(&self) -> &str {
        "mock-rag"
    }

    async fn list_documents(&self) -> GatewayResult<Vec<DocumentInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_list.load(Ordering::SeqCst) {
            panic!("mock retrieval panicked on list_documents");
        }
        self.check_failure()?;
        Ok(self.documents.read().clone())
    }

    async fn query(&self, text: &str, top_k: usize) -> GatewayResult<Vec<Passage>> {
        self.check_failure()?;
        let passages = self
            .documents
            .read()
            .iter()
            .filter(|doc| text.contains(doc.id.as_str()))
            .take(top_k)
            .map(|doc| Passage {
                document_id: doc.id.clone(),
                text: format!("passage from {}", doc.id),
                score: 1.0,
            })
            .collect();
        Ok(passages)
    }

    fn store_control(&self) -> Option<&dyn VectorStoreControl> {
        Some(self)
    }
}

#[async_trait]
impl VectorStoreControl for MockRetrievalGateway {
    async fn reinitialize(&self) -> GatewayResult<()> {
        self.reinitializations.fetch_add(1, Ordering::SeqCst);
        self.set_failure(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_matches_document_ids() {
        let rag = MockRetrievalGateway::new();
        rag.add_document("handbook", 4);
        rag.add_document("faq", 2);

        let passages = rag.query("what does the faq say?", 5).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].document_id, "faq");
        assert_eq!(rag.list_documents().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reinitialize_clears_failure() {
        let rag = MockRetrievalGateway::new();
        rag.set_failure(Some(GatewayError::Transport("db closed".to_string())));
        assert!(rag.list_documents().await.is_err());

        rag.reinitialize().await.unwrap();
        assert!(rag.list_documents().await.is_ok());
        assert_eq!(rag.reinitialize_count(), 1);
        // reconnect is not provided by this store
        assert!(rag.reconnect().await.is_err());
    }
}
