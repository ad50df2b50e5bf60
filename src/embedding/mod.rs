use anyhow::Result;

/// External embedding capability consumed by the indexer.
///
/// Implementations announce a fixed dimension and every vector they return
/// must have exactly that length. `embed_many` on an empty slice yields an
/// empty collection, not an error.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_many(&[text.to_string()])?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding generated"))
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct FakeEmbedder;

    impl Embedder for FakeEmbedder {
        fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 0.0, 1.0])
                .collect())
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[test]
    fn embed_delegates_to_embed_many() {
        let embedder = FakeEmbedder;
        let v = embedder.embed("hi").unwrap();
        assert_eq!(v, vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn embed_many_of_nothing_is_nothing() {
        let embedder = FakeEmbedder;
        assert!(embedder.embed_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn embed_errors_when_batch_returns_empty() {
        struct EmptyEmbedder;
        impl Embedder for EmptyEmbedder {
            fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(Vec::new())
            }
            fn dimension(&self) -> usize {
                4
            }
        }

        assert!(EmptyEmbedder.embed("hi").is_err());
    }
}
