//! Local cache of ONNX model and tokenizer files
//!
//! Files are fetched from the HuggingFace hub on first use and reused from the
//! cache directory afterwards.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const HF_BASE_URL: &str = "https://huggingface.co";

/// Paths of a cached model
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// ONNX graph
    pub model: PathBuf,
    /// HuggingFace `tokenizer.json`
    pub tokenizer: PathBuf,
}

/// Make sure `model.onnx` and `tokenizer.json` for `repo` exist in `cache_dir`
pub async fn ensure_model_files(repo: &str, onnx_file: &str, cache_dir: &Path) -> Result<ModelFiles> {
    std::fs::create_dir_all(cache_dir).map_err(|e| {
        Error::Config(format!(
            "Failed to create cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;

    let files = ModelFiles {
        model: cache_dir.join("model.onnx"),
        tokenizer: cache_dir.join("tokenizer.json"),
    };

    if !files.model.exists() {
        download(&hub_url(repo, onnx_file), &files.model).await?;
    }

    if !files.tokenizer.exists() {
        download(&hub_url(repo, "tokenizer.json"), &files.tokenizer).await?;
    }

    Ok(files)
}

fn hub_url(repo: &str, file: &str) -> String {
    format!("{}/{}/resolve/main/{}", HF_BASE_URL, repo, file)
}

async fn download(url: &str, path: &Path) -> Result<()> {
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(url).await?;

    if !response.status().is_success() {
        return Err(Error::internal(format!(
            "Download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response.bytes().await?;

    // Only complete downloads appear under the final name
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_url() {
        assert_eq!(
            hub_url("sentence-transformers/all-MiniLM-L6-v2", "onnx/model.onnx"),
            "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx"
        );
    }

    #[tokio::test]
    async fn test_cached_files_are_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"onnx").unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();

        // An unreachable repo name proves nothing is fetched
        let files = ensure_model_files("invalid/repo", "onnx/model.onnx", dir.path())
            .await
            .unwrap();

        assert_eq!(files.model, dir.path().join("model.onnx"));
        assert_eq!(files.tokenizer, dir.path().join("tokenizer.json"));
    }
}
