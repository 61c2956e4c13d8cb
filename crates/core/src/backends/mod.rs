pub mod llama_embeddings;
pub mod llama_server;

pub use llama_embeddings::LlamaServerEmbedder;
pub use llama_server::LlamaServerModel;

use url::Url;

/// Parses a server base URL so that relative paths join below it.
pub(crate) fn base_url(endpoint: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(endpoint)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
