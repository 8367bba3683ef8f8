//! Artifact download to the staging path

use std::path::Path;

use futures::{Stream, StreamExt, pin_mut};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::UpdateError;

/// Stream the candidate artifact from `url` to `dest`.
///
/// Any non-success HTTP status is a download failure; a partially written
/// staging file is removed before the error surfaces, whatever the cause.
///
/// # Errors
/// Returns `UpdateError::Network`, `UpdateError::HttpStatus` or
/// `UpdateError::Io`.
#[instrument(skip(client))]
pub async fn download_artifact(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, UpdateError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(UpdateError::HttpStatus(response.status().as_u16()));
    }

    let stream = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(UpdateError::from));
    let written = persist_stream(stream, dest).await?;

    debug!(bytes = written, dest = %dest.display(), "artifact downloaded");
    Ok(written)
}

/// Write a byte stream to `dest`. Every failure, whether from the stream
/// or from the file system, removes the partial file before surfacing.
async fn persist_stream<S, B>(stream: S, dest: &Path) -> Result<u64, UpdateError>
where
    S: Stream<Item = Result<B, UpdateError>>,
    B: AsRef<[u8]>,
{
    match write_chunks(stream, dest).await {
        Ok(written) => Ok(written),
        Err(e) => {
            let _ = tokio::fs::remove_file(dest).await;
            Err(e)
        }
    }
}

async fn write_chunks<S, B>(stream: S, dest: &Path) -> Result<u64, UpdateError>
where
    S: Stream<Item = Result<B, UpdateError>>,
    B: AsRef<[u8]>,
{
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;

    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn persists_full_stream() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("hostforge.new");
        let chunks: Vec<Result<&[u8], UpdateError>> =
            vec![Ok(b"new ".as_slice()), Ok(b"release".as_slice())];

        let written = persist_stream(stream::iter(chunks), &dest).await.unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new release");
    }

    #[tokio::test]
    async fn mid_stream_failure_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("hostforge.new");
        let chunks: Vec<Result<&[u8], UpdateError>> = vec![
            Ok(b"partial".as_slice()),
            Err(UpdateError::Network("connection reset".into())),
        ];

        let err = persist_stream(stream::iter(chunks), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Network(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unwritable_destination_is_an_io_error() {
        let dest = Path::new("/nonexistent/dir/hostforge.new");
        let chunks: Vec<Result<&[u8], UpdateError>> = vec![Ok(b"data".as_slice())];

        let err = persist_stream(stream::iter(chunks), dest)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Io(_)));
        assert!(!dest.exists());
    }
}
