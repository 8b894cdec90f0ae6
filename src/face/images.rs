use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};

/// Decode a base64 image, accepting either raw base64 or a `data:...;base64,` URL.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(',') {
        Some((_, data)) => data,
        None => encoded,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        bail!("Image payload is empty");
    }

    STANDARD
        .decode(payload)
        .context("Image is not valid base64")
}

/// Where the reference image for `usn` lives. Rejects usns that would escape `face_dir`.
pub fn reference_path(face_dir: &Path, usn: &str) -> Result<PathBuf> {
    let safe = !usn.is_empty()
        && usn
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !safe {
        bail!("usn {:?} cannot be used as a file name", usn);
    }
    Ok(face_dir.join(format!("{}.jpg", usn)))
}

pub async fn store_reference(face_dir: &Path, usn: &str, image: &[u8]) -> Result<PathBuf> {
    let path = reference_path(face_dir, usn)?;
    tokio::fs::create_dir_all(face_dir)
        .await
        .with_context(|| format!("Failed to create face directory {}", face_dir.display()))?;
    tokio::fs::write(&path, image)
        .await
        .with_context(|| format!("Failed to write reference image {}", path.display()))?;

    tracing::info!(usn = %usn, path = %path.display(), bytes = image.len(), "Reference face stored");
    Ok(path)
}

/// Reference image bytes, or None when nothing was registered for `usn`.
pub async fn load_reference(face_dir: &Path, usn: &str) -> Result<Option<Vec<u8>>> {
    let path = reference_path(face_dir, usn)?;
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_raw_and_data_url() {
        let encoded = STANDARD.encode(b"\xff\xd8\xffjpeg");
        assert_eq!(decode_image(&encoded).unwrap(), b"\xff\xd8\xffjpeg");

        let data_url = format!("data:image/jpeg;base64,{}", encoded);
        assert_eq!(decode_image(&data_url).unwrap(), b"\xff\xd8\xffjpeg");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image("").is_err());
        assert!(decode_image("data:image/jpeg;base64,").is_err());
        assert!(decode_image("!!not base64!!").is_err());
    }

    #[test]
    fn test_reference_path() {
        let dir = Path::new("face_data");
        assert_eq!(
            reference_path(dir, "1RV21CS001").unwrap(),
            PathBuf::from("face_data/1RV21CS001.jpg")
        );
        assert!(reference_path(dir, "../etc/passwd").is_err());
        assert!(reference_path(dir, "a/b").is_err());
        assert!(reference_path(dir, "").is_err());
    }

    #[tokio::test]
    async fn test_store_and_load_reference() {
        let temp = TempDir::new().unwrap();
        let face_dir = temp.path().join("faces");

        assert!(load_reference(&face_dir, "U1").await.unwrap().is_none());

        let path = store_reference(&face_dir, "U1", b"image-bytes").await.unwrap();
        assert!(path.ends_with("U1.jpg"));
        assert_eq!(
            load_reference(&face_dir, "U1").await.unwrap().unwrap(),
            b"image-bytes"
        );
    }
}
