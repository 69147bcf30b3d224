//! Payload compression selected by a block's compression tag

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::storage::Compression;
use crate::{Result, WiffError};

/// Compress `data` with the codec named by `compression`
///
/// # Errors
///
/// Returns error if the codec fails or is not compiled in
pub fn compress(compression: Compression, data: &[u8]) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),

        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| WiffError::Codec(format!("Zlib: {e}")))?;
            encoder
                .finish()
                .map_err(|e| WiffError::Codec(format!("Zlib: {e}")))
        }

        #[cfg(feature = "bzip2")]
        Compression::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| WiffError::Codec(format!("Bzip2: {e}")))?;
            encoder
                .finish()
                .map_err(|e| WiffError::Codec(format!("Bzip2: {e}")))
        }

        #[cfg(not(feature = "bzip2"))]
        Compression::Bzip2 => Err(WiffError::Codec(
            "Bzip2 support not compiled in".to_string(),
        )),
    }
}

/// Reverse [`compress`]
///
/// # Errors
///
/// Returns error if the payload is corrupt or the codec is not compiled in
pub fn decompress(compression: Compression, data: &[u8]) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),

        Compression::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| WiffError::Codec(format!("Zlib: {e}")))?;
            Ok(decompressed)
        }

        #[cfg(feature = "bzip2")]
        Compression::Bzip2 => {
            let mut decoder = bzip2::read::BzDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| WiffError::Codec(format!("Bzip2: {e}")))?;
            Ok(decompressed)
        }

        #[cfg(not(feature = "bzip2"))]
        Compression::Bzip2 => Err(WiffError::Codec(
            "Bzip2 support not compiled in".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let data = b"hello world";
        assert_eq!(compress(Compression::None, data).unwrap(), data);
        assert_eq!(decompress(Compression::None, data).unwrap(), data);
    }

    #[test]
    fn test_zlib() {
        let original = vec![7u8; 4096];
        let compressed = compress(Compression::Zlib, &original).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(decompress(Compression::Zlib, &compressed).unwrap(), original);
    }

    #[test]
    fn test_zlib_garbage() {
        assert!(matches!(
            decompress(Compression::Zlib, b"not zlib at all"),
            Err(WiffError::Codec(_))
        ));
    }

    #[cfg(feature = "bzip2")]
    #[test]
    fn test_bzip2() {
        let original: Vec<u8> = (0..2048u32).map(|i| (i % 17) as u8).collect();
        let compressed = compress(Compression::Bzip2, &original).unwrap();
        assert_eq!(decompress(Compression::Bzip2, &compressed).unwrap(), original);
    }
}
