pub mod s3;

use async_trait::async_trait;

use crate::auth::tokens::random_hex;

/// Pre-signed access to a bucket. Clients move the bytes themselves.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// URL the client can PUT the object to.
    async fn upload_url(&self, key: &str) -> Result<String, String>;
    /// URL the client can GET the object from.
    async fn download_url(&self, key: &str) -> Result<String, String>;
    async fn delete(&self, key: &str) -> Result<(), String>;
}

/// `<path>/<32 hex chars>.<ext>`; the path and extension parts are dropped
/// when empty.
pub fn object_key(path: &str, ext: &str) -> String {
    let path = path.trim().trim_matches('/');
    let ext = ext.trim().trim_start_matches('.');

    let mut key = String::new();
    if !path.is_empty() {
        key.push_str(path);
        key.push('/');
    }
    key.push_str(&random_hex(16));
    if !ext.is_empty() {
        key.push('.');
        key.push_str(ext);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::object_key;

    #[test]
    fn key_with_path_and_extension() {
        let key = object_key(" /uploads/avatars/ ", ".png");
        let (dir, file) = key.rsplit_once('/').unwrap();
        assert_eq!(dir, "uploads/avatars");
        let (name, ext) = file.split_once('.').unwrap();
        assert_eq!(name.len(), 32);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ext, "png");
    }

    #[test]
    fn bare_key() {
        let key = object_key("", "");
        assert_eq!(key.len(), 32);
        assert!(!key.contains('/'));
        assert!(!key.contains('.'));
    }

    #[test]
    fn keys_are_unique() {
        assert_ne!(object_key("a", "txt"), object_key("a", "txt"));
    }
}
