use crate::transaction::{ImageOp, Transaction};
use facereg_core::{
    is_image_file, is_safe_file_name, Embedding, EmbeddingMap, Error, Profile, ProfileMap, Result,
};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGES_DIR: &str = "registered_faces";
const PROFILES_FILE: &str = "users.json";
const EMBEDDINGS_FILE: &str = "embeddings.json";

/// In-memory working copy of both mappings.
#[derive(Debug, Default, Clone)]
struct Cache {
    profiles: ProfileMap,
    embeddings: EmbeddingMap,
}

/// Owns the three sub-stores of every face record: the image directory,
/// the embedding mapping and the profile mapping.
///
/// Both mappings are kept in memory and written through on every mutation.
/// Mutations are serialized and committed as one transaction, so a failed
/// write leaves disk and cache exactly as they were.
pub struct RecordStore {
    data_dir: PathBuf,
    images_dir: PathBuf,
    profiles_path: PathBuf,
    embeddings_path: PathBuf,
    cache: RwLock<Cache>,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Open (or create) a store rooted at `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let images_dir = data_dir.join(IMAGES_DIR);
        fs::create_dir_all(&images_dir)?;

        let store = Self {
            profiles_path: data_dir.join(PROFILES_FILE),
            embeddings_path: data_dir.join(EMBEDDINGS_FILE),
            data_dir,
            images_dir,
            cache: RwLock::new(Cache::default()),
            write_lock: Mutex::new(()),
        };
        store.reload()?;

        {
            let cache = store.cache.read();
            info!(
                "Record store opened at {:?}: {} profiles, {} embeddings",
                store.data_dir,
                cache.profiles.len(),
                cache.embeddings.len()
            );
        }
        Ok(store)
    }

    /// Re-read both mappings from disk, replacing the cache.
    pub fn reload(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let profiles: ProfileMap = load_document(&self.profiles_path)?;
        let embeddings: EmbeddingMap = load_document(&self.embeddings_path)?;
        *self.cache.write() = Cache { profiles, embeddings };
        Ok(())
    }

    /// Store a new record, overwriting any record under the same key.
    pub fn put(&self, key: &str, image: &[u8], embedding: Embedding, profile: Profile) -> Result<()> {
        check_key(key)?;
        self.commit(
            Some(ImageOp::Write {
                name: key.to_string(),
                bytes: image.to_vec(),
            }),
            |cache| {
                cache.embeddings.insert(key.to_string(), embedding);
                cache.profiles.insert(key.to_string(), profile);
            },
        )?;
        info!("Stored record {}", key);
        Ok(())
    }

    pub fn get_profile(&self, key: &str) -> Result<Profile> {
        self.cache
            .read()
            .profiles
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    pub fn get_embedding(&self, key: &str) -> Option<Embedding> {
        self.cache.read().embeddings.get(key).cloned()
    }

    /// Whether a profile is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.read().profiles.contains_key(key)
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.cache.read().profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the profile mapping in insertion order.
    pub fn profiles(&self) -> ProfileMap {
        self.cache.read().profiles.clone()
    }

    /// Run `f` against the current embedding mapping.
    pub fn with_embeddings<R>(&self, f: impl FnOnce(&EmbeddingMap) -> R) -> R {
        f(&self.cache.read().embeddings)
    }

    /// Image file names in the image directory, sorted.
    pub fn list_images(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.images_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_image_file(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path of a stored image. Names that could escape the image directory
    /// are reported as not found.
    pub fn image_path(&self, name: &str) -> Result<PathBuf> {
        let path = self.images_dir.join(name);
        if is_safe_file_name(name) && path.is_file() {
            Ok(path)
        } else {
            Err(Error::NotFound(name.to_string()))
        }
    }

    pub fn read_image(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.image_path(name)?;
        Ok(fs::read(path)?)
    }

    /// Remove every trace of `key`. Deleting an unknown key succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.commit(
            Some(ImageOp::Remove {
                name: key.to_string(),
            }),
            |cache| {
                cache.profiles.shift_remove(key);
                cache.embeddings.shift_remove(key);
            },
        )?;
        info!("Deleted record {}", key);
        Ok(())
    }

    /// Move a record to `new_key` with an updated profile.
    ///
    /// With equal keys this is an in-place profile update. Otherwise the
    /// image and the embedding follow the key when present, and `old_key`
    /// disappears from both mappings.
    pub fn rename(&self, old_key: &str, new_key: &str, new_profile: Profile) -> Result<()> {
        check_key(old_key)?;
        check_key(new_key)?;
        if old_key == new_key {
            self.commit(None, |cache| {
                cache.profiles.insert(new_key.to_string(), new_profile);
            })?;
            info!("Updated profile {}", new_key);
            return Ok(());
        }

        self.commit(
            Some(ImageOp::Move {
                from: old_key.to_string(),
                to: new_key.to_string(),
            }),
            |cache| {
                cache.profiles.insert(new_key.to_string(), new_profile);
                cache.profiles.shift_remove(old_key);
                match cache.embeddings.get(old_key).cloned() {
                    Some(embedding) => {
                        cache.embeddings.insert(new_key.to_string(), embedding);
                        cache.embeddings.shift_remove(old_key);
                    }
                    None => debug!("No embedding stored for {}", old_key),
                }
            },
        )?;
        info!("Renamed record {} -> {}", old_key, new_key);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[inline]
    #[must_use]
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Apply `update` to a copy of the cache, persist the result together with
    /// `image_op`, and swap the cache only once everything is on disk.
    fn commit(&self, image_op: Option<ImageOp>, update: impl FnOnce(&mut Cache)) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut next = self.cache.read().clone();
        update(&mut next);

        let mut txn = Transaction::new(&self.images_dir);
        if let Some(op) = image_op {
            txn = txn.image(op);
        }
        txn.document(&self.profiles_path, serde_json::to_vec_pretty(&next.profiles)?)
            .document(&self.embeddings_path, serde_json::to_vec(&next.embeddings)?)
            .commit()?;

        *self.cache.write() = next;
        Ok(())
    }
}

/// Keys name files in the image directory and must not leave it.
fn check_key(key: &str) -> Result<()> {
    if is_safe_file_name(key) {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid key: {:?}", key)))
    }
}

/// Missing and empty documents both load as an empty mapping.
fn load_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read(path) {
        Ok(data) if data.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
        Ok(data) => Ok(serde_json::from_slice(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}
