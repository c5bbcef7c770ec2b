use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, bail, Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::error::ScrollshotError;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Tunables handed to the external image joiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchSettings {
    pub rows_per_crop: u32,
    pub cols_per_crop: u32,
    pub denoising_factor: f64,
    pub left_crop_from: u32,
    pub left_crop_to: u32,
    pub right_crop_from: u32,
    pub right_crop_to: u32,
    pub match_score_threshold: f64,
}

impl Default for StitchSettings {
    fn default() -> Self {
        Self {
            rows_per_crop: 25,
            cols_per_crop: 200,
            denoising_factor: 0.10,
            left_crop_from: 20,
            left_crop_to: 180,
            right_crop_from: 20,
            right_crop_to: 200,
            match_score_threshold: 0.10,
        }
    }
}

impl StitchSettings {
    /// Every out-of-range field, empty when valid. Bounds are exclusive.
    pub fn field_errors(&self) -> Vec<String> {
        let counts = [
            ("rowsPerCrop", self.rows_per_crop),
            ("colsPerCrop", self.cols_per_crop),
            ("leftCropFrom", self.left_crop_from),
            ("leftCropTo", self.left_crop_to),
            ("rightCropFrom", self.right_crop_from),
            ("rightCropTo", self.right_crop_to),
        ];
        let ratios = [
            ("denoisingFactor", self.denoising_factor),
            ("matchScoreThreshold", self.match_score_threshold),
        ];

        let mut errors = Vec::new();
        for (field, value) in counts {
            if !validation::is_between(value as f64, 0.0, 1000.0) {
                errors.push(validation::field_error(field, value));
            }
        }
        for (field, value) in ratios {
            if !validation::is_between(value, 0.0, 1.0) {
                errors.push(validation::field_error(field, value));
            }
        }
        errors
    }

    pub fn validate(&self) -> Result<(), ScrollshotError> {
        let errors = self.field_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ScrollshotError::InvalidSettings(errors))
        }
    }
}

mod validation {
    use std::fmt::Display;

    pub fn is_between(value: f64, min: f64, max: f64) -> bool {
        !value.is_nan() && value > min && value < max
    }

    pub fn field_error(field: &str, value: impl Display) -> String {
        format!("scrollshot setting '{field}' has an invalid value: {value}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub scrollshot: StitchSettings,
}

impl UserSettings {
    pub fn validate(&self) -> Result<(), ScrollshotError> {
        self.scrollshot.validate()
    }
}

/// Where frames are staged and where composites end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollshotPaths {
    pub frames_root: PathBuf,
    pub output_root: PathBuf,
}

impl Default for ScrollshotPaths {
    fn default() -> Self {
        let output_base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            frames_root: std::env::temp_dir().join("scrollshot"),
            output_root: output_base.join("scrollshot"),
        }
    }
}

impl ScrollshotPaths {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            frames_root: root.join("frames"),
            output_root: root.join("output"),
        }
    }
}

/// AES-256-GCM key for the settings file.
#[derive(Clone)]
pub struct SettingsKey([u8; KEY_LEN]);

impl SettingsKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    /// Reads the key file, creating it with a fresh random key on first use.
    ///
    /// An unreadable or wrong-sized key is replaced; whatever was encrypted
    /// under it can no longer be opened and falls back to defaults.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            match Self::read(path) {
                Ok(key) => return Ok(key),
                Err(err) => log_warn!("{err:#}, generating a new settings key"),
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let key = Self::generate();
        fs::write(path, key.0)
            .with_context(|| format!("Failed to write settings key to {}", path.display()))?;
        log_info!("created settings key at {}", path.display());
        Ok(key)
    }

    fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read settings key from {}", path.display()))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| anyhow!("settings key at {} is corrupt", path.display()))?;
        Ok(Self(key))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// `nonce ‖ ciphertext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| anyhow!("failed to encrypt settings"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            bail!("encrypted settings are truncated");
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("failed to decrypt settings"))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    key: SettingsKey,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Opens the encrypted settings file. Missing, undecryptable or invalid
    /// content yields the defaults instead of an error.
    pub fn open(path: PathBuf, key: SettingsKey) -> Self {
        let data = if path.exists() {
            match Self::read(&path, &key) {
                Ok(settings) => settings,
                Err(err) => {
                    log_warn!(
                        "settings at {} are unusable, falling back to defaults: {err:#}",
                        path.display()
                    );
                    UserSettings::default()
                }
            }
        } else {
            UserSettings::default()
        };

        Self {
            path,
            key,
            data: RwLock::new(data),
        }
    }

    /// Opens `settings.enc` in `dir`, keyed by `settings.key` next to it.
    pub fn open_in(dir: &Path) -> Result<Self> {
        let key = SettingsKey::load_or_create(&dir.join("settings.key"))?;
        Ok(Self::open(dir.join("settings.enc"), key))
    }

    fn read(path: &Path, key: &SettingsKey) -> Result<UserSettings> {
        let sealed = fs::read(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let plaintext = key.decrypt(&sealed)?;
        let settings: UserSettings = serde_json::from_slice(&plaintext)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stitch(&self) -> StitchSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .scrollshot
            .clone()
    }

    pub fn update_stitch(&self, settings: StitchSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        next.scrollshot = settings;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let defaults = UserSettings::default();
        self.persist(&defaults)?;
        *guard = defaults;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_vec(data)?;
        let sealed = self.key.encrypt(&serialized)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, sealed)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
