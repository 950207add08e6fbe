//! Pretrained ImageNet weights for the MobileNetV2 base
//!
//! The torchvision checkpoint is downloaded once into
//! `~/.cache/cotton-disease/` and its `features.*` tensors are remapped onto
//! [`MobileNetV2`]'s fields. The ImageNet classifier in the file is ignored.

use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use burn::data::network::downloader;
use burn::module::Module;
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use tracing::info;

use super::mobilenet::{MobileNetV2, MobileNetV2Record, NUM_STAGES};
use crate::utils::error::{CottonError, Result};

/// torchvision `MobileNet_V2_Weights.IMAGENET1K_V1` (top-1 71.878%)
pub const IMAGENET1K_V1_URL: &str = "https://download.pytorch.org/models/mobilenet_v2-b0353104.pth";

/// Where the base network's weights come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PretrainedWeights {
    /// Download (or reuse the cached copy of) the ImageNet checkpoint
    ImageNet1kV1,
    /// A local PyTorch checkpoint with torchvision key names
    File(PathBuf),
    /// Random initialization, for tests and offline experiments
    None,
}

impl PretrainedWeights {
    /// `imagenet`, `none`, or a path
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "imagenet" | "imagenet1k" => Self::ImageNet1kV1,
            "none" | "random" => Self::None,
            _ => Self::File(PathBuf::from(value)),
        }
    }
}

fn cache_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CottonError::Config("cannot determine home directory".to_string()))?;
    Ok(home.join(".cache").join("cotton-disease"))
}

/// Download `url` into the cache unless it is already there
pub fn download_cached(url: &str) -> Result<PathBuf> {
    let model_dir = cache_dir()?;
    create_dir_all(&model_dir)?;

    let file_base_name = url
        .rsplit_once('/')
        .map(|(_, name)| name)
        .ok_or_else(|| CottonError::Config(format!("bad weights url {}", url)))?;
    let file_name = model_dir.join(file_base_name);

    if !file_name.exists() {
        info!("Downloading pretrained weights from {}", url);
        let bytes = downloader::download_file_as_bytes(url, file_base_name);

        // Write to a temporary name first so an interrupted download is not reused
        let partial = file_name.with_extension("part");
        let mut output_file = File::create(&partial)?;
        output_file.write_all(&bytes)?;
        std::fs::rename(&partial, &file_name)?;
    }

    Ok(file_name)
}

/// Key remapping from torchvision `features.N` names to our stage layout
pub fn torchvision_load_args(path: &Path) -> LoadArgs {
    let last = NUM_STAGES - 1;
    let mut args = LoadArgs::new(path.to_path_buf())
        .with_key_remap(r"^features\.0\.0\.(.+)$", "stem.conv.$1")
        .with_key_remap(r"^features\.0\.1\.(.+)$", "stem.norm.$1")
        .with_key_remap(&format!(r"^features\.{}\.0\.(.+)$", last), "last_conv.conv.$1")
        .with_key_remap(&format!(r"^features\.{}\.1\.(.+)$", last), "last_conv.norm.$1")
        // The first block has no expansion conv
        .with_key_remap(r"^features\.1\.conv\.0\.0\.(.+)$", "blocks.0.depthwise.conv.$1")
        .with_key_remap(r"^features\.1\.conv\.0\.1\.(.+)$", "blocks.0.depthwise.norm.$1")
        .with_key_remap(r"^features\.1\.conv\.1\.(.+)$", "blocks.0.project.$1")
        .with_key_remap(r"^features\.1\.conv\.2\.(.+)$", "blocks.0.project_norm.$1");

    for i in 2..last {
        let block = i - 1;
        let prefix = format!(r"^features\.{}\.conv", i);
        args = args
            .with_key_remap(&format!(r"{}\.0\.0\.(.+)$", prefix), &format!("blocks.{}.expand.conv.$1", block))
            .with_key_remap(&format!(r"{}\.0\.1\.(.+)$", prefix), &format!("blocks.{}.expand.norm.$1", block))
            .with_key_remap(&format!(r"{}\.1\.0\.(.+)$", prefix), &format!("blocks.{}.depthwise.conv.$1", block))
            .with_key_remap(&format!(r"{}\.1\.1\.(.+)$", prefix), &format!("blocks.{}.depthwise.norm.$1", block))
            .with_key_remap(&format!(r"{}\.2\.(.+)$", prefix), &format!("blocks.{}.project.$1", block))
            .with_key_remap(&format!(r"{}\.3\.(.+)$", prefix), &format!("blocks.{}.project_norm.$1", block));
    }

    args
}

/// Read a torchvision MobileNetV2 checkpoint into a record
pub fn load_torchvision_record<B: Backend>(path: &Path, device: &B::Device) -> Result<MobileNetV2Record<B>> {
    if !path.exists() {
        return Err(CottonError::PathNotFound(path.to_path_buf()));
    }
    PyTorchFileRecorder::<FullPrecisionSettings>::new()
        .load(torchvision_load_args(path), device)
        .map_err(|e| CottonError::Model(format!("failed to load {:?}: {}", path, e)))
}

/// Build the base network with the requested weights
pub fn load_pretrained<B: Backend>(weights: &PretrainedWeights, device: &B::Device) -> Result<MobileNetV2<B>> {
    let model = MobileNetV2::new(device);
    let path = match weights {
        PretrainedWeights::None => {
            info!("Base network randomly initialized");
            return Ok(model);
        }
        PretrainedWeights::ImageNet1kV1 => download_cached(IMAGENET1K_V1_URL)?,
        PretrainedWeights::File(path) => path.clone(),
    };

    let record = load_torchvision_record::<B>(&path, device)?;
    info!("Loaded pretrained base weights from {:?}", path);
    Ok(model.load_record(record))
}
