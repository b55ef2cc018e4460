use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display},
    io,
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};
use safetensors::{Dtype, SafeTensorError, SafeTensors, tensor::TensorView};
use tokio::{fs, io::AsyncWriteExt};

use crate::{model::LocalModel, status::StatusRecord};

const EPOCH_KEY: &str = "epoch";
const LOSS_KEY: &str = "loss";
const HASH_KEY: &str = "hash";
const PARAMETERS_KEY: &str = "parameters";

#[derive(Debug)]
pub enum CheckpointErr {
    Io(io::Error),
    Format(SafeTensorError),
    /// The file is a valid safetensors file but not one of our checkpoints.
    Invalid(String),
}

impl Display for CheckpointErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "checkpoint io error: {e}"),
            Self::Format(e) => write!(f, "malformed checkpoint: {e}"),
            Self::Invalid(detail) => write!(f, "invalid checkpoint: {detail}"),
        }
    }
}

impl Error for CheckpointErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<io::Error> for CheckpointErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for CheckpointErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Format(value)
    }
}

fn tensor_name(index: usize) -> String {
    format!("param.{index}")
}

/// A checkpoint read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub epoch: u64,
    pub parameters: Vec<Vec<f32>>,
    pub loss: f32,
    pub hash: String,
}

impl Checkpoint {
    /// Reads the checkpoint stored at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointErr> {
        let bytes = fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointErr> {
        let (_, header) = SafeTensors::read_metadata(bytes)?;
        let metadata = header
            .metadata()
            .as_ref()
            .ok_or_else(|| CheckpointErr::Invalid("missing metadata".into()))?;

        let field = |key: &str| {
            metadata
                .get(key)
                .ok_or_else(|| CheckpointErr::Invalid(format!("missing `{key}`")))
        };
        let number = |key: &str| -> Result<u64, CheckpointErr> {
            field(key)?
                .parse()
                .map_err(|e| CheckpointErr::Invalid(format!("bad `{key}`: {e}")))
        };

        let epoch = number(EPOCH_KEY)?;
        let count = number(PARAMETERS_KEY)? as usize;
        let loss = field(LOSS_KEY)?
            .parse()
            .map_err(|e| CheckpointErr::Invalid(format!("bad `{LOSS_KEY}`: {e}")))?;
        let hash = field(HASH_KEY)?.clone();

        let tensors = SafeTensors::deserialize(bytes)?;
        let parameters = (0..count)
            .map(|i| -> Result<Vec<f32>, CheckpointErr> {
                let view = tensors.tensor(&tensor_name(i))?;
                if view.dtype() != Dtype::F32 {
                    return Err(CheckpointErr::Invalid(format!(
                        "parameter {i} is {:?}, expected F32",
                        view.dtype()
                    )));
                }

                // The tensor data may sit at any offset of the file.
                Ok(bytemuck::pod_collect_to_vec(view.data()))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            epoch,
            parameters,
            loss,
            hash,
        })
    }
}

/// Persists the final synchronized state of a run.
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    path: PathBuf,
}

impl CheckpointWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the checkpoint, replacing any previous one at the same path.
    ///
    /// The bytes go to a sibling temporary file that is synced and then renamed
    /// over the target, a reader never sees a partial checkpoint.
    ///
    /// # Arguments
    /// * `epoch` - The epoch counter at termination.
    /// * `model` - The model holding the averaged parameters.
    /// * `loss` - The averaged loss of the last epoch.
    /// * `hash` - The latest provenance hash.
    pub async fn save<M: LocalModel + ?Sized>(
        &self,
        epoch: u64,
        model: &M,
        loss: f32,
        hash: &str,
    ) -> Result<(), CheckpointErr> {
        let bytes = encode(epoch, model, loss, hash)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        if let Err(e) = self.replace(&tmp, &bytes).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                debug!("no temporary checkpoint to remove: {cleanup}");
            }

            error!("failed to write checkpoint {}: {e}", self.path.display());
            return Err(e.into());
        }

        StatusRecord::Completed {
            file_name: self.path.display().to_string(),
        }
        .log();

        match serde_json::to_string(&serde_json::json!({ "last_hash": hash })) {
            Ok(line) => info!("{line}"),
            Err(e) => warn!("failed to encode last hash: {e}"),
        }

        Ok(())
    }

    async fn replace(&self, tmp: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(tmp, &self.path).await
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".into());

        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

fn encode<M: LocalModel + ?Sized>(
    epoch: u64,
    model: &M,
    loss: f32,
    hash: &str,
) -> Result<Vec<u8>, CheckpointErr> {
    let count = model.parameter_count();

    // safetensors stores little endian, same as every target we run on.
    let mut views = HashMap::with_capacity(count);
    for i in 0..count {
        let params = model.parameter(i);
        let bytes = bytemuck::cast_slice(params);
        let view = TensorView::new(Dtype::F32, vec![params.len()], bytes)?;
        views.insert(tensor_name(i), view);
    }

    let metadata = HashMap::from([
        (EPOCH_KEY.to_string(), epoch.to_string()),
        (LOSS_KEY.to_string(), loss.to_string()),
        (HASH_KEY.to_string(), hash.to_string()),
        (PARAMETERS_KEY.to_string(), count.to_string()),
    ]);

    Ok(safetensors::serialize(&views, &Some(metadata))?)
}
