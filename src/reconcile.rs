// src/reconcile.rs

//! The reconciliation state machine
//!
//! Per run, two inputs decide the action: the desired state and whether the
//! image name appears in the freshly built inventory index.
//!
//! | desired | in inventory | action                                | changed |
//! |---------|--------------|---------------------------------------|---------|
//! | present | no           | upload artifact, register image       | true    |
//! | present | yes          | none                                  | false   |
//! | absent  | yes          | deregister image, delete backing file | true    |
//! | absent  | no           | none                                  | false   |
//!
//! Actions execute linearly and the first failure aborts the run. There is
//! no compensation for partial failure: a backing file can outlive a failed
//! registration and vice versa, and the next run observes whatever state the
//! host was left in.

use crate::api::ManagementClient;
use crate::error::{Error, Result};
use crate::inventory::InventoryIndex;
use crate::transfer::SecureTransfer;
use reqwest::Method;
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

const IMAGES_PATH: &str = "/config/vm_lifecycle/images";
const FILE_DELETE_PATH: &str = "/operations/system/file-delete/file";

/// Desired registration state of the image on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl FromStr for DesiredState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(format!("invalid state '{}', expected 'present' or 'absent'", other)),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Immutable input for one reconciliation run
#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Unique image name on the host
    pub name: String,
    pub state: DesiredState,
    /// Local artifact path, required when `state` is `Present`
    pub file: Option<PathBuf>,
    /// Upload directory on the host
    pub dest: String,
}

impl PackageSpec {
    /// Fail fast on an incomplete spec before any network I/O
    pub fn validate(&self) -> Result<()> {
        if self.state == DesiredState::Present && self.file.is_none() {
            return Err(Error::Configuration(format!(
                "a local artifact file is required to make image '{}' present",
                self.name
            )));
        }
        Ok(())
    }

    /// Remote path the artifact is copied to: `{dest}/{name}.tar.gz`
    pub fn remote_path(&self) -> String {
        format!("{}/{}.tar.gz", self.dest.trim_end_matches('/'), self.name)
    }

    /// `file://` URI the registration record points at
    pub fn src_uri(&self) -> String {
        format!("file://{}", self.remote_path())
    }
}

/// Outcome of one reconciliation run
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub changed: bool,
    /// Raw inventory listing as observed before any action
    pub before: Value,
    pub message: String,
}

/// Drives the inventory query and the create/delete actions
///
/// Constructed with concrete collaborator implementations; there is no
/// runtime capability probing. With `check_mode` set, no network side effect
/// is performed but the reported `changed` value matches what a live run
/// would produce.
pub struct Reconciler<M, T> {
    api: M,
    transfer: T,
    check_mode: bool,
}

impl<M: ManagementClient, T: SecureTransfer> Reconciler<M, T> {
    pub fn new(api: M, transfer: T, check_mode: bool) -> Self {
        Self {
            api,
            transfer,
            check_mode,
        }
    }

    /// Converge the host toward the desired state of one image
    pub fn run(&self, spec: &PackageSpec) -> Result<ReconcileOutcome> {
        spec.validate()?;

        // Always a live query, never cached across runs
        let listing = self.api.query(&format!("{}?deep", IMAGES_PATH))?;
        let index = InventoryIndex::from_listing(&listing);
        debug!("host reports {} registered image(s)", index.len());

        let (changed, message) = match spec.state {
            DesiredState::Present => self.ensure_present(spec, &index)?,
            DesiredState::Absent => self.ensure_absent(spec, &index)?,
        };

        Ok(ReconcileOutcome {
            changed,
            before: listing,
            message,
        })
    }

    fn ensure_present(&self, spec: &PackageSpec, index: &InventoryIndex) -> Result<(bool, String)> {
        if index.contains(&spec.name) {
            info!("image '{}' already registered, nothing to do", spec.name);
            return Ok((false, format!("image '{}' already registered", spec.name)));
        }

        if !self.check_mode {
            // validate() guarantees the file is set for Present
            let file = spec.file.as_deref().ok_or_else(|| {
                Error::Configuration(format!(
                    "a local artifact file is required to make image '{}' present",
                    spec.name
                ))
            })?;

            self.transfer.upload(file, &spec.remote_path())?;

            let payload = json!({
                "image": {
                    "name": spec.name,
                    "src": spec.src_uri(),
                }
            });
            self.api.mutate(IMAGES_PATH, Method::POST, Some(payload))?;
            info!("image '{}' uploaded and registered", spec.name);
        } else {
            info!("check mode: would upload and register image '{}'", spec.name);
        }

        Ok((true, format!("image '{}' uploaded and registered", spec.name)))
    }

    fn ensure_absent(&self, spec: &PackageSpec, index: &InventoryIndex) -> Result<(bool, String)> {
        let Some(record) = index.get(&spec.name) else {
            info!("image '{}' not registered, nothing to do", spec.name);
            return Ok((false, format!("image '{}' not registered", spec.name)));
        };

        if !self.check_mode {
            self.api.mutate(
                &format!("{}/image/{}", IMAGES_PATH, spec.name),
                Method::DELETE,
                None,
            )?;

            // Registration is gone; now remove the backing file it pointed at
            let payload = json!({
                "input": {
                    "name": record.backing_file(),
                }
            });
            self.api.mutate(FILE_DELETE_PATH, Method::POST, Some(payload))?;
            info!("image '{}' deregistered and backing file removed", spec.name);
        } else {
            info!("check mode: would deregister image '{}'", spec.name);
        }

        Ok((
            true,
            format!("image '{}' deregistered and backing file removed", spec.name),
        ))
    }
}
