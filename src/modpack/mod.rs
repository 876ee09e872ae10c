//! CurseForge modpacks: manifest model, persisted state, archive import and
//! the completion engine.

pub mod archive;
pub mod completion;
pub mod install;
pub mod manifest;
pub mod selection;
pub mod store;

pub use archive::{read_modpack_archive, ModpackArchive};
pub use completion::{CompletionEnv, CompletionTask, ResolutionFlags, STAGE_DOWNLOAD, STAGE_RESOLVE};
pub use install::{install_manual_archive, install_modpack, ImportRequest};
pub use manifest::{Manifest, ManifestEntry};
pub use selection::SelectionSet;
pub use store::ManifestStore;
