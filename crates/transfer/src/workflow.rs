//! End-to-end export and import entry points.

use tracing::info;

use skinner_config::ExportConfig;
use weights::{CaptureMeta, Chunk, ChunkRepository, MeshCapture, capture_chunks, load_store};

use crate::apply::{WeightApplier, apply_report};
use crate::destination::DestinationMesh;
use crate::error::{ExportError, ImportError};
use crate::importer::Importer;
use crate::report::ImportReport;

/// Capture `captures` and write them to `container` as one unit.
///
/// Nothing is written if any mesh fails to capture.
pub fn export_skin<R>(
    repository: &R,
    container: &str,
    captures: &[MeshCapture],
    meta: &CaptureMeta,
    config: &ExportConfig,
) -> Result<Vec<Chunk>, ExportError>
where
    R: ChunkRepository + ?Sized,
{
    config.validate()?;
    let chunks = capture_chunks(captures, meta, config)?;
    let stored = repository.write(container, &chunks)?;
    info!("Exported {} meshes to '{}'", stored.len(), container);
    Ok(stored)
}

/// Load `containers`, import `meshes` and apply the results.
///
/// Only loading the containers can fail; per-mesh problems are reported
/// in the returned [`ImportReport`].
pub fn import_skin<R, A, S>(
    repository: &R,
    containers: &[S],
    meshes: &[DestinationMesh],
    importer: &Importer,
    applier: &mut A,
) -> Result<ImportReport, ImportError>
where
    R: ChunkRepository + ?Sized,
    A: WeightApplier + ?Sized,
    S: AsRef<str>,
{
    let store = load_store(repository, containers)?;
    let report = importer.import(&store, meshes);
    Ok(apply_report(report, applier))
}
